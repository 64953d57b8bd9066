use std::env;

use crate::error::ConfigError;

/// Objects larger than this are skipped unless `MAX_OBJECT_BYTES` says otherwise.
pub const DEFAULT_MAX_OBJECT_BYTES: i64 = 1024 * 1024;

/// Runtime settings read from the function's environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Bucket this function was provisioned for (`BUCKET_NAME`).
    pub bucket_name: Option<String>,
    pub max_object_bytes: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bucket_name: None,
            max_object_bytes: DEFAULT_MAX_OBJECT_BYTES,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bucket_name = lookup("BUCKET_NAME").filter(|name| !name.is_empty());
        let max_object_bytes = match lookup("MAX_OBJECT_BYTES") {
            Some(value) => value
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|bytes| *bytes >= 0)
                .ok_or(ConfigError::InvalidVar {
                    name: "MAX_OBJECT_BYTES",
                    value,
                })?,
            None => DEFAULT_MAX_OBJECT_BYTES,
        };
        Ok(Self {
            bucket_name,
            max_object_bytes,
        })
    }

    /// True when the event came from a bucket other than the configured one.
    pub fn is_foreign_bucket(&self, bucket: &str) -> bool {
        self.bucket_name
            .as_deref()
            .is_some_and(|expected| expected != bucket)
    }
}
