use aws_sdk_s3::primitives::ByteStreamError;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("S3 event record has no {0}")]
    MissingField(&'static str),

    #[error("object key {0:?} is not valid UTF-8 once decoded")]
    InvalidKey(String),

    #[error("failed to fetch s3://{bucket}/{key}: {source}")]
    Fetch {
        bucket: String,
        key: String,
        #[source]
        source: BoxError,
    },

    #[error("failed to read body of s3://{bucket}/{key}: {source}")]
    Body {
        bucket: String,
        key: String,
        #[source]
        source: ByteStreamError,
    },

    #[error("s3://{bucket}/{key} is not valid UTF-8: {source}")]
    Decode {
        bucket: String,
        key: String,
        #[source]
        source: std::string::FromUtf8Error,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {name}")]
    InvalidVar { name: &'static str, value: String },
}
