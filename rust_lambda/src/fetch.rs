use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;

use crate::error::{BoxError, ProcessError};

/// An object as returned by the store. The body has not been read yet.
#[derive(Debug)]
pub struct FetchedObject {
    pub content_type: String,
    pub content_length: i64,
    pub body: ByteStream,
}

impl FetchedObject {
    pub async fn read_text(self, bucket: &str, key: &str) -> Result<String, ProcessError> {
        let bytes = self
            .body
            .collect()
            .await
            .map_err(|source| ProcessError::Body {
                bucket: bucket.to_owned(),
                key: key.to_owned(),
                source,
            })?
            .into_bytes();
        String::from_utf8(bytes.to_vec()).map_err(|source| ProcessError::Decode {
            bucket: bucket.to_owned(),
            key: key.to_owned(),
            source,
        })
    }
}

#[async_trait]
pub trait ObjectFetcher: Send + Sync {
    async fn fetch(&self, bucket: &str, key: &str) -> Result<FetchedObject, BoxError>;
}

#[async_trait]
impl ObjectFetcher for S3Client {
    async fn fetch(&self, bucket: &str, key: &str) -> Result<FetchedObject, BoxError> {
        let output = self.get_object().bucket(bucket).key(key).send().await?;
        Ok(FetchedObject {
            content_type: output.content_type().unwrap_or_default().to_owned(),
            content_length: output.content_length().unwrap_or_default(),
            body: output.body,
        })
    }
}
