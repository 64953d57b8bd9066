use aws_lambda_events::event::s3::S3Event;
use lambda_runtime::{tracing, Error, LambdaEvent};
use serde::Serialize;

use crate::classify::{admit, classify_line, select_line, Admission, ProcessedContent};
use crate::config::Config;
use crate::error::ProcessError;
use crate::event::{upload_target, UploadTarget};
use crate::fetch::ObjectFetcher;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub status_code: u16,
    pub body: String,
}

impl Response {
    fn ok(body: impl Into<String>) -> Self {
        Self {
            status_code: 200,
            body: body.into(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProcessedBody<'a> {
    bucket: &'a str,
    key: &'a str,
    processed_content: ProcessedContent,
}

async fn process_upload<F>(
    fetcher: &F,
    target: &UploadTarget,
    config: &Config,
) -> Result<Response, Error>
where
    F: ObjectFetcher + ?Sized,
{
    let UploadTarget { bucket, key } = target;
    let object = fetcher
        .fetch(bucket, key)
        .await
        .map_err(|source| ProcessError::Fetch {
            bucket: bucket.clone(),
            key: key.clone(),
            source,
        })?;

    if let Admission::Skip(reason) = admit(
        key,
        &object.content_type,
        object.content_length,
        config.max_object_bytes,
    ) {
        tracing::warn!(
            bucket = %bucket,
            key = %key,
            content_type = %object.content_type,
            content_length = object.content_length,
            ?reason,
            "Skipping {}",
            key
        );
        return Ok(Response::ok(reason.message(key)));
    }

    let content = object.read_text(bucket, key).await?;
    let selected = select_line(&content);
    if selected.truncated {
        tracing::info!("File {} has multiple lines, only processing first line", key);
    } else {
        tracing::info!("Processing single-line file: {}", key);
    }
    let processed_content = classify_line(selected.line);
    tracing::info!(kind = ?processed_content.kind, "Processed content: {:?}", processed_content.data);

    let body = serde_json::to_string(&ProcessedBody {
        bucket,
        key,
        processed_content,
    })?;
    Ok(Response::ok(body))
}

pub async fn function_handler<F>(
    event: LambdaEvent<S3Event>,
    fetcher: &F,
    config: &Config,
) -> Result<Response, Error>
where
    F: ObjectFetcher + ?Sized,
{
    let payload = event.payload;
    tracing::info!(records = payload.records.len(), "Received event: {:?}", payload);
    let target = upload_target(&payload).inspect_err(|e| {
        let record = payload.records.first();
        tracing::error!(
            records = payload.records.len(),
            bucket = ?record.and_then(|r| r.s3.bucket.name.as_deref()),
            key = ?record.and_then(|r| r.s3.object.key.as_deref()),
            "Malformed S3 event: {}",
            e
        );
    })?;
    if config.is_foreign_bucket(&target.bucket) {
        tracing::warn!(
            bucket = %target.bucket,
            expected = ?config.bucket_name,
            "Event is for a bucket this function was not provisioned for"
        );
    }

    process_upload(fetcher, &target, config)
        .await
        .inspect_err(|e| {
            tracing::error!(
                bucket = %target.bucket,
                key = %target.key,
                "Error processing file {} from bucket {}: {}",
                target.key,
                target.bucket,
                e
            );
        })
}
