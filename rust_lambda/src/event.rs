use aws_lambda_events::event::s3::S3Event;
use percent_encoding::percent_decode_str;

use crate::error::ProcessError;

/// Bucket and decoded key named by an upload notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
    pub bucket: String,
    pub key: String,
}

/// Reads the first record only; notifications from a suffix-filtered bucket
/// carry one object each.
pub fn upload_target(event: &S3Event) -> Result<UploadTarget, ProcessError> {
    let record = event
        .records
        .first()
        .ok_or(ProcessError::MissingField("record"))?;
    let bucket = record
        .s3
        .bucket
        .name
        .clone()
        .ok_or(ProcessError::MissingField("bucket name"))?;
    let raw_key = record
        .s3
        .object
        .key
        .as_deref()
        .ok_or(ProcessError::MissingField("object key"))?;
    Ok(UploadTarget {
        bucket,
        key: decode_key(raw_key)?,
    })
}

/// Keys arrive form-encoded: `+` is a space, everything else is percent-encoded.
pub fn decode_key(raw: &str) -> Result<String, ProcessError> {
    let plus_decoded = raw.replace('+', " ");
    percent_decode_str(&plus_decoded)
        .decode_utf8()
        .map(|key| key.into_owned())
        .map_err(|_| ProcessError::InvalidKey(raw.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_lambda_events::event::s3::{S3Bucket, S3Entity, S3EventRecord, S3Object};

    fn event(bucket: Option<&str>, key: Option<&str>) -> S3Event {
        S3Event {
            records: vec![S3EventRecord {
                s3: S3Entity {
                    bucket: S3Bucket {
                        name: bucket.map(str::to_owned),
                        ..Default::default()
                    },
                    object: S3Object {
                        key: key.map(str::to_owned),
                        ..Default::default()
                    },
                    ..Default::default()
                },
                ..Default::default()
            }],
        }
    }

    #[test]
    fn test_decode_key() {
        assert_eq!(decode_key("my+file.txt").unwrap(), "my file.txt");
        assert_eq!(decode_key("dir%2Fna%C3%AFve.txt").unwrap(), "dir/naïve.txt");
        assert_eq!(decode_key("a%2Bb.txt").unwrap(), "a+b.txt");
        assert!(matches!(
            decode_key("bad%FF.txt"),
            Err(ProcessError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_upload_target_from_first_record() {
        let mut event = event(Some("uploads"), Some("notes+2024.txt"));
        event.records.push(S3EventRecord::default());
        let target = upload_target(&event).unwrap();
        assert_eq!(
            target,
            UploadTarget {
                bucket: "uploads".to_owned(),
                key: "notes 2024.txt".to_owned(),
            }
        );
    }

    #[test]
    fn test_upload_target_empty_event() {
        assert!(matches!(
            upload_target(&S3Event { records: vec![] }),
            Err(ProcessError::MissingField("record"))
        ));
    }

    #[test]
    fn test_upload_target_missing_fields() {
        assert!(matches!(
            upload_target(&event(None, Some("a.txt"))),
            Err(ProcessError::MissingField("bucket name"))
        ));
        assert!(matches!(
            upload_target(&event(Some("uploads"), None)),
            Err(ProcessError::MissingField("object key"))
        ));
    }
}
