//! Amazon S3 (or S3-compatible) storage provider.
//!
//! Credentials and region come from the standard AWS provider chain
//! (`AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`, `AWS_REGION`,
//! profiles, instance metadata).

use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;

use crate::provider::{object_key, StorageError, StorageProvider};

/// Metadata key carrying the artifact's display name, percent-encoded.
pub const DISPLAY_NAME_METADATA: &str = "display-name";

/// Uploads artifacts into a single bucket.
pub struct S3StorageProvider {
    client: aws_sdk_s3::Client,
    bucket: String,
    /// Key prefix, normalised to end in `/` when non-empty.
    prefix: String,
}

impl S3StorageProvider {
    /// Wrap an existing client.
    pub fn new(client: aws_sdk_s3::Client, bucket: String, prefix: &str) -> Self {
        Self {
            client,
            bucket,
            prefix: normalise_prefix(prefix),
        }
    }

    /// Build a client from the environment.
    ///
    /// `endpoint_url` targets an S3-compatible service (MinIO, R2, ...)
    /// and switches to path-style addressing.
    pub async fn from_env(bucket: String, prefix: &str, endpoint_url: Option<&str>) -> Self {
        let shared = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(url) = endpoint_url {
            builder = builder.endpoint_url(url).force_path_style(true);
        }
        let client = aws_sdk_s3::Client::from_conf(builder.build());

        tracing::info!(bucket = %bucket, endpoint = ?endpoint_url, "S3 storage provider ready");
        Self::new(client, bucket, prefix)
    }
}

#[async_trait]
impl StorageProvider for S3StorageProvider {
    async fn put_object(
        &self,
        bytes: Vec<u8>,
        display_name: &str,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let key = object_key(&self.prefix, display_name);
        let size = bytes.len();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .content_disposition(content_disposition(display_name))
            .metadata(DISPLAY_NAME_METADATA, urlencoding::encode(display_name))
            .send()
            .await
            .map_err(|e| StorageError::Upload(DisplayErrorContext(e).to_string()))?;

        tracing::debug!(bucket = %self.bucket, key = %key, size, "Uploaded object to S3");
        Ok(key)
    }

    fn destination(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.prefix)
    }
}

/// Inline disposition with an ASCII fallback and an RFC 5987 `filename*`.
///
/// Header values must be ASCII, and display names carry chat user names.
fn content_disposition(display_name: &str) -> String {
    let fallback: String = display_name
        .chars()
        .map(|c| {
            if c.is_ascii_graphic() && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!(
        "inline; filename=\"{fallback}\"; filename*=UTF-8''{}",
        urlencoding::encode(display_name)
    )
}

/// Ensure a non-empty prefix ends with exactly one `/`.
fn normalise_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}/")
    }
}
