//! Storage provider trait and shared error type.

use async_trait::async_trait;

/// Errors raised by storage providers.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Local filesystem failure while writing the object.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The remote service rejected or failed the upload.
    #[error("Upload failed: {0}")]
    Upload(String),
}

/// Destination for published artifacts.
///
/// Implementations hold their credentials and destination container;
/// both are fixed at construction and shared read-only.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Upload `bytes` tagged with `display_name` and return the
    /// provider-assigned object identifier.
    async fn put_object(
        &self,
        bytes: Vec<u8>,
        display_name: &str,
        content_type: &str,
    ) -> Result<String, StorageError>;

    /// Human-readable destination (bucket, directory) for logging.
    fn destination(&self) -> String;
}

/// Object key for a new upload: a time-ordered unique directory holding
/// the display name, so two uploads with the same name never collide.
pub fn object_key(prefix: &str, display_name: &str) -> String {
    format!("{prefix}{}/{display_name}", uuid::Uuid::now_v7())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_key_keeps_display_name() {
        let key = object_key("bot/", "alice_20240101_000000.png");
        assert!(key.starts_with("bot/"));
        assert!(key.ends_with("/alice_20240101_000000.png"));
    }

    #[test]
    fn object_keys_are_unique() {
        assert_ne!(object_key("", "a.png"), object_key("", "a.png"));
    }
}
