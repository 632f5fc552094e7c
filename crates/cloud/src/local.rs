//! Filesystem storage provider.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::provider::{object_key, StorageError, StorageProvider};

/// Writes artifacts beneath a root directory.
///
/// The returned identifier is the object's path relative to the root.
pub struct LocalStorageProvider {
    root: PathBuf,
}

impl LocalStorageProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl StorageProvider for LocalStorageProvider {
    async fn put_object(
        &self,
        bytes: Vec<u8>,
        display_name: &str,
        _content_type: &str,
    ) -> Result<String, StorageError> {
        let key = object_key("", display_name);
        let path = self.root.join(&key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        Ok(key)
    }

    fn destination(&self) -> String {
        self.root.display().to_string()
    }
}
