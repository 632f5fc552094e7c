//! Publishes staged artifacts to durable storage.

use std::sync::Arc;

use imagebot_cloud::provider::StorageProvider;

use crate::artifact::Artifact;
use crate::error::StageFailure;

/// Uploads artifacts to a single fixed destination.
///
/// Publishing is a durability side channel: the coordinator logs a
/// failure here and still delivers the image.
pub struct ArtifactPublisher {
    storage: Arc<dyn StorageProvider>,
}

impl ArtifactPublisher {
    pub fn new(storage: Arc<dyn StorageProvider>) -> Self {
        Self { storage }
    }

    /// Upload the staged copy of `artifact` under its display name and
    /// return the remote identifier.
    ///
    /// The staged file is re-read so that a copy removed from disk is
    /// reported as a failure rather than silently uploaded from memory.
    pub async fn publish(&self, artifact: &Artifact) -> Result<String, StageFailure> {
        let bytes = tokio::fs::read(&artifact.staged_path).await.map_err(|e| {
            StageFailure::Publish(format!(
                "staged file {} unavailable: {e}",
                artifact.staged_path.display()
            ))
        })?;

        let remote_id = self
            .storage
            .put_object(bytes, &artifact.display_name, artifact.content_type())
            .await
            .map_err(|e| StageFailure::Publish(e.to_string()))?;

        tracing::info!(
            destination = %self.storage.destination(),
            remote_id = %remote_id,
            display_name = %artifact.display_name,
            "Artifact published",
        );

        Ok(remote_id)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use imagebot_cloud::local::LocalStorageProvider;
    use imagebot_cloud::provider::StorageError;

    use super::*;

    struct RejectingStorage;

    #[async_trait]
    impl StorageProvider for RejectingStorage {
        async fn put_object(&self, _: Vec<u8>, _: &str, _: &str) -> Result<String, StorageError> {
            Err(StorageError::Upload("403 Forbidden".into()))
        }

        fn destination(&self) -> String {
            "nowhere".into()
        }
    }

    fn artifact_at(path: PathBuf) -> Artifact {
        Artifact {
            backend_filename: "ComfyUI_1.png".into(),
            staged_path: path,
            bytes: vec![1, 2, 3],
            display_name: "carol_20240102_030405.png".into(),
            remote_id: None,
        }
    }

    #[tokio::test]
    async fn publish_uploads_staged_bytes() {
        let staging = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        let staged = staging.path().join("ComfyUI_1.png");
        tokio::fs::write(&staged, b"image-bytes").await.unwrap();

        let publisher = ArtifactPublisher::new(Arc::new(LocalStorageProvider::new(dest.path())));
        let remote_id = publisher.publish(&artifact_at(staged)).await.unwrap();

        assert!(remote_id.ends_with("carol_20240102_030405.png"));
        let stored = tokio::fs::read(dest.path().join(&remote_id)).await.unwrap();
        assert_eq!(stored, b"image-bytes");
    }

    #[tokio::test]
    async fn missing_staged_file_is_publish_failure() {
        let staging = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        let publisher = ArtifactPublisher::new(Arc::new(LocalStorageProvider::new(dest.path())));

        let result = publisher
            .publish(&artifact_at(staging.path().join("missing.png")))
            .await;
        assert_matches!(result, Err(StageFailure::Publish(_)));
    }

    #[tokio::test]
    async fn storage_rejection_is_publish_failure() {
        let staging = tempfile::tempdir().unwrap();
        let staged = staging.path().join("ComfyUI_1.png");
        tokio::fs::write(&staged, b"x").await.unwrap();

        let publisher = ArtifactPublisher::new(Arc::new(RejectingStorage));
        let result = publisher.publish(&artifact_at(staged)).await;
        assert_matches!(result, Err(StageFailure::Publish(msg)) if msg.contains("403"));
    }
}
