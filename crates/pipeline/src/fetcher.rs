//! Downloads finished images and stages them on local disk.

use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use imagebot_comfyui::api::ComfyUIApi;
use imagebot_comfyui::history::ImageRef;

use crate::artifact::Artifact;
use crate::error::StageFailure;

/// Retrieves artifact bytes from the generation backend.
///
/// The staging directory is created once at construction and shared
/// by every request; staged files are named after the backend
/// filename, which is unique per job.
pub struct ArtifactFetcher {
    api: ComfyUIApi,
    staging_dir: PathBuf,
}

impl ArtifactFetcher {
    /// Create the fetcher, creating `staging_dir` if needed.
    pub fn new(api: ComfyUIApi, staging_dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let staging_dir = staging_dir.into();
        std::fs::create_dir_all(&staging_dir)?;
        Ok(Self { api, staging_dir })
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    /// Download `image` and stage it under its backend filename.
    pub async fn fetch(
        &self,
        image: &ImageRef,
        display_name: String,
        cancel: &CancellationToken,
    ) -> Result<Artifact, StageFailure> {
        let staged_path = self.staged_path(&image.filename)?;

        let bytes = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(StageFailure::Cancelled),
            result = self.api.view_image(image) => result,
        }
        .map_err(|e| StageFailure::Fetch(e.to_string()))?;

        tokio::fs::write(&staged_path, &bytes).await.map_err(|e| {
            StageFailure::Fetch(format!("failed to stage {}: {e}", staged_path.display()))
        })?;

        tracing::info!(
            filename = %image.filename,
            path = %staged_path.display(),
            size = bytes.len(),
            "Artifact downloaded",
        );

        Ok(Artifact {
            backend_filename: image.filename.clone(),
            staged_path,
            bytes,
            display_name,
            remote_id: None,
        })
    }

    /// Resolve the staging path, refusing names that would escape the
    /// staging directory.
    fn staged_path(&self, filename: &str) -> Result<PathBuf, StageFailure> {
        let name = Path::new(filename)
            .file_name()
            .filter(|n| *n == std::ffi::OsStr::new(filename))
            .ok_or_else(|| StageFailure::Fetch(format!("unsafe backend filename '{filename}'")))?;
        Ok(self.staging_dir.join(name))
    }
}
