//! Per-request job and artifact state.

use std::path::PathBuf;

use imagebot_comfyui::history::ImageRef;

/// Content type assumed when the bytes are not a recognised format.
pub const DEFAULT_CONTENT_TYPE: &str = "image/png";

/// Lifecycle of one submission to the generation backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// Accepted by the backend, not yet seen in history.
    Submitted,
    /// Polling; history has no image for this job yet.
    Running,
    /// History lists at least one image.
    Completed,
}

/// State for one submission, owned by the orchestrator's poll loop.
#[derive(Debug, Clone)]
pub struct GenerationJob {
    /// Backend-assigned job identifier.
    pub prompt_id: String,
    pub seed: u64,
    pub status: JobStatus,
    /// Set once the job completes.
    pub output: Option<ImageRef>,
}

impl GenerationJob {
    pub fn submitted(prompt_id: String, seed: u64) -> Self {
        Self {
            prompt_id,
            seed,
            status: JobStatus::Submitted,
            output: None,
        }
    }
}

/// A finished image, staged locally and optionally published.
#[derive(Debug, Clone)]
pub struct Artifact {
    /// Filename the backend saved the image under.
    pub backend_filename: String,
    /// Where the bytes were staged on local disk.
    pub staged_path: PathBuf,
    pub bytes: Vec<u8>,
    /// Name shown to the requester and used for storage.
    pub display_name: String,
    /// Storage identifier, set after a successful publish.
    pub remote_id: Option<String>,
}

impl Artifact {
    /// MIME type sniffed from the image header.
    pub fn content_type(&self) -> &'static str {
        image::guess_format(&self.bytes)
            .map(|format| format.to_mime_type())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(bytes: Vec<u8>) -> Artifact {
        Artifact {
            backend_filename: "ComfyUI_00001_.png".into(),
            staged_path: PathBuf::from("/tmp/ComfyUI_00001_.png"),
            bytes,
            display_name: "a_20240101_000000.png".into(),
            remote_id: None,
        }
    }

    #[test]
    fn png_header_is_detected() {
        let png = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        assert_eq!(artifact(png).content_type(), "image/png");
    }

    #[test]
    fn jpeg_header_is_detected() {
        let jpeg = vec![0xFF, 0xD8, 0xFF, 0xE0, 0, 0, 0, 0];
        assert_eq!(artifact(jpeg).content_type(), "image/jpeg");
    }

    #[test]
    fn unknown_bytes_default_to_png() {
        assert_eq!(artifact(vec![1, 2, 3]).content_type(), DEFAULT_CONTENT_TYPE);
    }

    #[test]
    fn new_job_is_submitted() {
        let job = GenerationJob::submitted("p".into(), 5);
        assert_eq!(job.status, JobStatus::Submitted);
        assert!(job.output.is_none());
    }
}
