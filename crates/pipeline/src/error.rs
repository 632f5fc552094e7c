//! Stage failure taxonomy.

use std::time::Duration;

use imagebot_core::response::{GENERIC_FAILURE_MESSAGE, UNEXPECTED_FAILURE_MESSAGE};

/// Pipeline stage a request was in when something went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Submission,
    Polling,
    Fetch,
    Publish,
    Delivery,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Submission => "submission",
            Self::Polling => "polling",
            Self::Fetch => "fetch",
            Self::Publish => "publish",
            Self::Delivery => "delivery",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a stage failed.
///
/// `Publish` is recorded but never fails a request. Enhancement
/// failures are absorbed inside the enhancer and have no variant here.
#[derive(Debug, thiserror::Error)]
pub enum StageFailure {
    /// The backend rejected the job or answered without a job ID.
    #[error("Job submission failed: {0}")]
    Submission(String),

    /// The job did not produce an image before the deadline.
    #[error("Job {prompt_id} did not complete within {}s", .elapsed.as_secs())]
    PollTimeout { prompt_id: String, elapsed: Duration },

    /// The deadline passed while the history endpoint was unreachable.
    #[error("History for job {prompt_id} unreachable: {reason}")]
    PollTransport { prompt_id: String, reason: String },

    /// The backend reported an execution error for the job.
    #[error("Job {prompt_id} failed on the backend: {reason}")]
    Execution { prompt_id: String, reason: String },

    /// The finished image could not be downloaded or staged.
    #[error("Artifact fetch failed: {0}")]
    Fetch(String),

    /// Storage rejected or could not receive the artifact.
    #[error("Artifact publish failed: {0}")]
    Publish(String),

    /// The generated image could not be handed to the chat surface.
    #[error("Reply delivery failed: {0}")]
    Delivery(String),

    /// The request was cancelled before it finished.
    #[error("Request cancelled")]
    Cancelled,

    /// Anything outside the staged taxonomy (e.g. a panic in a stage).
    #[error("Unexpected error: {0}")]
    Internal(String),
}

impl StageFailure {
    /// The stage this failure belongs to.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Submission(_) => Some(Stage::Submission),
            Self::PollTimeout { .. } | Self::PollTransport { .. } | Self::Execution { .. } => {
                Some(Stage::Polling)
            }
            Self::Fetch(_) => Some(Stage::Fetch),
            Self::Publish(_) => Some(Stage::Publish),
            Self::Delivery(_) => Some(Stage::Delivery),
            Self::Cancelled | Self::Internal(_) => None,
        }
    }

    /// Text shown to the requester, or `None` when nothing is sent.
    ///
    /// Internal detail never leaks: every staged failure maps to the
    /// same generic message.
    pub fn user_message(&self) -> Option<&'static str> {
        match self {
            Self::Cancelled => None,
            Self::Internal(_) | Self::Delivery(_) => Some(UNEXPECTED_FAILURE_MESSAGE),
            _ => Some(GENERIC_FAILURE_MESSAGE),
        }
    }
}
