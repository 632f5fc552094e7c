//! End-to-end handling of one image request.
//!
//! Stages run strictly in order:
//!
//! ```text
//! Received -> Moderated -> (Enhanced) -> Submitted -> Polled -> Fetched -> Published -> Delivered
//!                                              \-----------\---------\--> Failed
//! ```
//!
//! Moderation overrides enhancement. Submission, polling, and fetch
//! failures end the request with a generic message. Publish failures
//! are logged and the image is delivered anyway. A panic inside any
//! stage is caught here and reported like any other unexpected error,
//! and so is a reply that the chat surface refuses to take.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use imagebot_core::moderation::ModerationFilter;
use imagebot_core::naming::artifact_display_name;
use imagebot_core::response::{format_response, UNEXPECTED_FAILURE_MESSAGE};
use imagebot_core::types::Request;
use imagebot_llm::enhancer::{EnhanceOutcome, PromptEnhancer};

use crate::artifact::Artifact;
use crate::error::{Stage, StageFailure};
use crate::fetcher::ArtifactFetcher;
use crate::locks::UserLocks;
use crate::orchestrator::GenerationOrchestrator;
use crate::publisher::ArtifactPublisher;
use crate::sink::{Attachment, Reply, ReplySink};

/// Position of a request in the pipeline, used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Received,
    Moderated,
    Enhanced,
    Submitted,
    Polled,
    Fetched,
    Published,
    Delivered,
}

impl RequestState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Moderated => "moderated",
            Self::Enhanced => "enhanced",
            Self::Submitted => "submitted",
            Self::Polled => "polled",
            Self::Fetched => "fetched",
            Self::Published => "published",
            Self::Delivered => "delivered",
        }
    }
}

/// A successfully generated image, ready to hand to the requester.
#[derive(Debug)]
pub struct Delivery {
    /// Prompt as the user wrote it.
    pub original_prompt: String,
    /// Prompt actually submitted to the backend.
    pub final_prompt: String,
    /// Moderation replaced the prompt with the placeholder.
    pub moderated: bool,
    /// The LLM rewrite was used.
    pub enhanced: bool,
    pub seed: u64,
    pub artifact: Artifact,
    /// Why publishing failed, if it did. Never prevents delivery.
    pub publish_failure: Option<StageFailure>,
    /// Caption sent alongside the image.
    pub caption: String,
}

/// Terminal result of one request: exactly one artifact or one failure.
#[derive(Debug)]
pub enum Outcome {
    Delivered(Box<Delivery>),
    Failed(StageFailure),
}

impl Outcome {
    /// The message to send back, or `None` for cancelled requests.
    pub fn reply(&self) -> Option<Reply> {
        match self {
            Self::Delivered(delivery) => Some(Reply::with_attachment(
                delivery.caption.clone(),
                Attachment {
                    filename: delivery.artifact.display_name.clone(),
                    bytes: delivery.artifact.bytes.clone(),
                },
            )),
            Self::Failed(failure) => failure.user_message().map(Reply::text),
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered(_))
    }
}

/// Runs requests through every pipeline stage.
///
/// Shared across tasks behind an `Arc`; holds no per-request state.
pub struct RequestCoordinator {
    moderation: Arc<ModerationFilter>,
    enhancer: PromptEnhancer,
    orchestrator: GenerationOrchestrator,
    fetcher: ArtifactFetcher,
    publisher: ArtifactPublisher,
    user_locks: Option<UserLocks>,
}

impl RequestCoordinator {
    pub fn new(
        moderation: Arc<ModerationFilter>,
        enhancer: PromptEnhancer,
        orchestrator: GenerationOrchestrator,
        fetcher: ArtifactFetcher,
        publisher: ArtifactPublisher,
    ) -> Self {
        Self {
            moderation,
            enhancer,
            orchestrator,
            fetcher,
            publisher,
            user_locks: None,
        }
    }

    /// Allow at most one in-flight request per requester.
    pub fn with_user_locks(mut self) -> Self {
        self.user_locks = Some(UserLocks::new());
        self
    }

    /// Run `request`, send the reply through `sink`, and clean up the
    /// staged file.
    pub async fn handle(
        &self,
        request: &Request,
        sink: &dyn ReplySink,
        cancel: &CancellationToken,
    ) -> Outcome {
        let span = tracing::info_span!(
            "request",
            requester = %request.requester.name,
            origin = request.origin.as_str(),
        );

        async {
            let _guard = match &self.user_locks {
                Some(locks) => tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Outcome::Failed(StageFailure::Cancelled),
                    guard = locks.acquire(&request.requester.id) => Some(guard),
                },
                None => None,
            };

            let outcome = self.run(request, cancel).await;

            if let Outcome::Delivered(delivery) = &outcome {
                if let Err(e) = tokio::fs::remove_file(&delivery.artifact.staged_path).await {
                    tracing::debug!(
                        path = %delivery.artifact.staged_path.display(),
                        error = %e,
                        "Failed to remove staged artifact",
                    );
                }
            }

            deliver(outcome, sink).await
        }
        .instrument(span)
        .await
    }

    /// Run every stage for `request` without replying.
    pub async fn run(&self, request: &Request, cancel: &CancellationToken) -> Outcome {
        let result = AssertUnwindSafe(self.run_stages(request, cancel))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(StageFailure::Internal(panic_message(&*panic))));

        match result {
            Ok(delivery) => Outcome::Delivered(Box::new(delivery)),
            Err(failure) => {
                match &failure {
                    StageFailure::Cancelled => tracing::info!("Request cancelled"),
                    other => tracing::error!(
                        stage = other.stage().map(Stage::as_str).unwrap_or("unknown"),
                        error = %other,
                        "Request failed",
                    ),
                }
                Outcome::Failed(failure)
            }
        }
    }

    async fn run_stages(
        &self,
        request: &Request,
        cancel: &CancellationToken,
    ) -> Result<Delivery, StageFailure> {
        advance(RequestState::Received);

        let decision = self.moderation.decide(&request.prompt);
        advance(RequestState::Moderated);

        let (final_prompt, enhanced) = match decision.substitute {
            Some(placeholder) => {
                tracing::info!("Prompt blocked by moderation, using placeholder");
                (placeholder.to_string(), false)
            }
            None => {
                let outcome = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(StageFailure::Cancelled),
                    outcome = self.enhancer.enhance(&request.prompt) => outcome,
                };
                let enhanced = matches!(outcome, EnhanceOutcome::Enhanced(_));
                if self.enhancer.is_enabled() {
                    advance(RequestState::Enhanced);
                }
                (outcome.into_prompt(), enhanced)
            }
        };

        tracing::info!(final_prompt = %final_prompt, "Generating image");
        let job = self.orchestrator.submit(&final_prompt, cancel).await?;
        advance(RequestState::Submitted);
        let job = self.orchestrator.await_completion(job, cancel).await?;
        advance(RequestState::Polled);

        let image = job
            .output
            .ok_or_else(|| StageFailure::Internal("completed job has no output".to_string()))?;
        let display_name = artifact_display_name(&request.requester.name, request.arrived_at);
        let mut artifact = self.fetcher.fetch(&image, display_name, cancel).await?;
        advance(RequestState::Fetched);

        let publish_failure = match self.publisher.publish(&artifact).await {
            Ok(remote_id) => {
                artifact.remote_id = Some(remote_id);
                advance(RequestState::Published);
                None
            }
            Err(failure) => {
                tracing::warn!(
                    stage = %Stage::Publish,
                    error = %failure,
                    "Publish failed, delivering anyway",
                );
                Some(failure)
            }
        };

        let caption = format_response(&request.prompt, &final_prompt, self.enhancer.is_enabled());

        Ok(Delivery {
            original_prompt: request.prompt.clone(),
            final_prompt,
            moderated: decision.blocked,
            enhanced,
            seed: job.seed,
            artifact,
            publish_failure,
            caption,
        })
    }
}

/// Send the reply for `outcome`.
///
/// If the image itself cannot be sent, one apology is attempted and the
/// request is reported as failed.
async fn deliver(outcome: Outcome, sink: &dyn ReplySink) -> Outcome {
    let Some(reply) = outcome.reply() else {
        return outcome;
    };

    match sink.send_reply(reply).await {
        Ok(()) => {
            if outcome.is_delivered() {
                advance(RequestState::Delivered);
            }
            outcome
        }
        Err(e) if outcome.is_delivered() => {
            tracing::error!(stage = %Stage::Delivery, error = %e, "Failed to send image");
            if let Err(apology) = sink.send_reply(Reply::text(UNEXPECTED_FAILURE_MESSAGE)).await {
                tracing::error!(stage = %Stage::Delivery, error = %apology, "Failed to send apology");
            }
            Outcome::Failed(StageFailure::Delivery(e.0))
        }
        Err(e) => {
            tracing::error!(stage = %Stage::Delivery, error = %e, "Failed to send failure reply");
            outcome
        }
    }
}

fn advance(state: RequestState) {
    tracing::info!(state = state.as_str(), "Request state");
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic in pipeline stage".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use imagebot_core::response::GENERIC_FAILURE_MESSAGE;

    use super::*;

    fn delivery() -> Delivery {
        Delivery {
            original_prompt: "a cat".into(),
            final_prompt: "a cat".into(),
            moderated: false,
            enhanced: false,
            seed: 1,
            artifact: Artifact {
                backend_filename: "ComfyUI_1.png".into(),
                staged_path: PathBuf::from("ComfyUI_1.png"),
                bytes: vec![1, 2],
                display_name: "dan_20240101_000000.png".into(),
                remote_id: None,
            },
            publish_failure: None,
            caption: "Prompt: a cat".into(),
        }
    }

    #[test]
    fn delivered_reply_carries_attachment() {
        let reply = Outcome::Delivered(Box::new(delivery())).reply().unwrap();
        assert_eq!(reply.content, "Prompt: a cat");
        let attachment = reply.attachment.unwrap();
        assert_eq!(attachment.filename, "dan_20240101_000000.png");
        assert_eq!(attachment.bytes, vec![1, 2]);
    }

    #[test]
    fn failed_reply_is_generic_text() {
        let reply = Outcome::Failed(StageFailure::Fetch("404 from /view".into()))
            .reply()
            .unwrap();
        assert_eq!(reply.content, GENERIC_FAILURE_MESSAGE);
        assert!(reply.attachment.is_none());
    }

    #[test]
    fn internal_failure_reply_is_apology() {
        let reply = Outcome::Failed(StageFailure::Internal("boom".into()))
            .reply()
            .unwrap();
        assert_eq!(reply.content, UNEXPECTED_FAILURE_MESSAGE);
    }

    #[test]
    fn cancelled_has_no_reply() {
        assert!(Outcome::Failed(StageFailure::Cancelled).reply().is_none());
    }

    #[test]
    fn panic_messages_are_extracted() {
        let p: Box<dyn std::any::Any + Send> = Box::new("static");
        assert_eq!(panic_message(&*p), "static");
        let p: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(&*p), "owned");
        let p: Box<dyn std::any::Any + Send> = Box::new(42);
        assert_eq!(panic_message(&*p), "panic in pipeline stage");
    }
}
