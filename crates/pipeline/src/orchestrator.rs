//! Job submission and bounded completion polling.
//!
//! [`GenerationOrchestrator::submit`] builds the job graph and queues it;
//! [`GenerationOrchestrator::await_completion`] then polls `/history/{prompt_id}` on a fixed interval
//! until an image appears, the backend reports an error, the deadline
//! passes, or the request is cancelled.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use imagebot_comfyui::api::ComfyUIApi;
use imagebot_comfyui::history::{job_state, JobState};
use imagebot_comfyui::seed::SeedSource;
use imagebot_comfyui::workflow::{build_workflow, WorkflowParams};

use crate::artifact::{GenerationJob, JobStatus};
use crate::error::StageFailure;

/// Upper bound on the best-effort queue removal of an abandoned job.
const ABANDON_TIMEOUT: Duration = Duration::from_secs(5);

/// Polling cadence and deadline for one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay between history requests.
    pub interval: Duration,
    /// Wall-clock limit measured from submission.
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(300),
        }
    }
}

/// Submits jobs to the generation backend and waits for their output.
pub struct GenerationOrchestrator {
    api: ComfyUIApi,
    checkpoint: String,
    seeds: Arc<dyn SeedSource>,
    poll: PollConfig,
}

impl GenerationOrchestrator {
    pub fn new(
        api: ComfyUIApi,
        checkpoint: String,
        seeds: Arc<dyn SeedSource>,
        poll: PollConfig,
    ) -> Self {
        Self {
            api,
            checkpoint,
            seeds,
            poll,
        }
    }

    /// Submit `prompt` and wait for the finished job.
    ///
    /// The returned job is [`JobStatus::Completed`] and carries the
    /// first image the backend listed.
    pub async fn submit_and_await(
        &self,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<GenerationJob, StageFailure> {
        let job = self.submit(prompt, cancel).await?;
        self.await_completion(job, cancel).await
    }

    /// Queue a job for `prompt` with a fresh seed.
    ///
    /// An in-flight submission is allowed to finish even if `cancel`
    /// fires, so that a job the backend already accepted can be removed
    /// from its queue again.
    pub async fn submit(
        &self,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<GenerationJob, StageFailure> {
        if cancel.is_cancelled() {
            return Err(StageFailure::Cancelled);
        }

        let seed = self.seeds.next_seed();
        let workflow = build_workflow(&WorkflowParams::new(prompt, self.checkpoint.as_str(), seed));
        let client_id = uuid::Uuid::new_v4().to_string();

        let response = self
            .api
            .submit_workflow(&workflow, &client_id)
            .await
            .map_err(|e| StageFailure::Submission(e.to_string()))?;

        tracing::info!(
            prompt_id = %response.prompt_id,
            queue_position = ?response.number,
            seed,
            "Workflow submitted to ComfyUI",
        );

        if cancel.is_cancelled() {
            self.abandon(&response.prompt_id, "cancelled during submission").await;
            return Err(StageFailure::Cancelled);
        }

        Ok(GenerationJob::submitted(response.prompt_id, seed))
    }

    /// Poll history until `job` has an image.
    ///
    /// Transport and status errors on the history endpoint count as
    /// "not ready yet"; the most recent one is reported if the deadline
    /// passes without any successful poll since. The deadline also
    /// bounds a single slow history request.
    pub async fn await_completion(
        &self,
        mut job: GenerationJob,
        cancel: &CancellationToken,
    ) -> Result<GenerationJob, StageFailure> {
        let started = Instant::now();
        let deadline = started + self.poll.timeout;
        let mut attempt = 0u32;
        let mut last_error: Option<String> = None;

        loop {
            attempt += 1;

            let polled = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.abandon(&job.prompt_id, "cancelled").await;
                    return Err(StageFailure::Cancelled);
                }
                _ = tokio::time::sleep_until(deadline) => {
                    self.abandon(&job.prompt_id, "deadline reached").await;
                    return Err(deadline_failure(&job, started, last_error));
                }
                result = self.api.get_history(&job.prompt_id) => result,
            };

            last_error = match polled {
                Ok(history) => match job_state(&history, &job.prompt_id) {
                    JobState::Ready(image) => {
                        tracing::info!(
                            prompt_id = %job.prompt_id,
                            attempt,
                            filename = %image.filename,
                            "Job completed",
                        );
                        job.output = Some(image);
                        job.status = JobStatus::Completed;
                        return Ok(job);
                    }
                    JobState::Failed(reason) => {
                        return Err(StageFailure::Execution {
                            prompt_id: job.prompt_id,
                            reason,
                        });
                    }
                    JobState::Pending => {
                        job.status = JobStatus::Running;
                        None
                    }
                },
                Err(e) => {
                    tracing::debug!(
                        prompt_id = %job.prompt_id,
                        attempt,
                        error = %e,
                        "History poll failed, retrying",
                    );
                    Some(e.to_string())
                }
            };

            if Instant::now() + self.poll.interval > deadline {
                self.abandon(&job.prompt_id, "deadline reached").await;
                return Err(deadline_failure(&job, started, last_error));
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.abandon(&job.prompt_id, "cancelled").await;
                    return Err(StageFailure::Cancelled);
                }
                _ = tokio::time::sleep(self.poll.interval) => {}
            }
        }
    }

    /// Best-effort removal of a job we stopped waiting for.
    async fn abandon(&self, prompt_id: &str, reason: &str) {
        tracing::warn!(prompt_id, reason, "Abandoning job");
        match tokio::time::timeout(ABANDON_TIMEOUT, self.api.cancel_execution(prompt_id)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(prompt_id, error = %e, "Failed to remove abandoned job from queue");
            }
            Err(_) => {
                tracing::warn!(prompt_id, "Timed out removing abandoned job from queue");
            }
        }
    }
}

fn deadline_failure(
    job: &GenerationJob,
    started: Instant,
    last_error: Option<String>,
) -> StageFailure {
    match last_error {
        Some(reason) => StageFailure::PollTransport {
            prompt_id: job.prompt_id.clone(),
            reason,
        },
        None => StageFailure::PollTimeout {
            prompt_id: job.prompt_id.clone(),
            elapsed: started.elapsed(),
        },
    }
}
