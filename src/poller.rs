//! Submission and fixed-interval polling of long-running video operations.

use crate::client::GenerationBackend;
use crate::config::VideoConfig;
use crate::error::{GenAiError, JobError};
use crate::types::{OperationHandle, VideoInput, VideoRequest};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// The backend reports a revoked or unknown API key only through this message.
static INVALID_CREDENTIAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)requested entity was not found").unwrap());

/// Where a backend error was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Submission,
    Polling,
}

/// Maps a backend error to the job taxonomy.
///
/// Credential invalidity is recognized the same way in both phases, since a
/// key can be revoked while an operation is still running.
pub fn classify_backend_error(phase: Phase, error: &GenAiError) -> JobError {
    let message = match error {
        GenAiError::Api { message, .. } => message.clone(),
        other => other.to_string(),
    };
    if INVALID_CREDENTIAL_RE.is_match(&message) {
        return JobError::InvalidCredential { message };
    }
    match phase {
        Phase::Submission => JobError::SubmissionFailed { message },
        Phase::Polling => JobError::OperationError { message },
    }
}

/// How a polling run ended, short of a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The operation finished and produced this artifact URI.
    Done(String),
    /// The cancellation token fired; no further status query was made.
    Cancelled,
}

/// Turns a submitted job into a terminal outcome through fixed-interval polling.
#[derive(Clone)]
pub struct OperationPoller {
    backend: Arc<dyn GenerationBackend>,
    resolution: String,
    interval: Duration,
    max_polls: Option<u32>,
}

impl OperationPoller {
    pub fn new(backend: Arc<dyn GenerationBackend>, config: &VideoConfig) -> Self {
        Self {
            backend,
            resolution: config.resolution.clone(),
            interval: config.poll_interval,
            max_polls: config.max_polls,
        }
    }

    /// Submits a video generation request.
    ///
    /// # Errors
    ///
    /// - `JobError::InvalidCredential` if the backend could not resolve the key.
    /// - `JobError::SubmissionFailed` for any other backend or transport error.
    pub async fn submit(&self, input: &VideoInput) -> Result<OperationHandle, JobError> {
        let request = VideoRequest {
            prompt: input.prompt.clone(),
            seed_image: input.seed_image.clone(),
            aspect_ratio: input.aspect_ratio,
            resolution: self.resolution.clone(),
        };

        let handle = self
            .backend
            .submit_video_job(&request)
            .await
            .map_err(|e| {
                let classified = classify_backend_error(Phase::Submission, &e);
                warn!(error = %e, kind = ?classified.kind(), "video submission failed");
                classified
            })?;
        info!(operation = %handle, "video generation submitted");
        Ok(handle)
    }

    /// Polls `handle` until the operation is done, failed, or `cancel` fires.
    ///
    /// `on_tick` runs after every wait, before the next status query, with the
    /// number of queries made so far.
    ///
    /// # Errors
    ///
    /// - `JobError::OperationError` if the operation reports an error, or a
    ///   status query fails.
    /// - `JobError::InvalidCredential` if a status query reveals the key is invalid.
    /// - `JobError::MissingArtifact` if the operation finished without a URI.
    /// - `JobError::PollLimitExceeded` if `max_polls` is configured and reached.
    pub async fn poll_until_done<F>(
        &self,
        handle: &OperationHandle,
        mut on_tick: F,
        cancel: &CancellationToken,
    ) -> Result<PollOutcome, JobError>
    where
        F: FnMut(u32) + Send,
    {
        let mut polls: u32 = 0;
        loop {
            if cancel.is_cancelled() {
                return Ok(PollOutcome::Cancelled);
            }

            let status = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(PollOutcome::Cancelled),
                status = self.backend.get_operation_status(handle) => status,
            };
            polls += 1;

            let status = status.map_err(|e| {
                let classified = classify_backend_error(Phase::Polling, &e);
                warn!(operation = %handle, error = %e, kind = ?classified.kind(), "status query failed");
                classified
            })?;

            if status.done {
                if let Some(message) = status.error {
                    warn!(operation = %handle, %message, "operation finished with an error");
                    return Err(JobError::OperationError { message });
                }
                return match status.artifact_uri {
                    Some(uri) => {
                        info!(operation = %handle, polls, "operation finished");
                        Ok(PollOutcome::Done(uri))
                    }
                    None => Err(JobError::MissingArtifact),
                };
            }

            if self.max_polls.is_some_and(|max| polls >= max) {
                return Err(JobError::PollLimitExceeded { polls });
            }

            debug!(operation = %handle, polls, "operation still running");
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(PollOutcome::Cancelled),
                _ = sleep(self.interval) => {}
            }
            on_tick(polls);
        }
    }
}
