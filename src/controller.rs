//! Orchestrates one video job at a time: credential check, submission,
//! polling, download and cancellation.

use crate::client::{ArtifactTransport, GenAiClient, GenerationBackend};
use crate::config::VideoConfig;
use crate::credential::{CredentialGate, CredentialHost, CredentialState};
use crate::encoder::{materialize_download, ArtifactStore};
use crate::error::JobError;
use crate::job::{Job, JobStatus};
use crate::poller::{OperationPoller, PollOutcome};
use crate::types::VideoInput;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

/// Shown while a job runs, advanced once per poll tick and wrapping around.
pub const PROGRESS_MESSAGES: [&str; 7] = [
    "Warming up the digital director's chair...",
    "Writing the script for the first scenes...",
    "Casting pixels in their roles...",
    "Rendering the opening sequence...",
    "This may take a few minutes, great art needs time!",
    "Polishing the final frames...",
    "Almost ready for the premiere...",
];

/// Owns the active [`Job`] and drives it to a terminal state.
///
/// Every transition is published on a `watch` channel; see [`subscribe`](Self::subscribe).
pub struct VideoController {
    poller: OperationPoller,
    transport: Arc<dyn ArtifactTransport>,
    gate: CredentialGate,
    store: ArtifactStore,
    job: watch::Sender<Option<Job>>,
}

impl VideoController {
    /// A controller that talks to the Gemini API through `client`.
    pub fn new(
        client: GenAiClient,
        host: Option<Arc<dyn CredentialHost>>,
        store: ArtifactStore,
        config: &VideoConfig,
    ) -> Self {
        let client = Arc::new(client);
        Self::with_parts(client.clone(), client, host, store, config)
    }

    pub fn with_parts(
        backend: Arc<dyn GenerationBackend>,
        transport: Arc<dyn ArtifactTransport>,
        host: Option<Arc<dyn CredentialHost>>,
        store: ArtifactStore,
        config: &VideoConfig,
    ) -> Self {
        let (job, _) = watch::channel(None);
        Self {
            poller: OperationPoller::new(backend, config),
            transport,
            gate: CredentialGate::new(host),
            store,
            job,
        }
    }

    pub fn credential_gate(&self) -> &CredentialGate {
        &self.gate
    }

    /// Receives a snapshot of the current job after every transition.
    pub fn subscribe(&self) -> watch::Receiver<Option<Job>> {
        self.job.subscribe()
    }

    pub fn job(&self) -> Option<Job> {
        self.job.borrow().clone()
    }

    /// `Idle` when no job was ever started.
    pub fn status(&self) -> JobStatus {
        self.job
            .borrow()
            .as_ref()
            .map_or(JobStatus::Idle, |job| job.status())
    }

    /// Runs a video job to completion and returns its final status.
    ///
    /// Backend, transport and credential failures end up on the job as
    /// [`Job::last_error`]; they are not returned here. Dropping the future
    /// leaves the job in its last published state, from which
    /// [`cancel`](Self::cancel) can still stop it.
    ///
    /// # Errors
    ///
    /// - `JobError::MissingSeedImage` if `input` has no seed image.
    /// - `JobError::JobAlreadyInProgress` if another job has not finished yet.
    ///   The running job is left untouched in both cases.
    pub async fn start_video_job(&self, input: VideoInput) -> Result<JobStatus, JobError> {
        if input.seed_image.is_none() {
            return Err(JobError::MissingSeedImage);
        }
        if self.status().is_active() {
            warn!("rejected video job: another job is in progress");
            return Err(JobError::JobAlreadyInProgress);
        }

        // Nothing is published until the probe has resolved.
        let credential = match self.gate.state() {
            CredentialState::Present => CredentialState::Present,
            _ => self.gate.probe().await,
        };
        let mut job = Job::new(input.clone());
        if credential == CredentialState::Present {
            job.begin_submitting(PROGRESS_MESSAGES[0]);
        } else {
            job.await_credential();
        }
        let id = job.id();
        let token = job.cancellation().clone();
        self.claim(job)?;

        if credential != CredentialState::Present {
            info!(job_id = id, "no credential selected; waiting for the user");
            return Ok(JobStatus::AwaitingCredential);
        }

        let submitted = tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(self.status_of(id)),
            result = self.poller.submit(&input) => result,
        };
        let handle = match submitted {
            Ok(handle) => handle,
            Err(error) => return Ok(self.fail(id, error)),
        };
        if !self.update(id, |job| job.begin_polling(handle.clone())) {
            return Ok(self.status_of(id));
        }

        let mut message_index = 0;
        let outcome = self
            .poller
            .poll_until_done(
                &handle,
                |_| {
                    message_index = (message_index + 1) % PROGRESS_MESSAGES.len();
                    self.update(id, |job| job.set_progress(PROGRESS_MESSAGES[message_index]));
                },
                &token,
            )
            .await;

        let uri = match outcome {
            Ok(PollOutcome::Done(uri)) => uri,
            Ok(PollOutcome::Cancelled) => return Ok(self.status_of(id)),
            Err(error) => return Ok(self.fail(id, error)),
        };
        if !self.update(id, Job::begin_download) {
            return Ok(self.status_of(id));
        }

        let downloaded = tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(self.status_of(id)),
            result = materialize_download(self.transport.as_ref(), &self.store, &uri) => result,
        };
        match downloaded {
            Ok(artifact) => {
                info!(job_id = id, path = %artifact.path.display(), "video job succeeded");
                self.update(id, |job| job.succeed(artifact));
                Ok(self.status_of(id))
            }
            Err(error) => Ok(self.fail(id, error)),
        }
    }

    /// Cancels the active job and aborts any pending wait, query or download.
    ///
    /// Has no effect unless the job is submitting, polling or downloading;
    /// calling it again returns the same status.
    pub fn cancel(&self) -> JobStatus {
        let mut cancelled = None;
        // The job fires its own token inside the transition.
        self.job.send_if_modified(|slot| {
            if let Some(job) = slot.as_mut() {
                if job.cancel() {
                    cancelled = Some(job.id());
                }
            }
            cancelled.is_some()
        });
        if let Some(id) = cancelled {
            info!(job_id = id, "video job cancelled");
        }
        self.status()
    }

    /// Publishes `job` unless the current one is still active.
    fn claim(&self, job: Job) -> Result<(), JobError> {
        let mut pending = Some(job);
        self.job.send_if_modified(|slot| {
            if slot.as_ref().is_some_and(|current| current.status().is_active()) {
                return false;
            }
            *slot = pending.take();
            true
        });
        match pending {
            None => Ok(()),
            Some(_) => {
                warn!("rejected video job: another job is in progress");
                Err(JobError::JobAlreadyInProgress)
            }
        }
    }

    fn fail(&self, id: u64, error: JobError) -> JobStatus {
        warn!(job_id = id, kind = ?error.kind(), %error, "video job failed");
        let invalid_credential = matches!(error, JobError::InvalidCredential { .. });
        if self.update(id, |job| job.fail(error)) && invalid_credential {
            self.gate.invalidate();
        }
        self.status_of(id)
    }

    /// Status of job `id`; a job is only replaced after it was cancelled.
    fn status_of(&self, id: u64) -> JobStatus {
        self.job
            .borrow()
            .as_ref()
            .filter(|job| job.id() == id)
            .map_or(JobStatus::Cancelled, |job| job.status())
    }

    /// Applies `f` to job `id` and publishes the result if it changed anything.
    ///
    /// A no-op once another job has taken the slot.
    fn update<F>(&self, id: u64, f: F) -> bool
    where
        F: FnOnce(&mut Job) -> bool,
    {
        let mut applied = false;
        self.job.send_if_modified(|slot| {
            if let Some(job) = slot.as_mut().filter(|job| job.id() == id) {
                applied = f(job);
            }
            applied
        });
        applied
    }
}
