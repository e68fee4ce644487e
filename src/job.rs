//! The video job record and its state machine.

use crate::encoder::LocalArtifact;
use crate::error::JobError;
use crate::types::{OperationHandle, VideoInput};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;

static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);

/// Lifecycle state of a [`Job`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Idle,
    AwaitingCredential,
    Submitting,
    Polling,
    Downloading,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// No transition is accepted out of a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Work is in flight: a new job cannot start and `cancel` has an effect.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            JobStatus::Submitting | JobStatus::Polling | JobStatus::Downloading
        )
    }
}

/// A single requested video generation.
///
/// Fields are only reachable through accessors; the transition methods keep
/// the handle, artifact and error consistent with the status. Each transition
/// returns `false` and leaves the job untouched when it does not apply.
///
/// Clones share the job's cancellation token, so a snapshot taken from a
/// `watch` channel observes a cancel made on the live job.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    id: u64,
    input: VideoInput,
    status: JobStatus,
    operation_handle: Option<OperationHandle>,
    result_artifact: Option<LocalArtifact>,
    last_error: Option<JobError>,
    progress_message: Option<String>,
    created_at: DateTime<Utc>,
    resolved_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    cancellation: CancellationToken,
}

impl Job {
    pub fn new(input: VideoInput) -> Self {
        Self {
            id: NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed),
            input,
            status: JobStatus::Idle,
            operation_handle: None,
            result_artifact: None,
            last_error: None,
            progress_message: None,
            created_at: Utc::now(),
            resolved_at: None,
            cancellation: CancellationToken::new(),
        }
    }

    /// Unique within the process.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn input(&self) -> &VideoInput {
        &self.input
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn operation_handle(&self) -> Option<&OperationHandle> {
        self.operation_handle.as_ref()
    }

    pub fn result_artifact(&self) -> Option<&LocalArtifact> {
        self.result_artifact.as_ref()
    }

    pub fn last_error(&self) -> Option<&JobError> {
        self.last_error.as_ref()
    }

    pub fn progress_message(&self) -> Option<&str> {
        self.progress_message.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn resolved_at(&self) -> Option<DateTime<Utc>> {
        self.resolved_at
    }

    /// Fires when the job is cancelled.
    pub(crate) fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub(crate) fn await_credential(&mut self) -> bool {
        if self.status != JobStatus::Idle {
            return false;
        }
        self.status = JobStatus::AwaitingCredential;
        true
    }

    pub(crate) fn begin_submitting(&mut self, message: &str) -> bool {
        if self.status != JobStatus::Idle {
            return false;
        }
        self.status = JobStatus::Submitting;
        self.progress_message = Some(message.to_string());
        true
    }

    pub(crate) fn begin_polling(&mut self, handle: OperationHandle) -> bool {
        if self.status != JobStatus::Submitting {
            return false;
        }
        self.status = JobStatus::Polling;
        self.operation_handle = Some(handle);
        true
    }

    pub(crate) fn set_progress(&mut self, message: &str) -> bool {
        if !self.status.is_active() {
            return false;
        }
        self.progress_message = Some(message.to_string());
        true
    }

    pub(crate) fn begin_download(&mut self) -> bool {
        if self.status != JobStatus::Polling {
            return false;
        }
        self.status = JobStatus::Downloading;
        true
    }

    pub(crate) fn succeed(&mut self, artifact: LocalArtifact) -> bool {
        if self.status != JobStatus::Downloading {
            return false;
        }
        self.result_artifact = Some(artifact);
        self.resolve(JobStatus::Succeeded);
        true
    }

    pub(crate) fn fail(&mut self, error: JobError) -> bool {
        if !self.status.is_active() {
            return false;
        }
        self.last_error = Some(error);
        self.resolve(JobStatus::Failed);
        true
    }

    pub(crate) fn cancel(&mut self) -> bool {
        if !self.status.is_active() {
            return false;
        }
        self.resolve(JobStatus::Cancelled);
        self.cancellation.cancel();
        true
    }

    fn resolve(&mut self, status: JobStatus) {
        self.status = status;
        self.operation_handle = None;
        self.progress_message = None;
        self.resolved_at = Some(Utc::now());
    }
}
