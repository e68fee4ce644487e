//! Tracks whether a usable API credential is selected in the host environment.

use crate::config::API_KEY_VARS;
use crate::error::JobError;
use async_trait::async_trait;
use serde::Serialize;
use std::env;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::{info, warn};

/// What the gate currently believes about the credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialState {
    /// Not probed yet.
    Unknown,
    Absent,
    Present,
}

/// The host environment that owns credential selection.
#[async_trait]
pub trait CredentialHost: Send + Sync {
    async fn has_credential(&self) -> bool;

    /// Runs the host's selection flow. Returns once the flow is closed.
    async fn open_credential_picker(&self);
}

/// A host backed by environment variables (`GEMINI_API_KEY`, then `API_KEY`).
///
/// There is no interactive picker: "opening" it re-reads a `.env` file so a
/// key written there after startup becomes visible.
#[derive(Debug, Clone, Default)]
pub struct EnvCredentialHost;

#[async_trait]
impl CredentialHost for EnvCredentialHost {
    async fn has_credential(&self) -> bool {
        API_KEY_VARS
            .iter()
            .any(|var| env::var(var).map(|v| !v.trim().is_empty()).unwrap_or(false))
    }

    async fn open_credential_picker(&self) {
        if dotenvy::dotenv().is_err() {
            info!("no .env file found; set GEMINI_API_KEY to select a key");
        }
    }
}

/// Gatekeeper for every video submission.
///
/// State changes are published on a `watch` channel so a UI can prompt for
/// a new key as soon as the controller discovers the current one is invalid.
pub struct CredentialGate {
    host: Option<Arc<dyn CredentialHost>>,
    state: watch::Sender<CredentialState>,
    notice: Mutex<Option<JobError>>,
}

impl CredentialGate {
    /// `host` is `None` when the environment has no credential capability at all.
    pub fn new(host: Option<Arc<dyn CredentialHost>>) -> Self {
        let (state, _) = watch::channel(CredentialState::Unknown);
        Self {
            host,
            state,
            notice: Mutex::new(None),
        }
    }

    pub fn state(&self) -> CredentialState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<CredentialState> {
        self.state.subscribe()
    }

    /// Why the credential is not usable after the last probe, if it is not.
    pub fn notice(&self) -> Option<JobError> {
        self.notice
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Asks the host whether a credential is selected.
    ///
    /// An `Absent` result records [`JobError::CredentialNotSelected`] as the
    /// notice. Without a host this fails closed to `Absent` and records
    /// [`JobError::CredentialUnavailable`] instead.
    pub async fn probe(&self) -> CredentialState {
        let resolved = match &self.host {
            Some(host) => {
                if host.has_credential().await {
                    self.set_notice(None);
                    CredentialState::Present
                } else {
                    self.set_notice(Some(JobError::CredentialNotSelected));
                    CredentialState::Absent
                }
            }
            None => {
                warn!("credential host unavailable; treating credential as absent");
                self.set_notice(Some(JobError::CredentialUnavailable));
                CredentialState::Absent
            }
        };
        self.state.send_replace(resolved);
        resolved
    }

    /// Opens the host's picker, then marks the credential `Present`.
    ///
    /// The result of the picker is not re-verified; a probe right after the
    /// dialog closes could race with the host committing the selection.
    ///
    /// # Errors
    ///
    /// - `JobError::CredentialUnavailable` if there is no host.
    pub async fn request_selection(&self) -> Result<(), JobError> {
        let host = self.host.as_ref().ok_or(JobError::CredentialUnavailable)?;
        host.open_credential_picker().await;
        self.set_notice(None);
        self.state.send_replace(CredentialState::Present);
        info!("credential selection completed");
        Ok(())
    }

    /// Forces the state to `Absent` after the backend rejected the credential.
    pub fn invalidate(&self) {
        warn!("backend rejected the credential; marking it absent");
        self.state.send_replace(CredentialState::Absent);
    }

    fn set_notice(&self, notice: Option<JobError>) {
        *self.notice.lock().unwrap_or_else(|e| e.into_inner()) = notice;
    }
}
