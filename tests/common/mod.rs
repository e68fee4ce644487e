#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use veo_lro::{
    encode_for_upload, ArtifactStore, ArtifactTransport, AspectRatio, CredentialHost,
    FetchedArtifact, GenAiError, GenerationBackend, ImageFile, OperationHandle, OperationStatus,
    VideoConfig, VideoController, VideoInput, VideoRequest,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const MODEL: &str = "veo-test";
pub const OPERATION_NAME: &str = "models/veo-test/operations/op-1";
pub const INVALID_KEY_MESSAGE: &str = "Requested entity was not found.";

pub fn seed_input() -> VideoInput {
    let file = ImageFile::from_bytes("seed.png", "image/png", vec![0x89, 0x50, 0x4e, 0x47]);
    VideoInput::new(
        "An epic cinematic shot of this object falling through clouds",
        encode_for_upload(&file).unwrap(),
        AspectRatio::Landscape,
    )
}

pub fn fast_config() -> VideoConfig {
    VideoConfig::default().with_poll_interval(Duration::from_millis(5))
}

/// Mounts a successful `predictLongRunning` endpoint for [`MODEL`].
pub async fn mount_submit(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(format!("/v1beta/models/{MODEL}:predictLongRunning")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": OPERATION_NAME
        })))
        .mount(server)
        .await;
}

pub fn finished_operation(uri: &str) -> serde_json::Value {
    json!({
        "name": OPERATION_NAME,
        "done": true,
        "response": {
            "generateVideoResponse": {
                "generatedSamples": [
                    { "video": { "uri": uri } }
                ]
            }
        }
    })
}

/// One scripted answer to a status query.
#[derive(Debug, Clone)]
pub enum Step {
    Running,
    Done(Option<&'static str>),
    OperationFailed(&'static str),
    TransportError(u16, &'static str),
}

/// An in-process backend that replays a script and counts calls.
pub struct ScriptedBackend {
    submit_error: Option<(u16, &'static str)>,
    stall_submit: bool,
    steps: Mutex<VecDeque<Step>>,
    pub submits: AtomicUsize,
    pub polls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            submit_error: None,
            stall_submit: false,
            steps: Mutex::new(steps.into()),
            submits: AtomicUsize::new(0),
            polls: AtomicUsize::new(0),
        })
    }

    pub fn rejecting_submission(status: u16, message: &'static str) -> Arc<Self> {
        Arc::new(Self {
            submit_error: Some((status, message)),
            stall_submit: false,
            steps: Mutex::new(VecDeque::new()),
            submits: AtomicUsize::new(0),
            polls: AtomicUsize::new(0),
        })
    }

    /// A backend whose submission call never returns.
    pub fn stalled_submission() -> Arc<Self> {
        Arc::new(Self {
            submit_error: None,
            stall_submit: true,
            steps: Mutex::new(VecDeque::new()),
            submits: AtomicUsize::new(0),
            polls: AtomicUsize::new(0),
        })
    }

    /// A backend whose operation never finishes.
    pub fn never_done() -> Arc<Self> {
        Self::new(Vec::new())
    }

    pub fn submits(&self) -> usize {
        self.submits.load(Ordering::SeqCst)
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    async fn submit_video_job(&self, _request: &VideoRequest) -> Result<OperationHandle, GenAiError> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        if self.stall_submit {
            std::future::pending::<()>().await;
        }
        match self.submit_error {
            Some((status, message)) => Err(GenAiError::Api {
                status,
                message: message.to_string(),
            }),
            None => Ok(OperationHandle(OPERATION_NAME.to_string())),
        }
    }

    async fn get_operation_status(
        &self,
        _handle: &OperationHandle,
    ) -> Result<OperationStatus, GenAiError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Step::Running);
        match step {
            Step::Running => Ok(OperationStatus::default()),
            Step::Done(uri) => Ok(OperationStatus {
                done: true,
                error: None,
                artifact_uri: uri.map(str::to_string),
            }),
            Step::OperationFailed(message) => Ok(OperationStatus {
                done: true,
                error: Some(message.to_string()),
                artifact_uri: None,
            }),
            Step::TransportError(status, message) => Err(GenAiError::Api {
                status,
                message: message.to_string(),
            }),
        }
    }
}

/// Serves fixed bytes, or a fixed HTTP error status.
pub struct FakeTransport {
    pub status: Option<u16>,
    pub stall: bool,
    pub fetches: AtomicUsize,
}

impl FakeTransport {
    pub fn ok() -> Arc<Self> {
        Arc::new(Self {
            status: None,
            stall: false,
            fetches: AtomicUsize::new(0),
        })
    }

    pub fn failing(status: u16) -> Arc<Self> {
        Arc::new(Self {
            status: Some(status),
            stall: false,
            fetches: AtomicUsize::new(0),
        })
    }

    /// A transport whose fetch never returns.
    pub fn stalled() -> Arc<Self> {
        Arc::new(Self {
            status: None,
            stall: true,
            fetches: AtomicUsize::new(0),
        })
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArtifactTransport for FakeTransport {
    async fn fetch_artifact(&self, _uri: &str) -> Result<FetchedArtifact, GenAiError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.stall {
            std::future::pending::<()>().await;
        }
        match self.status {
            Some(status) => Err(GenAiError::Api {
                status,
                message: "Failed to download file".to_string(),
            }),
            None => Ok(FetchedArtifact {
                bytes: b"dummy video data".to_vec(),
                media_type: Some("video/mp4".to_string()),
            }),
        }
    }
}

pub struct FakeHost {
    pub present: AtomicBool,
    pub probes: AtomicUsize,
}

impl FakeHost {
    pub fn new(present: bool) -> Arc<Self> {
        Arc::new(Self {
            present: AtomicBool::new(present),
            probes: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl CredentialHost for FakeHost {
    async fn has_credential(&self) -> bool {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.present.load(Ordering::SeqCst)
    }

    async fn open_credential_picker(&self) {
        self.present.store(true, Ordering::SeqCst);
    }
}

/// A host whose credential check never answers; its picker returns at once.
pub struct StalledHost;

#[async_trait]
impl CredentialHost for StalledHost {
    async fn has_credential(&self) -> bool {
        std::future::pending().await
    }

    async fn open_credential_picker(&self) {}
}

pub struct Harness {
    pub controller: Arc<VideoController>,
    pub backend: Arc<ScriptedBackend>,
    pub transport: Arc<FakeTransport>,
    pub host: Arc<FakeHost>,
    pub dir: tempfile::TempDir,
}

pub fn harness(
    backend: Arc<ScriptedBackend>,
    transport: Arc<FakeTransport>,
    host: Arc<FakeHost>,
    config: &VideoConfig,
) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let controller = VideoController::with_parts(
        backend.clone(),
        transport.clone(),
        Some(host.clone()),
        ArtifactStore::at(dir.path()),
        config,
    );
    Harness {
        controller: Arc::new(controller),
        backend,
        transport,
        host,
        dir,
    }
}
