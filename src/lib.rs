//! A long-running video generation client for the Gemini API.
//!
//! Video models such as Veo do not answer synchronously: a request returns an
//! operation handle that has to be polled until the video is ready. This crate
//! wraps that protocol in a small controller that checks the API credential,
//! submits the job, polls at a fixed interval, downloads the result and can be
//! cancelled at any point.
//!
//! ## Features
//! - Image-to-video generation with a prompt and aspect ratio.
//! - Fixed-interval polling with cancellation that stops the next query from firing.
//! - Detection of keys the backend no longer accepts, even mid-poll.
//! - A `watch` channel projection of the job for UIs.
//! - Typed, user-presentable errors.
//!
//! ## Example
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use veo_lro::*;
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let config = VideoConfig::from_env()?;
//! let client = GenAiClient::new(None, &config)?;
//! let controller = VideoController::new(
//!     client,
//!     Some(Arc::new(EnvCredentialHost)),
//!     ArtifactStore::temporary()?,
//!     &config,
//! );
//!
//! let image = encode_for_upload(&ImageFile::open("seed.png").await?)?;
//! let input = VideoInput::new("A cinematic drone shot", image, AspectRatio::Landscape);
//! let status = controller.start_video_job(input).await?;
//! println!("job finished: {status:?}");
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod controller;
pub mod credential;
pub mod encoder;
pub mod error;
pub mod job;
pub mod poller;
pub mod types;

pub use client::{ArtifactTransport, GenAiClient, GenerationBackend};
pub use config::VideoConfig;
pub use controller::{VideoController, PROGRESS_MESSAGES};
pub use credential::{CredentialGate, CredentialHost, CredentialState, EnvCredentialHost};
pub use encoder::{encode_for_upload, materialize_download, ArtifactStore, ImageFile, LocalArtifact};
pub use error::{ErrorKind, GenAiError, JobError};
pub use job::{Job, JobStatus};
pub use poller::{classify_backend_error, OperationPoller, Phase, PollOutcome};
pub use types::{
    AspectRatio, EncodedImage, FetchedArtifact, Operation, OperationHandle, OperationStatus,
    VideoInput, VideoRequest,
};
