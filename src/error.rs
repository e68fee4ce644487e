use serde::Serialize;

/// Errors raised by the HTTP client and configuration layer.
///
/// These never end up on a [`Job`](crate::Job) directly; the poller and
/// controller classify them into a [`JobError`] first.
#[derive(Debug, thiserror::Error)]
pub enum GenAiError {
    #[error("API key is missing. Please provide it or set the GEMINI_API_KEY environment variable.")]
    MissingApiKey,
    #[error("Network request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("Failed to parse API response: {0}")]
    ResponseParseFailed(#[from] serde_json::Error),
    #[error("API request failed with status {status}: {message}")]
    Api { status: u16, message: String },
    #[error("URL parsing failed: {0}")]
    UrlParseFailed(#[from] url::ParseError),
    #[error("File I/O error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Invalid value {value:?} for {key}")]
    InvalidConfig { key: &'static str, value: String },
}

impl GenAiError {
    /// The HTTP status attached to the error, if the server answered at all.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            GenAiError::Api { status, .. } => Some(*status),
            GenAiError::RequestFailed(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// A classified job failure, as stored in [`Job::last_error`](crate::Job::last_error).
///
/// The `Display` output of every variant is meant to be shown to the user as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobError {
    /// The host exposes no credential environment at all.
    #[error("No credential environment was found. Video generation may not work as expected.")]
    CredentialUnavailable,
    /// A host is available but no key is selected; the gate's notice after an `Absent` probe.
    #[error("Please select an API key before generating a video.")]
    CredentialNotSelected,
    /// The backend could not resolve the selected credential.
    #[error("Your API key appears to be invalid. Select a new key and try again.")]
    InvalidCredential { message: String },
    #[error("Failed to start video generation: {message}")]
    SubmissionFailed { message: String },
    #[error("Video generation failed during the operation: {message}")]
    OperationError { message: String },
    #[error("No video URI was found in the completed operation.")]
    MissingArtifact,
    #[error("Failed to download the video: {message}")]
    DownloadFailed { status_code: Option<u16>, message: String },
    #[error("Please upload a valid image file (got {media_type}).")]
    UnsupportedMediaType { media_type: String },
    #[error("A video job is already in progress.")]
    JobAlreadyInProgress,
    #[error("Please upload a starting image.")]
    MissingSeedImage,
    #[error("The operation did not finish after {polls} status checks.")]
    PollLimitExceeded { polls: u32 },
}

/// Fieldless discriminant of [`JobError`], handy for matching and assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    CredentialUnavailable,
    CredentialNotSelected,
    InvalidCredential,
    SubmissionFailed,
    OperationError,
    MissingArtifact,
    DownloadFailed,
    UnsupportedMediaType,
    JobAlreadyInProgress,
    MissingSeedImage,
    PollLimitExceeded,
}

impl JobError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            JobError::CredentialUnavailable => ErrorKind::CredentialUnavailable,
            JobError::CredentialNotSelected => ErrorKind::CredentialNotSelected,
            JobError::InvalidCredential { .. } => ErrorKind::InvalidCredential,
            JobError::SubmissionFailed { .. } => ErrorKind::SubmissionFailed,
            JobError::OperationError { .. } => ErrorKind::OperationError,
            JobError::MissingArtifact => ErrorKind::MissingArtifact,
            JobError::DownloadFailed { .. } => ErrorKind::DownloadFailed,
            JobError::UnsupportedMediaType { .. } => ErrorKind::UnsupportedMediaType,
            JobError::JobAlreadyInProgress => ErrorKind::JobAlreadyInProgress,
            JobError::MissingSeedImage => ErrorKind::MissingSeedImage,
            JobError::PollLimitExceeded { .. } => ErrorKind::PollLimitExceeded,
        }
    }
}
