use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The frame shape of the generated video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AspectRatio {
    /// Landscape.
    #[default]
    #[serde(rename = "16:9")]
    Landscape,
    /// Portrait.
    #[serde(rename = "9:16")]
    Portrait,
}

impl AspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Landscape => "16:9",
            AspectRatio::Portrait => "9:16",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "16:9" => Ok(AspectRatio::Landscape),
            "9:16" => Ok(AspectRatio::Portrait),
            other => Err(format!("unsupported aspect ratio: {other}")),
        }
    }
}

/// An image ready to be sent to the API, plus a reference the UI can display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EncodedImage {
    /// Standard base64 of the raw image bytes.
    pub bytes_base64: String,
    /// The declared media type, e.g. `image/png`.
    pub media_type: String,
    /// A `file://` or `data:` URL pointing at the original image.
    pub local_preview_ref: String,
}

/// Everything the user supplies for one video job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoInput {
    pub prompt: String,
    pub seed_image: Option<EncodedImage>,
    pub aspect_ratio: AspectRatio,
}

impl VideoInput {
    pub fn new(prompt: impl Into<String>, seed_image: EncodedImage, aspect_ratio: AspectRatio) -> Self {
        Self {
            prompt: prompt.into(),
            seed_image: Some(seed_image),
            aspect_ratio,
        }
    }
}

/// Opaque token identifying an in-flight long-running operation.
///
/// For the Gemini API this is the operation resource name, e.g.
/// `models/veo-3.1-fast-generate-preview/operations/abc123`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationHandle(pub String);

impl OperationHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The backend-agnostic submission request handed to a
/// [`GenerationBackend`](crate::GenerationBackend).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoRequest {
    pub prompt: String,
    pub seed_image: Option<EncodedImage>,
    pub aspect_ratio: AspectRatio,
    /// Resolution hint, e.g. `720p`.
    pub resolution: String,
}

/// One status query result, reduced to what the poller needs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OperationStatus {
    pub done: bool,
    /// Operation-level error message, if the backend reported one.
    pub error: Option<String>,
    /// URI of the first generated artifact, if any.
    pub artifact_uri: Option<String>,
}

/// A binary fetched by an [`ArtifactTransport`](crate::ArtifactTransport).
#[derive(Debug, Clone)]
pub struct FetchedArtifact {
    pub bytes: Vec<u8>,
    /// The `Content-Type` of the response, when the server sent one.
    pub media_type: Option<String>,
}

/// (Internal) Request body for `models/{model}:predictLongRunning`.
#[derive(Serialize, Debug)]
pub(crate) struct PredictLongRunningRequest<'a> {
    pub(crate) instances: Vec<VideoInstance<'a>>,
    pub(crate) parameters: VideoParameters<'a>,
}

#[derive(Serialize, Debug)]
pub(crate) struct VideoInstance<'a> {
    pub(crate) prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) image: Option<InlineImage<'a>>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InlineImage<'a> {
    pub(crate) bytes_base64_encoded: &'a str,
    pub(crate) mime_type: &'a str,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VideoParameters<'a> {
    pub(crate) aspect_ratio: &'a str,
    pub(crate) resolution: &'a str,
    pub(crate) sample_count: u32,
}

impl<'a> From<&'a VideoRequest> for PredictLongRunningRequest<'a> {
    fn from(request: &'a VideoRequest) -> Self {
        let image = request.seed_image.as_ref().map(|image| InlineImage {
            bytes_base64_encoded: &image.bytes_base64,
            mime_type: &image.media_type,
        });
        Self {
            instances: vec![VideoInstance {
                prompt: &request.prompt,
                image,
            }],
            parameters: VideoParameters {
                aspect_ratio: request.aspect_ratio.as_str(),
                resolution: &request.resolution,
                sample_count: 1,
            },
        }
    }
}

/// A long-running operation resource as returned by the API.
#[derive(Deserialize, Debug, Clone)]
pub struct Operation {
    /// The operation resource name; used as the polling handle.
    pub name: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub error: Option<OperationError>,
    #[serde(default)]
    pub response: Option<OperationResponse>,
}

/// The `error` field of a finished operation.
#[derive(Deserialize, Debug, Clone)]
pub struct OperationError {
    #[serde(default)]
    pub code: Option<i32>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct OperationResponse {
    #[serde(default)]
    pub generate_video_response: Option<GenerateVideoResponse>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerateVideoResponse {
    #[serde(default)]
    pub generated_samples: Vec<GeneratedSample>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct GeneratedSample {
    #[serde(default)]
    pub video: Option<VideoFile>,
}

/// A downloadable video file.
#[derive(Deserialize, Debug, Clone)]
pub struct VideoFile {
    #[serde(default)]
    pub uri: Option<String>,
}

impl Operation {
    /// URI of the first generated video, if the operation produced one.
    pub fn video_uri(&self) -> Option<&str> {
        self.response
            .as_ref()?
            .generate_video_response
            .as_ref()?
            .generated_samples
            .first()?
            .video
            .as_ref()?
            .uri
            .as_deref()
    }
}

impl From<Operation> for OperationStatus {
    fn from(op: Operation) -> Self {
        let artifact_uri = op.video_uri().map(str::to_string);
        let error = op.error.map(|e| {
            e.message
                .unwrap_or_else(|| "video generation failed during the operation".to_string())
        });
        Self {
            done: op.done,
            error,
            artifact_uri,
        }
    }
}

/// (Internal) The error envelope of a non-2xx API response.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorResponse {
    pub(crate) error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    #[serde(default)]
    pub(crate) message: String,
}
