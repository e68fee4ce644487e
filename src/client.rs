use crate::config::{resolve_api_key, VideoConfig};
use crate::error::GenAiError;
use crate::types::{
    ApiErrorResponse, FetchedArtifact, Operation, OperationHandle, OperationStatus,
    PredictLongRunningRequest, VideoRequest,
};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use url::Url;

const API_KEY_HEADER: &str = "x-goog-api-key";

/// The generation side of the API, as seen by the operation poller.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Starts a video generation and returns the handle to poll.
    async fn submit_video_job(&self, request: &VideoRequest) -> Result<OperationHandle, GenAiError>;

    /// Fetches the current state of a previously submitted operation.
    async fn get_operation_status(
        &self,
        handle: &OperationHandle,
    ) -> Result<OperationStatus, GenAiError>;
}

/// Plain binary fetch of a generated artifact.
#[async_trait]
pub trait ArtifactTransport: Send + Sync {
    async fn fetch_artifact(&self, uri: &str) -> Result<FetchedArtifact, GenAiError>;
}

/// The main client for interacting with the Gemini API.
///
/// It holds the shared `reqwest::Client`, the base URL and the API key.
/// It is designed to be cloneable and safe to share across threads.
#[derive(Clone)]
pub struct GenAiClient {
    client: reqwest::Client,
    base_url: Url,
    api_key: String,
    model: String,
}

impl std::fmt::Debug for GenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenAiClient")
            .field("base_url", &self.base_url.as_str())
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl GenAiClient {
    /// Creates a new `GenAiClient` for the given configuration.
    ///
    /// It first checks for the `api_key` parameter. If it's `None`, it falls
    /// back to the `GEMINI_API_KEY` and then the `API_KEY` environment variables.
    ///
    /// # Errors
    ///
    /// - `GenAiError::MissingApiKey` if the API key is not provided in either way.
    /// - `GenAiError::RequestFailed` if the internal HTTP client fails to build.
    /// - `GenAiError::UrlParseFailed` if the configured base URL is invalid.
    pub fn new(api_key: Option<String>, config: &VideoConfig) -> Result<Self, GenAiError> {
        let api_key = resolve_api_key(api_key)?;
        Self::new_with_url(api_key, &config.base_url, &config.model)
    }

    /// Creates a new `GenAiClient` with a custom base URL.
    ///
    /// This is useful for testing or for connecting to a different API endpoint.
    ///
    /// # Arguments
    ///
    /// * `api_key` - The API key for authentication.
    /// * `base_url` - The base URL for the API (e.g., for a mock server).
    /// * `model` - The video model jobs are submitted to.
    pub fn new_with_url(api_key: String, base_url: &str, model: &str) -> Result<Self, GenAiError> {
        let key_value = HeaderValue::from_str(&api_key).map_err(|_| GenAiError::InvalidConfig {
            key: "api_key",
            value: "<redacted>".to_string(),
        })?;
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, key_value);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        // `Url::join` drops the last path segment unless the base ends with a slash.
        let base_url = if base_url.ends_with('/') {
            Url::parse(base_url)?
        } else {
            Url::parse(&format!("{base_url}/"))?
        };

        Ok(Self {
            client,
            base_url,
            api_key,
            model: model.to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Submits a new image-to-video generation task.
    ///
    /// # Arguments
    ///
    /// * `request` - Prompt, optional seed image, aspect ratio and resolution.
    ///
    /// # Returns
    ///
    /// The freshly created [`Operation`]; its `name` is the polling handle.
    pub async fn generate_video(&self, request: &VideoRequest) -> Result<Operation, GenAiError> {
        let url = self
            .base_url
            .join(&format!("v1beta/models/{}:predictLongRunning", self.model))?;
        let body = PredictLongRunningRequest::from(request);

        debug!(model = %self.model, aspect_ratio = %request.aspect_ratio, "submitting video generation");
        let response = self.client.post(url).json(&body).send().await?;
        read_json(response).await
    }

    /// Retrieves the state of a long-running operation.
    ///
    /// This is the primary method for polling a video generation.
    ///
    /// # Arguments
    ///
    /// * `name` - The operation resource name returned by [`generate_video`](Self::generate_video).
    pub async fn get_operation(&self, name: &str) -> Result<Operation, GenAiError> {
        let url = self.base_url.join(&format!("v1beta/{}", name))?;
        let response = self.client.get(url).send().await?;
        read_json(response).await
    }

    /// Downloads a generated video into the specified directory.
    ///
    /// The file name is inferred from the URI, with the extension taken from
    /// the response's media type.
    ///
    /// # Returns
    ///
    /// The `PathBuf` of the newly created file.
    ///
    /// # Errors
    ///
    /// Fails if the download fails, if the destination directory or file
    /// cannot be created, or if writing the file fails.
    pub async fn download_video<P: AsRef<Path>>(
        &self,
        uri: &str,
        dest_dir: P,
    ) -> Result<PathBuf, GenAiError> {
        let artifact = self.fetch_artifact(uri).await?;
        let file_name = artifact_file_name(uri, artifact.media_type.as_deref());

        fs::create_dir_all(dest_dir.as_ref()).await?;
        let file_path = dest_dir.as_ref().join(file_name);
        let mut file = fs::File::create(&file_path).await?;
        file.write_all(&artifact.bytes).await?;
        file.flush().await?;

        Ok(file_path)
    }

    /// Appends the API key as the `key` query parameter, as required for file downloads.
    fn authorized_download_url(&self, uri: &str) -> Result<Url, GenAiError> {
        let mut url = Url::parse(uri)?;
        url.query_pairs_mut().append_pair("key", &self.api_key);
        Ok(url)
    }
}

#[async_trait]
impl GenerationBackend for GenAiClient {
    async fn submit_video_job(&self, request: &VideoRequest) -> Result<OperationHandle, GenAiError> {
        let operation = self.generate_video(request).await?;
        Ok(OperationHandle(operation.name))
    }

    async fn get_operation_status(
        &self,
        handle: &OperationHandle,
    ) -> Result<OperationStatus, GenAiError> {
        let operation = self.get_operation(handle.as_str()).await?;
        Ok(operation.into())
    }
}

#[async_trait]
impl ArtifactTransport for GenAiClient {
    async fn fetch_artifact(&self, uri: &str) -> Result<FetchedArtifact, GenAiError> {
        let url = self.authorized_download_url(uri)?;
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GenAiError::Api {
                status: status.as_u16(),
                message: format!(
                    "Failed to download file: {}",
                    status.canonical_reason().unwrap_or("unknown status")
                ),
            });
        }

        let media_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string());
        let bytes = response.bytes().await?.to_vec();
        debug!(len = bytes.len(), media_type = ?media_type, "fetched artifact");

        Ok(FetchedArtifact { bytes, media_type })
    }
}

/// Picks a local file name for a downloaded artifact.
///
/// `.../files/abc123:download?alt=media` with `video/mp4` becomes `abc123.mp4`.
pub(crate) fn artifact_file_name(uri: &str, media_type: Option<&str>) -> String {
    let stem = Url::parse(uri)
        .ok()
        .and_then(|url| {
            url.path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .map(|segment| segment.split(':').next().unwrap_or_default().to_string())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| "artifact".to_string());

    // Prefer the subtype itself (`video/mp4` -> `mp4`) over the first registered extension.
    let extension = media_type
        .and_then(|mt| {
            let exts = mime_guess::get_mime_extensions_str(mt)?;
            let subtype = mt.split('/').nth(1).unwrap_or_default();
            exts.iter().find(|ext| **ext == subtype).or(exts.first()).copied()
        })
        .unwrap_or("bin");

    match Path::new(&stem).extension() {
        Some(_) => stem,
        None => format!("{stem}.{extension}"),
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, GenAiError> {
    let status = response.status();
    if status.is_success() {
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    } else {
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorResponse>(&body)
            .map(|e| e.error.message)
            .ok()
            .filter(|m| !m.is_empty())
            .unwrap_or(body);
        Err(GenAiError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_drops_download_suffix_and_uses_media_type() {
        let name = artifact_file_name(
            "https://example.com/v1beta/files/abc123:download?alt=media",
            Some("video/mp4"),
        );
        assert_eq!(name, "abc123.mp4");
    }

    #[test]
    fn file_name_keeps_existing_extension() {
        assert_eq!(artifact_file_name("http://x/clip.mp4", None), "clip.mp4");
    }

    #[test]
    fn file_name_falls_back_for_unknown_media_type() {
        assert_eq!(artifact_file_name("not a url", None), "artifact.bin");
    }

    #[test]
    fn download_url_appends_key_to_existing_query() {
        let client = GenAiClient::new_with_url("secret".into(), "http://localhost", "veo").unwrap();
        let url = client
            .authorized_download_url("https://example.com/files/a:download?alt=media")
            .unwrap();
        assert_eq!(url.query(), Some("alt=media&key=secret"));
    }
}
