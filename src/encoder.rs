//! Image encoding for uploads and local materialization of downloaded artifacts.

use crate::client::{artifact_file_name, ArtifactTransport};
use crate::error::JobError;
use crate::types::EncodedImage;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::fs;
use tracing::{debug, warn};
use url::Url;

/// A user-supplied file, before encoding.
#[derive(Debug, Clone)]
pub struct ImageFile {
    pub file_name: String,
    /// Declared media type, e.g. `image/jpeg`.
    pub media_type: String,
    pub bytes: Vec<u8>,
    /// Absolute path of the file, when it was read from disk.
    pub source: Option<PathBuf>,
}

impl ImageFile {
    /// Reads a file from disk, guessing its media type from the extension.
    pub async fn open<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let path = fs::canonicalize(path.as_ref()).await?;
        let bytes = fs::read(&path).await?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("image")
            .to_string();
        let media_type = mime_guess::from_path(&path)
            .first_or_octet_stream()
            .to_string();

        Ok(Self {
            file_name,
            media_type,
            bytes,
            source: Some(path),
        })
    }

    pub fn from_bytes(
        file_name: impl Into<String>,
        media_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            media_type: media_type.into(),
            bytes,
            source: None,
        }
    }
}

/// Encodes an image for upload and builds a reference the UI can display.
///
/// The reference is a `file://` URL for files read from disk and a `data:`
/// URL otherwise.
///
/// # Errors
///
/// - `JobError::UnsupportedMediaType` if the declared media type is not `image/*`.
pub fn encode_for_upload(file: &ImageFile) -> Result<EncodedImage, JobError> {
    if !file.media_type.starts_with("image/") {
        return Err(JobError::UnsupportedMediaType {
            media_type: file.media_type.clone(),
        });
    }

    let bytes_base64 = BASE64.encode(&file.bytes);
    let local_preview_ref = file
        .source
        .as_deref()
        .and_then(|path| Url::from_file_path(path).ok())
        .map(String::from)
        .unwrap_or_else(|| format!("data:{};base64,{}", file.media_type, bytes_base64));

    Ok(EncodedImage {
        bytes_base64,
        media_type: file.media_type.clone(),
        local_preview_ref,
    })
}

/// A downloaded artifact on local disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalArtifact {
    pub path: PathBuf,
    /// The remote URI the bytes came from.
    pub source_uri: String,
    pub media_type: Option<String>,
    pub size: u64,
}

impl LocalArtifact {
    /// A `file://` URL for the artifact, suitable for a video player.
    pub fn file_url(&self) -> Option<Url> {
        Url::from_file_path(&self.path).ok()
    }
}

/// Where downloaded artifacts are written.
#[derive(Debug)]
pub struct ArtifactStore {
    dir: PathBuf,
    // Keeps a temporary directory alive for as long as the store exists.
    _temp: Option<TempDir>,
}

impl ArtifactStore {
    /// A store in a fresh temporary directory, removed when the store is dropped.
    pub fn temporary() -> std::io::Result<Self> {
        let temp = tempfile::Builder::new().prefix("veo_download_").tempdir()?;
        Ok(Self {
            dir: temp.path().to_path_buf(),
            _temp: Some(temp),
        })
    }

    /// A store in a caller-owned directory. It is created on first use.
    pub fn at<P: Into<PathBuf>>(dir: P) -> Self {
        Self {
            dir: dir.into(),
            _temp: None,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Fetches a remote artifact and writes it into `store`.
///
/// # Errors
///
/// - `JobError::DownloadFailed` with the HTTP status on a non-success
///   response, or without one for transport and local write failures.
pub async fn materialize_download(
    transport: &dyn ArtifactTransport,
    store: &ArtifactStore,
    remote_uri: &str,
) -> Result<LocalArtifact, JobError> {
    let artifact = transport.fetch_artifact(remote_uri).await.map_err(|e| {
        warn!(error = %e, "artifact download failed");
        JobError::DownloadFailed {
            status_code: e.status_code(),
            message: e.to_string(),
        }
    })?;

    let file_name = artifact_file_name(remote_uri, artifact.media_type.as_deref());
    let path = store.dir().join(file_name);
    write_file(&path, &artifact.bytes)
        .await
        .map_err(|e| JobError::DownloadFailed {
            status_code: None,
            message: format!("could not write {}: {e}", path.display()),
        })?;
    debug!(path = %path.display(), "artifact written");

    Ok(LocalArtifact {
        path,
        source_uri: remote_uri.to_string(),
        media_type: artifact.media_type,
        size: artifact.bytes.len() as u64,
    })
}

async fn write_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, bytes).await
}
