//! Opaque binary payloads ("blobs") with data-URL encoding and
//! representation-specific read operations.
//!
//! A [`Blob`] carries a name, a MIME type, and bytes that live either in
//! memory or on disk. Reads are single-shot async results and never touch
//! upload state.

use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

/// Errors produced by blob construction and reads.
#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed data URL: {0}")]
    MalformedDataUrl(String),

    #[error("blob is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Where a blob's bytes live.
#[derive(Debug, Clone)]
pub enum BlobSource {
    /// In-memory payload.
    Memory(Vec<u8>),
    /// Disk-backed payload, read lazily on each read operation.
    File(PathBuf),
}

/// An opaque binary payload with a name and MIME type.
///
/// The name may be empty (blobs decoded from data URLs have none).
#[derive(Debug, Clone)]
pub struct Blob {
    name: String,
    mime_type: String,
    size: u64,
    source: BlobSource,
}

impl Blob {
    /// Creates an in-memory blob.
    pub fn new(name: &str, mime_type: &str, data: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            mime_type: mime_type.to_string(),
            size: data.len() as u64,
            source: BlobSource::Memory(data),
        }
    }

    /// Creates a disk-backed blob from `path`.
    ///
    /// The blob name is the file name and the size is taken from file
    /// metadata; content is read lazily.
    pub async fn from_path(path: &Path, mime_type: &str) -> Result<Self, BlobError> {
        let meta = tokio::fs::metadata(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            name,
            mime_type: mime_type.to_string(),
            size: meta.len(),
            source: BlobSource::File(path.to_path_buf()),
        })
    }

    /// Decodes a `data:<mime>;base64,<payload>` URL into an in-memory blob.
    ///
    /// Anything that does not match that exact two-part, MIME-tagged shape
    /// is rejected with [`BlobError::MalformedDataUrl`].
    pub fn from_data_url(url: &str) -> Result<Self, BlobError> {
        let rest = url
            .strip_prefix("data:")
            .ok_or_else(|| BlobError::MalformedDataUrl("missing data: scheme".into()))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| BlobError::MalformedDataUrl("missing comma separator".into()))?;
        let mime_type = header
            .strip_suffix(";base64")
            .ok_or_else(|| BlobError::MalformedDataUrl("missing ;base64 tag".into()))?;
        if mime_type.is_empty() {
            return Err(BlobError::MalformedDataUrl("missing MIME type".into()));
        }
        let data = BASE64
            .decode(payload)
            .map_err(|e| BlobError::MalformedDataUrl(format!("invalid base64 payload: {e}")))?;
        Ok(Self::new("", mime_type, data))
    }

    /// The blob name (may be empty).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The MIME type, e.g. `image/png`.
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Reads the full content as raw bytes.
    pub async fn read_as_bytes(&self) -> Result<Vec<u8>, BlobError> {
        match &self.source {
            BlobSource::Memory(data) => Ok(data.clone()),
            BlobSource::File(path) => Ok(tokio::fs::read(path).await?),
        }
    }

    /// Reads the content as a `data:<mime>;base64,<payload>` URL.
    pub async fn read_as_data_url(&self) -> Result<String, BlobError> {
        let bytes = self.read_as_bytes().await?;
        Ok(format!(
            "data:{};base64,{}",
            self.mime_type,
            BASE64.encode(bytes)
        ))
    }

    /// Reads the content as a binary string: one char per byte.
    pub async fn read_as_binary_string(&self) -> Result<String, BlobError> {
        let bytes = self.read_as_bytes().await?;
        Ok(bytes.iter().map(|&b| char::from(b)).collect())
    }

    /// Reads the content as UTF-8 text.
    pub async fn read_as_text(&self) -> Result<String, BlobError> {
        let bytes = self.read_as_bytes().await?;
        Ok(String::from_utf8(bytes)?)
    }
}
