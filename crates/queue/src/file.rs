//! A single uploadable file and its state machine.

use std::fmt;
use std::sync::{Arc, RwLock, Weak};

use serde::{Deserialize, Serialize};
use tracing::debug;
use uplift_blob::{Blob, BlobError};
use uuid::Uuid;

use crate::QueueError;

/// Current state of an upload file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileState {
    Queued,
    Uploading,
    Uploaded,
    Failed,
    TimedOut,
    Aborted,
}

impl FileState {
    fn as_str(self) -> &'static str {
        match self {
            FileState::Queued => "queued",
            FileState::Uploading => "uploading",
            FileState::Uploaded => "uploaded",
            FileState::Failed => "failed",
            FileState::TimedOut => "timed_out",
            FileState::Aborted => "aborted",
        }
    }

    /// Returns `true` if a new upload may begin from this state.
    pub fn can_start_upload(self) -> bool {
        matches!(
            self,
            FileState::Queued | FileState::Failed | FileState::TimedOut | FileState::Aborted
        )
    }

    /// Returns `true` if no transport activity is occurring.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            FileState::Uploaded | FileState::Failed | FileState::TimedOut | FileState::Aborted
        )
    }

    /// Returns `true` if the file counts toward queue eviction.
    ///
    /// `Failed` and `TimedOut` files are terminal but not settled: they stay
    /// in the queue so the caller can inspect and re-upload them.
    pub fn is_settled(self) -> bool {
        matches!(self, FileState::Uploaded | FileState::Aborted)
    }
}

impl fmt::Display for FileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the file entered the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileSource {
    /// Picked through a file chooser.
    Browse,
    /// Dropped from the desktop.
    DragAndDrop,
    /// Dragged from another page.
    Web,
    /// Decoded from a data URL.
    DataUrl,
    /// Constructed from a blob by the caller.
    Blob,
}

/// Observer notified after every file state transition.
///
/// A [`Queue`](crate::Queue) registers itself as the sink when a file is
/// pushed, so it can re-evaluate aggregates and eviction.
pub trait StateSink: Send + Sync {
    fn on_state_change(&self, file: &UploadFile);
}

#[derive(Debug)]
struct FileInner {
    state: FileState,
    /// Pre-set size estimate or transport-reported total. Falls back to the
    /// blob size when unset.
    size_override: Option<u64>,
    loaded: u64,
    progress: f64,
    sink: Option<Weak<dyn StateSink>>,
}

/// One uploadable unit: a blob plus upload state (thread-safe).
#[derive(Debug)]
pub struct UploadFile {
    id: String,
    source: FileSource,
    blob: Blob,
    inner: RwLock<FileInner>,
}

impl UploadFile {
    /// Creates a queued file from a blob with source [`FileSource::Blob`].
    pub fn from_blob(blob: Blob) -> Arc<Self> {
        Self::from_blob_with_source(blob, FileSource::Blob)
    }

    /// Creates a queued file from a blob with an explicit source.
    pub fn from_blob_with_source(blob: Blob, source: FileSource) -> Arc<Self> {
        Arc::new(Self {
            id: format!("file-{}", Uuid::new_v4()),
            source,
            blob,
            inner: RwLock::new(FileInner {
                state: FileState::Queued,
                size_override: None,
                loaded: 0,
                progress: 0.0,
                sink: None,
            }),
        })
    }

    /// Creates a queued file by decoding a `data:<mime>;base64,<payload>`
    /// URL, with source [`FileSource::DataUrl`].
    pub fn from_data_url(url: &str) -> Result<Arc<Self>, QueueError> {
        let blob = Blob::from_data_url(url)?;
        Ok(Self::from_blob_with_source(blob, FileSource::DataUrl))
    }

    /// Unique id, assigned at creation.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source(&self) -> FileSource {
        self.source
    }

    pub fn blob(&self) -> &Blob {
        &self.blob
    }

    /// The file name (from the blob; may be empty).
    pub fn name(&self) -> &str {
        self.blob.name()
    }

    /// The MIME type (from the blob; may be empty).
    pub fn mime_type(&self) -> &str {
        self.blob.mime_type()
    }

    /// Size in bytes: the pre-set or transport-reported total when known,
    /// else the blob size.
    pub fn size(&self) -> u64 {
        let inner = self.inner.read().unwrap();
        inner.size_override.unwrap_or_else(|| self.blob.size())
    }

    /// Pre-sets the size estimate before any transport total is known.
    pub fn set_size(&self, size: u64) {
        let mut inner = self.inner.write().unwrap();
        inner.size_override = Some(size);
    }

    /// Bytes sent so far in the current transfer.
    pub fn loaded(&self) -> u64 {
        self.inner.read().unwrap().loaded
    }

    /// Percentage sent (0-100) for the current transfer.
    pub fn progress(&self) -> f64 {
        self.inner.read().unwrap().progress
    }

    pub fn state(&self) -> FileState {
        self.inner.read().unwrap().state
    }

    /// Registers the change-notification sink. Held weakly: the sink is a
    /// lookup-only back-reference, not ownership.
    pub fn register_sink(&self, sink: Weak<dyn StateSink>) {
        let mut inner = self.inner.write().unwrap();
        inner.sink = Some(sink);
    }

    pub(crate) fn clear_sink(&self) {
        let mut inner = self.inner.write().unwrap();
        inner.sink = None;
    }

    /// Atomically checks that an upload may begin and moves to `Uploading`.
    ///
    /// Allowed from `Queued`, `Failed`, `TimedOut`, and `Aborted`; anything
    /// else is rejected synchronously, which prevents double submission of
    /// an in-flight transfer.
    pub fn try_start_upload(&self) -> Result<(), QueueError> {
        {
            let mut inner = self.inner.write().unwrap();
            if !inner.state.can_start_upload() {
                return Err(QueueError::InvalidStateTransition {
                    id: self.id.clone(),
                    state: inner.state,
                });
            }
            inner.state = FileState::Uploading;
        }
        debug!(id = %self.id, state = %FileState::Uploading, "file state changed");
        self.notify();
        Ok(())
    }

    pub fn mark_uploaded(&self) {
        self.transition(FileState::Uploaded);
    }

    pub fn mark_failed(&self) {
        self.transition(FileState::Failed);
    }

    pub fn mark_timed_out(&self) {
        self.transition(FileState::TimedOut);
    }

    pub fn mark_aborted(&self) {
        self.transition(FileState::Aborted);
    }

    fn transition(&self, state: FileState) {
        {
            let mut inner = self.inner.write().unwrap();
            inner.state = state;
        }
        debug!(id = %self.id, state = %state, "file state changed");
        self.notify();
    }

    /// Notifies the sink outside the file lock.
    fn notify(&self) {
        let sink = self.inner.read().unwrap().sink.clone();
        if let Some(sink) = sink.and_then(|weak| weak.upgrade()) {
            sink.on_state_change(self);
        }
    }

    /// Applies a transport progress report with a computable length.
    ///
    /// Overwrites `loaded`, the size total, and the derived percentage.
    /// Ignored when `total` is zero; `loaded` is clamped to `total` so
    /// `loaded <= size` holds whatever the transport reports.
    pub fn set_transfer_progress(&self, loaded: u64, total: u64) {
        if total == 0 {
            return;
        }
        let loaded = loaded.min(total);
        let mut inner = self.inner.write().unwrap();
        inner.loaded = loaded;
        inner.size_override = Some(total);
        inner.progress = loaded as f64 / total as f64 * 100.0;
    }

    /// Reads the blob content as raw bytes.
    pub async fn read_as_bytes(&self) -> Result<Vec<u8>, BlobError> {
        self.blob.read_as_bytes().await
    }

    /// Reads the blob content as a data URL.
    pub async fn read_as_data_url(&self) -> Result<String, BlobError> {
        self.blob.read_as_data_url().await
    }

    /// Reads the blob content as a binary string (one char per byte).
    pub async fn read_as_binary_string(&self) -> Result<String, BlobError> {
        self.blob.read_as_binary_string().await
    }

    /// Reads the blob content as UTF-8 text.
    pub async fn read_as_text(&self) -> Result<String, BlobError> {
        self.blob.read_as_text().await
    }
}
