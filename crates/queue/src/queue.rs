//! A named, ordered queue of upload files with derived aggregates.

use std::sync::{Arc, RwLock, Weak};

use tracing::info;
use uplift_blob::Blob;

use crate::file::{FileSource, StateSink, UploadFile};

/// An ordered collection of [`UploadFile`]s under one name.
///
/// Aggregates are always computed from current member state, never cached.
/// The queue registers itself as each member's state sink so it can
/// re-evaluate eviction on every transition.
pub struct Queue {
    name: String,
    files: RwLock<Vec<Arc<UploadFile>>>,
}

impl Queue {
    pub(crate) fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            files: RwLock::new(Vec::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Appends a file, preserving insertion order, and registers this queue
    /// as the file's change-notification sink.
    pub fn push(self: &Arc<Self>, file: Arc<UploadFile>) {
        file.register_sink(Arc::downgrade(self) as Weak<dyn StateSink>);
        self.files.write().unwrap().push(file);
    }

    /// Wraps a blob as a queued [`UploadFile`] and pushes it.
    pub fn push_blob(self: &Arc<Self>, blob: Blob, source: FileSource) -> Arc<UploadFile> {
        let file = UploadFile::from_blob_with_source(blob, source);
        self.push(Arc::clone(&file));
        file
    }

    /// Removes a file by id. Returns the removed file, if present.
    pub fn remove(&self, file_id: &str) -> Option<Arc<UploadFile>> {
        let mut files = self.files.write().unwrap();
        let idx = files.iter().position(|f| f.id() == file_id)?;
        let file = files.remove(idx);
        file.clear_sink();
        Some(file)
    }

    /// Snapshot of the current members in insertion order.
    pub fn files(&self) -> Vec<Arc<UploadFile>> {
        self.files.read().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.files.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.read().unwrap().is_empty()
    }

    /// Sum of member sizes in bytes.
    pub fn size(&self) -> u64 {
        self.files().iter().map(|f| f.size()).sum()
    }

    /// Sum of member bytes sent so far.
    pub fn loaded(&self) -> u64 {
        self.files().iter().map(|f| f.loaded()).sum()
    }

    /// Aggregate percentage (0-100, integer floor; 0 when empty).
    pub fn progress(&self) -> u64 {
        let size = self.size();
        if size == 0 {
            return 0;
        }
        self.loaded() * 100 / size
    }

    /// Clears the whole queue once every member has settled.
    ///
    /// Settled means `Uploaded` or `Aborted`. `Failed` and `TimedOut`
    /// members keep the queue alive so the caller can inspect and re-upload
    /// them. The flush is all-or-nothing; partial completion never evicts.
    pub fn flush(&self) {
        let mut files = self.files.write().unwrap();
        if files.is_empty() {
            return;
        }
        if files.iter().all(|f| f.state().is_settled()) {
            for file in files.iter() {
                file.clear_sink();
            }
            let evicted = files.len();
            files.clear();
            info!(queue = %self.name, files = evicted, "queue flushed");
        }
    }
}

impl StateSink for Queue {
    fn on_state_change(&self, _file: &UploadFile) {
        self.flush();
    }
}
