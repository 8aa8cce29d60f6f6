//! File upload queues.
//!
//! An [`UploadFile`] wraps a blob with a per-file upload state machine.
//! A [`Queue`] is an ordered, named collection of files with derived
//! aggregates and automatic eviction of completed sets. A [`QueueRegistry`]
//! is the named-queue directory with global rollups.

mod file;
mod queue;
mod registry;

pub use file::{FileSource, FileState, StateSink, UploadFile};
pub use queue::Queue;
pub use registry::QueueRegistry;

/// Errors produced by file state operations.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// The file is in a state that does not allow a new upload.
    #[error("file {id} is \"{state}\" and cannot be requeued")]
    InvalidStateTransition { id: String, state: FileState },

    #[error("blob error: {0}")]
    Blob(#[from] uplift_blob::BlobError),
}
