//! HTTP upload transfer.
//!
//! [`UploadOptions`] resolves caller configuration into a fully-defaulted
//! request, the [`Transport`] trait abstracts the HTTP client, and
//! [`Uploader`] drives a transfer while mapping transport events to file
//! state transitions.

mod options;
mod transport;
mod uploader;

pub use options::{ContentTypeOption, DEFAULT_ACCEPTS, ResolvedRequest, UploadOptions, resolve};
pub use transport::{
    FilePart, RequestBody, ReqwestTransport, Transport, TransportEvent, TransportRequest,
    TransportResponse,
};
pub use uploader::Uploader;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("no upload URL given")]
    MissingUrl,

    #[error("invalid HTTP method: {0}")]
    InvalidMethod(String),

    #[error("HTTP error {status}: {body}")]
    Http { status: u16, body: String },

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("request timed out")]
    TimedOut,

    #[error("request aborted")]
    Aborted,

    #[error(transparent)]
    State(#[from] uplift_queue::QueueError),

    #[error("blob error: {0}")]
    Blob(#[from] uplift_blob::BlobError),
}
