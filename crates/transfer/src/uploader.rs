//! Upload orchestration: binds file state to an HTTP transport.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uplift_queue::UploadFile;

use crate::TransferError;
use crate::options::{ContentTypeOption, ResolvedRequest, UploadOptions, resolve};
use crate::transport::{
    FilePart, RequestBody, ReqwestTransport, Transport, TransportEvent, TransportRequest,
    TransportResponse,
};

/// Drives uploads over a [`Transport`], applying transport events to the
/// file's counters and state.
///
/// The state gate runs synchronously before any transport action: a file
/// already `Uploading` (or settled as `Uploaded`) rejects a new upload.
pub struct Uploader {
    transport: Arc<dyn Transport>,
    in_flight: Arc<AtomicUsize>,
}

impl Uploader {
    /// Creates an uploader over the default reqwest transport.
    pub fn new() -> Result<Self, TransferError> {
        Ok(Self::with_transport(Arc::new(ReqwestTransport::new()?)))
    }

    /// Creates an uploader over a custom transport.
    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of uploads currently in flight. Settles back to zero when
    /// every upload call has completed, whatever the outcome.
    pub fn pending(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Uploads the file as a `multipart/form-data` body.
    ///
    /// Every resolved `data` entry except the file key becomes a form
    /// field; the blob bytes are appended under the file key with the
    /// file's name.
    pub async fn upload(
        &self,
        file: &Arc<UploadFile>,
        url: &str,
        options: UploadOptions,
    ) -> Result<TransportResponse, TransferError> {
        self.run(file, Some(url), options, false).await
    }

    /// Like [`upload`](Self::upload), with the URL taken from the options.
    pub async fn upload_with_options(
        &self,
        file: &Arc<UploadFile>,
        options: UploadOptions,
    ) -> Result<TransportResponse, TransferError> {
        self.run(file, None, options, false).await
    }

    /// Uploads the raw blob bytes with content type
    /// `application/octet-stream` and no form wrapper.
    pub async fn upload_binary(
        &self,
        file: &Arc<UploadFile>,
        url: &str,
        mut options: UploadOptions,
    ) -> Result<TransportResponse, TransferError> {
        options.content_type = ContentTypeOption::Explicit("application/octet-stream".into());
        self.run(file, Some(url), options, true).await
    }

    async fn run(
        &self,
        file: &Arc<UploadFile>,
        url: Option<&str>,
        options: UploadOptions,
        raw: bool,
    ) -> Result<TransportResponse, TransferError> {
        let resolved = resolve(file, url, &options)?;

        // Synchronous gate: no transport action unless the file may start.
        file.try_start_upload()?;

        let _guard = InFlightGuard::enter(&self.in_flight);
        info!(
            id = %file.id(),
            method = %resolved.method,
            url = %resolved.url,
            "upload started"
        );

        let cancel = options.cancel.unwrap_or_default();
        let result = self.run_transfer(file, resolved, cancel, raw).await;

        match &result {
            Ok(response) => {
                file.mark_uploaded();
                info!(id = %file.id(), status = response.status, "upload completed");
            }
            Err(TransferError::TimedOut) => {
                file.mark_timed_out();
                warn!(id = %file.id(), "upload timed out");
            }
            Err(TransferError::Aborted) => {
                file.mark_aborted();
                warn!(id = %file.id(), "upload aborted");
            }
            Err(e) => {
                file.mark_failed();
                error!(id = %file.id(), error = %e, "upload failed");
            }
        }
        result
    }

    async fn run_transfer(
        &self,
        file: &Arc<UploadFile>,
        resolved: ResolvedRequest,
        cancel: CancellationToken,
        raw: bool,
    ) -> Result<TransportResponse, TransferError> {
        let bytes = file.read_as_bytes().await?;

        let body = if raw {
            RequestBody::Raw {
                content_type: resolved
                    .content_type
                    .clone()
                    .unwrap_or_else(|| "application/octet-stream".to_string()),
                data: bytes,
            }
        } else {
            RequestBody::Multipart {
                fields: resolved
                    .data
                    .iter()
                    .filter(|(key, _)| *key != resolved.file_key)
                    .cloned()
                    .collect(),
                file: FilePart {
                    field: resolved.file_key.clone(),
                    file_name: file.name().to_string(),
                    content_type: resolved.content_type.clone(),
                    data: bytes,
                },
            }
        };

        let request = TransportRequest {
            method: resolved.method,
            url: resolved.url,
            headers: resolved.headers,
            body,
            timeout: resolved.timeout,
            with_credentials: resolved.with_credentials,
            cancel,
        };

        let (tx, mut rx) = mpsc::channel(64);
        let send = self.transport.send(request, tx);
        tokio::pin!(send);

        // Apply events as they arrive; the channel closes once the
        // transport is done, so every event lands before the final state.
        let mut outcome = None;
        loop {
            tokio::select! {
                result = &mut send, if outcome.is_none() => outcome = Some(result),
                event = rx.recv() => match event {
                    Some(TransportEvent::Progress { loaded, total, length_computable }) => {
                        if length_computable && total > 0 {
                            file.set_transfer_progress(loaded, total);
                        }
                    }
                    Some(TransportEvent::TimedOut) => file.mark_timed_out(),
                    Some(TransportEvent::Aborted) => file.mark_aborted(),
                    None => break,
                },
            }
        }

        match outcome {
            Some(result) => result,
            // The transport dropped its event sender before finishing.
            None => send.await,
        }
    }
}

/// Counts an in-flight upload; decrements on drop, so completion is
/// observable even when the transfer errors or the task unwinds.
struct InFlightGuard(Arc<AtomicUsize>);

impl InFlightGuard {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
