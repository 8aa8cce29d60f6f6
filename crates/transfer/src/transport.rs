//! Abstract HTTP transport and the reqwest-backed implementation.
//!
//! A [`Transport`] takes a fully-built [`TransportRequest`] and reports
//! [`TransportEvent`]s while the request is in flight. The default
//! implementation streams the payload through a chunked counter so progress
//! is genuine and monotonic.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use futures_util::stream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::TransferError;

/// Chunk size for the progress-counting body stream: 64 KiB.
const PROGRESS_CHUNK_SIZE: usize = 64 * 1024;

/// Events emitted by a transport while a request is in flight.
///
/// Progress events arrive zero or more times with non-decreasing `loaded`,
/// always before the request settles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Progress {
        loaded: u64,
        total: u64,
        length_computable: bool,
    },
    TimedOut,
    Aborted,
}

/// The binary payload slot of a multipart request.
#[derive(Debug, Clone)]
pub struct FilePart {
    /// Form field name carrying the payload.
    pub field: String,
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

/// Request body shape.
#[derive(Debug, Clone)]
pub enum RequestBody {
    /// `multipart/form-data`: one text part per field plus the file part.
    Multipart {
        fields: Vec<(String, String)>,
        file: FilePart,
    },
    /// Raw binary body with an explicit content type.
    Raw { content_type: String, data: Vec<u8> },
}

/// A fully-built request handed to a transport.
pub struct TransportRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
    pub timeout: Option<Duration>,
    /// Whether to send the request with ambient credentials. Carried for
    /// transports that distinguish credentialed sends.
    pub with_credentials: bool,
    /// External abort trigger.
    pub cancel: CancellationToken,
}

/// Response returned by a transport on success.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl TransportResponse {
    /// Returns the body as text (lossy UTF-8).
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Abstract HTTP client capability: send a request, stream events.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        request: TransportRequest,
        events: mpsc::Sender<TransportEvent>,
    ) -> Pin<Box<dyn Future<Output = Result<TransportResponse, TransferError>> + Send + '_>>;
}

/// HTTP transport backed by `reqwest`.
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransferError> {
        Ok(Self {
            http: reqwest::Client::builder().build()?,
        })
    }
}

impl Transport for ReqwestTransport {
    fn send(
        &self,
        request: TransportRequest,
        events: mpsc::Sender<TransportEvent>,
    ) -> Pin<Box<dyn Future<Output = Result<TransportResponse, TransferError>> + Send + '_>> {
        Box::pin(async move {
            let method = reqwest::Method::from_bytes(request.method.as_bytes())
                .map_err(|_| TransferError::InvalidMethod(request.method.clone()))?;

            let mut builder = self.http.request(method, &request.url);
            for (key, value) in &request.headers {
                builder = builder.header(key, value);
            }
            if let Some(timeout) = request.timeout {
                builder = builder.timeout(timeout);
            }

            builder = match request.body {
                RequestBody::Multipart { fields, file } => {
                    let total = file.data.len() as u64;
                    let mut form = reqwest::multipart::Form::new();
                    for (key, value) in fields {
                        form = form.text(key, value);
                    }
                    let body = reqwest::Body::wrap_stream(progress_stream(
                        file.data,
                        total,
                        events.clone(),
                    ));
                    let mut part = reqwest::multipart::Part::stream_with_length(body, total)
                        .file_name(file.file_name);
                    if let Some(content_type) = &file.content_type {
                        part = part.mime_str(content_type)?;
                    }
                    builder.multipart(form.part(file.field, part))
                }
                RequestBody::Raw { content_type, data } => {
                    let total = data.len() as u64;
                    let body =
                        reqwest::Body::wrap_stream(progress_stream(data, total, events.clone()));
                    builder
                        .header(reqwest::header::CONTENT_TYPE, content_type)
                        .header(reqwest::header::CONTENT_LENGTH, total)
                        .body(body)
                }
            };

            let response = tokio::select! {
                biased;
                _ = request.cancel.cancelled() => {
                    let _ = events.send(TransportEvent::Aborted).await;
                    return Err(TransferError::Aborted);
                }
                result = builder.send() => match result {
                    Ok(response) => response,
                    Err(e) if e.is_timeout() => {
                        let _ = events.send(TransportEvent::TimedOut).await;
                        return Err(TransferError::TimedOut);
                    }
                    Err(e) => return Err(e.into()),
                },
            };

            let status = response.status();
            let body = match response.bytes().await {
                Ok(bytes) => bytes.to_vec(),
                Err(e) if e.is_timeout() => {
                    let _ = events.send(TransportEvent::TimedOut).await;
                    return Err(TransferError::TimedOut);
                }
                Err(e) => return Err(e.into()),
            };

            if !status.is_success() {
                return Err(TransferError::Http {
                    status: status.as_u16(),
                    body: String::from_utf8_lossy(&body).into_owned(),
                });
            }

            debug!(status = status.as_u16(), "transfer response received");
            Ok(TransportResponse {
                status: status.as_u16(),
                body,
            })
        })
    }
}

/// Wraps `data` in a chunked stream reporting cumulative bytes produced.
fn progress_stream(
    data: Vec<u8>,
    total: u64,
    events: mpsc::Sender<TransportEvent>,
) -> impl futures_util::Stream<Item = Result<Vec<u8>, std::io::Error>> + Send + 'static {
    stream::unfold((data, 0usize), move |(data, offset)| {
        let events = events.clone();
        async move {
            if offset >= data.len() {
                return None;
            }
            let end = (offset + PROGRESS_CHUNK_SIZE).min(data.len());
            let chunk = data[offset..end].to_vec();
            let _ = events
                .send(TransportEvent::Progress {
                    loaded: end as u64,
                    total,
                    length_computable: true,
                })
                .await;
            Some((Ok(chunk), (data, end)))
        }
    })
}
