//! Upload configuration and its defaulting rules.
//!
//! All defaults are resolved once, before the transfer begins, into a
//! [`ResolvedRequest`].

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use uplift_queue::UploadFile;

use crate::TransferError;

/// Default `Accept` values when the caller supplies neither `accepts` nor
/// an explicit `Accept` header.
pub const DEFAULT_ACCEPTS: &[&str] = &["application/json", "text/javascript"];

/// How the payload content type is chosen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ContentTypeOption {
    /// Use the file's own MIME type (skipped when the file has none).
    #[default]
    FromFile,
    /// Use an explicit value.
    Explicit(String),
    /// Send no content type at all.
    Omit,
}

/// Caller-facing upload configuration.
///
/// Every unset field falls back to the defaults described on
/// [`resolve`].
#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    /// Target URL; may instead be passed as an argument to the upload call.
    pub url: Option<String>,
    /// HTTP method, default `POST`.
    pub method: Option<String>,
    /// Accepted response types, default [`DEFAULT_ACCEPTS`].
    pub accepts: Option<Vec<String>>,
    pub content_type: ContentTypeOption,
    /// Extra headers, applied verbatim.
    pub headers: Vec<(String, String)>,
    /// Extra form fields for multipart bodies.
    pub data: Vec<(String, String)>,
    /// Form field carrying the binary payload, default `"file"`.
    pub file_key: Option<String>,
    pub with_credentials: bool,
    pub timeout: Option<Duration>,
    /// External abort trigger.
    pub cancel: Option<CancellationToken>,
}

/// A fully-resolved upload request, ready for a transport.
#[derive(Debug, Clone)]
pub struct ResolvedRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// Form fields, including the injected `Content-Type` entry.
    pub data: Vec<(String, String)>,
    pub content_type: Option<String>,
    pub file_key: String,
    pub with_credentials: bool,
    pub timeout: Option<Duration>,
}

/// Applies the defaulting rules:
///
/// - `url` comes from `options.url`, falling back to the argument; if both
///   are absent the resolve fails with [`TransferError::MissingUrl`].
/// - `method` defaults to `POST`, `file_key` to `"file"`.
/// - `accepts` is joined into an `Accept` header unless the caller already
///   supplied one.
/// - The content type resolves from the file's MIME type unless overridden
///   or suppressed, and is injected into the form data as a `Content-Type`
///   field, never into the HTTP headers. A multipart body always carries
///   the boundary content type at the HTTP level.
pub fn resolve(
    file: &UploadFile,
    url: Option<&str>,
    options: &UploadOptions,
) -> Result<ResolvedRequest, TransferError> {
    let url = options
        .url
        .clone()
        .or_else(|| url.map(str::to_string))
        .ok_or(TransferError::MissingUrl)?;

    let method = options.method.clone().unwrap_or_else(|| "POST".to_string());

    let mut headers = options.headers.clone();
    if !headers
        .iter()
        .any(|(key, _)| key.eq_ignore_ascii_case("accept"))
    {
        let accepts = options
            .accepts
            .clone()
            .unwrap_or_else(|| DEFAULT_ACCEPTS.iter().map(|s| s.to_string()).collect());
        headers.push(("Accept".to_string(), accepts.join(",")));
    }

    let content_type = match &options.content_type {
        ContentTypeOption::FromFile => {
            let mime = file.mime_type();
            if mime.is_empty() {
                None
            } else {
                Some(mime.to_string())
            }
        }
        ContentTypeOption::Explicit(value) => Some(value.clone()),
        ContentTypeOption::Omit => None,
    };

    let mut data = options.data.clone();
    if let Some(content_type) = &content_type {
        data.push(("Content-Type".to_string(), content_type.clone()));
    }

    Ok(ResolvedRequest {
        method,
        url,
        headers,
        data,
        content_type,
        file_key: options
            .file_key
            .clone()
            .unwrap_or_else(|| "file".to_string()),
        with_credentials: options.with_credentials,
        timeout: options.timeout,
    })
}
