//! VDR upload API client.
//!
//! Async HTTP client using `reqwest` with Bearer token authentication.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use tracing::{debug, trace};
use vdrlink_protocol::constants::{
    CHUNK_CONTENT_TYPE, CHUNK_REQUEST_TIMEOUT, HEADER_CHUNK_CHECKSUM, HEADER_CHUNK_NUMBER,
    HEADER_DOCUMENT_ID, HEADER_FILE_NAME, HEADER_FOLDER_ID, HEADER_TOTAL_SIZE, upload_path,
};
use vdrlink_protocol::{ChunkAck, UploadedDocument};
use vdrlink_uploader::{ChunkReply, ChunkRequest, ChunkTransport, TransferFailure};

/// RFC 3986 unreserved characters stay as-is; everything else is escaped.
const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Longest service error body kept in a rejection message.
const MAX_ERROR_BODY: usize = 512;

/// Errors from building the client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid API token")]
    InvalidToken,

    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
}

/// Connection settings for one VDR service.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API root, e.g. `https://vdr.example.com/api/v1`.
    pub base_url: String,
    /// Bearer token. Acquiring it is the caller's job.
    pub token: String,
    /// Per-chunk request timeout.
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
            timeout: CHUNK_REQUEST_TIMEOUT,
        }
    }
}

/// VDR document-upload client.
pub struct VdrClient {
    http: reqwest::Client,
    base_url: String,
}

impl VdrClient {
    /// Creates a client that authenticates every request with `config.token`.
    pub fn new(config: &ClientConfig) -> Result<Self, Error> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(Error::InvalidBaseUrl(config.base_url.clone()));
        }

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.token))
            .map_err(|_| Error::InvalidToken)?;
        auth.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(concat!("vdrlink/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()?;

        Ok(Self { http, base_url })
    }

    /// Full upload URL for a project.
    fn upload_url(&self, project_id: &str) -> String {
        let project = utf8_percent_encode(project_id, UNRESERVED).to_string();
        format!("{}{}", self.base_url, upload_path(&project))
    }

    /// Sends one chunk and decodes the service's answer.
    pub async fn upload_chunk(&self, request: ChunkRequest) -> Result<ChunkReply, TransferFailure> {
        let url = self.upload_url(&request.target.project_id);
        let headers = chunk_headers(&request)?;
        let is_final = request.is_final();
        let chunk_number = request.chunk_number;

        trace!(%url, chunk = chunk_number, bytes = request.body.len(), "sending chunk");

        let resp = self
            .http
            .post(&url)
            .headers(headers)
            .body(request.body)
            .send()
            .await
            .map_err(|e| TransferFailure::Transport(Box::new(e)))?;
        let status = resp.status();

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TransferFailure::Rejected {
                status: status.as_u16(),
                message: truncate(body.trim(), MAX_ERROR_BODY),
            });
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| TransferFailure::Transport(Box::new(e)))?;

        if is_final {
            let document: UploadedDocument = serde_json::from_slice(&body).map_err(|e| {
                TransferFailure::InvalidResponse(format!("undecodable document record: {e}"))
            })?;
            return Ok(ChunkReply::Finalized(document));
        }

        Ok(ChunkReply::Acknowledged(parse_ack(&body, chunk_number)))
    }
}

impl ChunkTransport for VdrClient {
    fn send_chunk(
        &self,
        request: ChunkRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ChunkReply, TransferFailure>> + Send + '_>> {
        Box::pin(self.upload_chunk(request))
    }
}

/// Builds the out-of-band metadata headers for one chunk.
fn chunk_headers(request: &ChunkRequest) -> Result<HeaderMap, TransferFailure> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(CHUNK_CONTENT_TYPE));

    let folder = HeaderValue::from_str(&request.target.folder_id).map_err(|_| {
        TransferFailure::InvalidRequest(format!(
            "folder id {:?} is not a valid header value",
            request.target.folder_id
        ))
    })?;
    headers.insert(HeaderName::from_static(HEADER_FOLDER_ID), folder);

    let fields = [
        (
            HEADER_FILE_NAME,
            utf8_percent_encode(&request.file_name, UNRESERVED).to_string(),
        ),
        (HEADER_DOCUMENT_ID, request.document_id.to_string()),
        (HEADER_CHUNK_NUMBER, request.chunk_number.to_string()),
        (HEADER_TOTAL_SIZE, request.total_size.to_string()),
    ];
    for (name, value) in fields {
        // Percent-encoded and numeric values are always valid header text.
        let value = HeaderValue::from_str(&value)
            .map_err(|e| TransferFailure::InvalidRequest(format!("{name}: {e}")))?;
        headers.insert(HeaderName::from_static(name), value);
    }

    if let Some(checksum) = &request.checksum {
        let value = HeaderValue::from_str(checksum)
            .map_err(|e| TransferFailure::InvalidRequest(format!("{HEADER_CHUNK_CHECKSUM}: {e}")))?;
        headers.insert(HeaderName::from_static(HEADER_CHUNK_CHECKSUM), value);
    }

    Ok(headers)
}

/// Intermediate acks carry no required data; an empty or unexpected body
/// still counts as an acknowledgement.
fn parse_ack(body: &[u8], chunk_number: u32) -> Option<ChunkAck> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    match serde_json::from_slice::<ChunkAck>(body) {
        Ok(ack) => Some(ack),
        Err(e) => {
            debug!(chunk = chunk_number, error = %e, "ignoring unparseable chunk ack");
            None
        }
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}
