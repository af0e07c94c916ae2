//! The "send one chunk" collaborator.
//!
//! The uploader never talks HTTP itself. An HTTP client implements
//! [`ChunkTransport`] and is handed to the uploader at construction, which
//! keeps the sequencing logic testable with in-memory fakes.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use vdrlink_protocol::{ChunkAck, DocumentId, UploadTarget, UploadedDocument};

use crate::error::BoxError;

/// Everything the service needs for one chunk.
#[derive(Debug, Clone)]
pub struct ChunkRequest {
    pub target: UploadTarget,
    pub document_id: DocumentId,
    pub file_name: String,
    /// 1-based chunk number.
    pub chunk_number: u32,
    /// Number of chunks in this upload. Not sent; tells the transport
    /// which response shape to expect.
    pub chunk_count: u32,
    pub total_size: u64,
    /// Hex SHA-256 of `body`, when enabled.
    pub checksum: Option<String>,
    pub body: Vec<u8>,
}

impl ChunkRequest {
    /// `true` for the chunk whose response carries the document record.
    pub fn is_final(&self) -> bool {
        self.chunk_number == self.chunk_count
    }
}

/// Successful answer to one chunk.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkReply {
    /// Intermediate chunk accepted.
    Acknowledged(Option<ChunkAck>),
    /// Final chunk accepted; the service assembled the document.
    Finalized(UploadedDocument),
}

/// Why a chunk was not accepted.
#[derive(Debug, thiserror::Error)]
pub enum TransferFailure {
    #[error("transport error: {0}")]
    Transport(#[source] BoxError),

    #[error("service rejected chunk (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The request could not be built, e.g. a folder id that is not a
    /// valid header value.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Sends one chunk and waits for the service's answer.
pub trait ChunkTransport: Send + Sync {
    fn send_chunk(
        &self,
        request: ChunkRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ChunkReply, TransferFailure>> + Send + '_>>;
}

impl<T: ChunkTransport + ?Sized> ChunkTransport for Arc<T> {
    fn send_chunk(
        &self,
        request: ChunkRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ChunkReply, TransferFailure>> + Send + '_>> {
        (**self).send_chunk(request)
    }
}

impl<T: ChunkTransport + ?Sized> ChunkTransport for &T {
    fn send_chunk(
        &self,
        request: ChunkRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ChunkReply, TransferFailure>> + Send + '_>> {
        (**self).send_chunk(request)
    }
}
