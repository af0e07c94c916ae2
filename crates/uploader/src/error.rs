//! Upload error types.

use vdrlink_protocol::UploadProgress;

/// Boxed cause carried by transport failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Terminal failure of one upload call. Every variant names the chunk it
/// happened on.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// Connection, DNS or timeout failure while sending a chunk.
    #[error("chunk {chunk_number}: transport error: {source}")]
    Transport {
        chunk_number: u32,
        #[source]
        source: BoxError,
    },

    /// The service answered the chunk with a non-success status.
    #[error("chunk {chunk_number}: rejected by service (HTTP {status}): {message}")]
    Rejected {
        chunk_number: u32,
        status: u16,
        message: String,
    },

    /// The caller cancelled before this chunk was sent.
    #[error("cancelled before chunk {chunk_number}")]
    Cancelled { chunk_number: u32 },

    /// The chunk's byte range could not be read from the source file.
    #[error("chunk {chunk_number}: failed to read file: {source}")]
    Read {
        chunk_number: u32,
        #[source]
        source: std::io::Error,
    },

    /// The service answered in a way the protocol does not allow.
    #[error("chunk {chunk_number}: protocol error: {message}")]
    Protocol { chunk_number: u32, message: String },
}

impl UploadError {
    /// The 1-based chunk the upload stopped at.
    pub fn chunk_number(&self) -> u32 {
        match self {
            Self::Transport { chunk_number, .. }
            | Self::Rejected { chunk_number, .. }
            | Self::Cancelled { chunk_number }
            | Self::Read { chunk_number, .. }
            | Self::Protocol { chunk_number, .. } => *chunk_number,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// An [`UploadError`] together with the last progress snapshot published
/// before the call returned, so callers can report how far it got.
#[derive(Debug, thiserror::Error)]
#[error(
    "upload of {} failed after {} of {} bytes",
    .progress.file_name,
    .progress.uploaded_size,
    .progress.total_size
)]
pub struct UploadFailure {
    #[source]
    pub error: UploadError,
    pub progress: UploadProgress,
}
