//! Chunked document upload into a virtual data room (VDR).
//!
//! [`ChunkedUploader`] drives one file through the service's chunk-upload
//! endpoint: it mints a [`DocumentId`](vdrlink_protocol::DocumentId), plans
//! the chunks, sends them strictly in order through a [`ChunkTransport`],
//! publishes an [`UploadProgress`](vdrlink_protocol::UploadProgress)
//! snapshot after each one and returns the service's finished document.
//!
//! The first failure ends the call. There is no resume: a retry is a new
//! `upload` call, from chunk 1, under a new document id. Retry policy
//! belongs to the caller.

pub mod error;
pub mod sink;
pub mod transport;
pub mod uploader;

// Re-export primary types for convenience.
pub use error::{BoxError, UploadError, UploadFailure};
pub use sink::ProgressSink;
pub use transport::{ChunkReply, ChunkRequest, ChunkTransport, TransferFailure};
pub use uploader::{ChunkedUploader, UploadOptions};
