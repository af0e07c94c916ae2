//! Wire protocol types for the VDR chunked document-upload endpoint.
//!
//! Everything here is plain data: constants, identifiers and the JSON
//! records exchanged with the service. No I/O.

pub mod constants;
pub mod types;

// Re-export primary types for convenience.
pub use constants::{CHUNK_SIZE, SINGLE_SHOT_THRESHOLD};
pub use types::{
    ChunkAck, DocumentId, UploadProgress, UploadStatus, UploadTarget, UploadedDocument,
};
