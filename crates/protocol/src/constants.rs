use std::time::Duration;

/// Size of every chunk except possibly the last (20 MiB).
pub const CHUNK_SIZE: u64 = 20 * 1024 * 1024;

/// Files at or below this size are sent as a single chunk numbered 1 (20 MiB).
pub const SINGLE_SHOT_THRESHOLD: u64 = 20 * 1024 * 1024;

/// Timeout for one chunk POST.
///
/// A full 20 MiB body on a slow uplink can take minutes; the service also
/// reassembles the document before answering the final chunk.
pub const CHUNK_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Content type of every chunk body.
pub const CHUNK_CONTENT_TYPE: &str = "application/octet-stream";

/// Destination folder identifier.
pub const HEADER_FOLDER_ID: &str = "x-folder-id";

/// Percent-encoded UTF-8 file name.
pub const HEADER_FILE_NAME: &str = "x-file-name";

/// Client-minted document id, identical on every chunk of one upload.
pub const HEADER_DOCUMENT_ID: &str = "x-document-id";

/// 1-based chunk number.
pub const HEADER_CHUNK_NUMBER: &str = "x-chunk-number";

/// Total file size in bytes. Lets the service detect the final chunk.
pub const HEADER_TOTAL_SIZE: &str = "x-total-size";

/// Hex SHA-256 of the chunk body (optional).
pub const HEADER_CHUNK_CHECKSUM: &str = "x-chunk-checksum";

/// Returns the upload endpoint path for a project.
pub fn upload_path(project_id: &str) -> String {
    format!("/projects/{project_id}/documents/upload")
}
