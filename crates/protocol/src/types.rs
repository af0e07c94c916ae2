use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where a file goes: a project and a folder inside it.
///
/// Validity of both ids is the service's concern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadTarget {
    pub project_id: String,
    pub folder_id: String,
}

impl UploadTarget {
    pub fn new(project_id: impl Into<String>, folder_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            folder_id: folder_id.into(),
        }
    }
}

/// Client-generated correlation key shared by all chunks of one upload attempt.
///
/// Minted once per attempt, before any network call. A retry gets a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(Uuid);

impl DocumentId {
    /// Mints a fresh random (v4) id.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for DocumentId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Current state of an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Pending,
    Uploading,
    Completed,
    Failed,
}

impl UploadStatus {
    /// `true` for `Completed` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Snapshot of one upload, published after every state change.
///
/// Snapshots are values: the uploader builds a new one per emission and
/// never mutates one it has already handed out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadProgress {
    pub document_id: DocumentId,
    pub file_name: String,
    pub total_size: u64,
    pub uploaded_size: u64,
    pub chunks_total: u32,
    pub chunks_uploaded: u32,
    pub status: UploadStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UploadProgress {
    /// Returns the upload progress as a percentage (0-100).
    ///
    /// An empty file is at 100% once completed and 0% before.
    pub fn percentage(&self) -> f64 {
        if self.total_size == 0 {
            return if self.status == UploadStatus::Completed {
                100.0
            } else {
                0.0
            };
        }
        self.uploaded_size as f64 / self.total_size as f64 * 100.0
    }

    /// Bytes not yet accepted by the service.
    pub fn remaining_bytes(&self) -> u64 {
        self.total_size.saturating_sub(self.uploaded_size)
    }
}

/// The service's record of a finished upload, returned on the final chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedDocument {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub parent_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Acknowledgement body of a non-final chunk. Every field is optional and
/// services may also answer with an empty body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkAck {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_bytes: Option<u64>,
}
