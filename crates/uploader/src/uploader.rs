//! The chunk loop.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vdrlink_protocol::constants::{CHUNK_SIZE, SINGLE_SHOT_THRESHOLD};
use vdrlink_protocol::{DocumentId, UploadProgress, UploadStatus, UploadTarget, UploadedDocument};
use vdrlink_transfer::{FileHandle, checksum_bytes, plan_with_threshold};

use crate::error::{UploadError, UploadFailure};
use crate::sink::ProgressSink;
use crate::transport::{ChunkReply, ChunkRequest, ChunkTransport, TransferFailure};

/// Tunables for the chunk loop. Defaults are the protocol constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadOptions {
    pub chunk_size: u64,
    pub single_shot_threshold: u64,
    /// Attach a SHA-256 of each chunk body.
    pub send_checksums: bool,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            chunk_size: CHUNK_SIZE,
            single_shot_threshold: SINGLE_SHOT_THRESHOLD,
            send_checksums: true,
        }
    }
}

/// Uploads files one chunk at a time through a [`ChunkTransport`].
///
/// Holds no per-upload state, so one uploader may run several uploads of
/// different files concurrently. Each call is strictly sequential inside.
pub struct ChunkedUploader<T> {
    transport: T,
    options: UploadOptions,
}

impl<T: ChunkTransport> ChunkedUploader<T> {
    /// Creates an uploader with the protocol's default options.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            options: UploadOptions::default(),
        }
    }

    pub fn with_options(mut self, options: UploadOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &UploadOptions {
        &self.options
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Uploads `file` into `target`, publishing progress to `sink`.
    pub async fn upload(
        &self,
        file: &dyn FileHandle,
        target: &UploadTarget,
        sink: &dyn ProgressSink,
    ) -> Result<UploadedDocument, UploadFailure> {
        self.upload_with_cancel(file, target, sink, &CancellationToken::new())
            .await
    }

    /// Like [`upload`](Self::upload), checking `cancel` before every chunk.
    ///
    /// A chunk already in flight is allowed to finish; the loop stops
    /// before the next one. Chunks the service already accepted stay there.
    ///
    /// `sink` sees one `pending` snapshot before the first request, one
    /// `uploading` snapshot per intermediate chunk, and then either a single
    /// `completed` or a single `failed` snapshot.
    pub async fn upload_with_cancel(
        &self,
        file: &dyn FileHandle,
        target: &UploadTarget,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<UploadedDocument, UploadFailure> {
        let document_id = DocumentId::new();
        let total_size = file.total_size();
        let plan = plan_with_threshold(
            total_size,
            self.options.chunk_size,
            self.options.single_shot_threshold,
        );
        let chunk_count = plan.last_number();

        let mut progress = UploadProgress {
            document_id,
            file_name: file.name().to_string(),
            total_size,
            uploaded_size: 0,
            chunks_total: chunk_count,
            chunks_uploaded: 0,
            status: UploadStatus::Pending,
            error: None,
        };
        sink.publish(progress.clone());

        debug!(
            document_id = %document_id,
            file = %progress.file_name,
            project = %target.project_id,
            folder = %target.folder_id,
            total_bytes = total_size,
            chunks = chunk_count,
            "starting upload"
        );

        let mut finalized = None;

        for chunk in &plan {
            if cancel.is_cancelled() {
                let error = UploadError::Cancelled {
                    chunk_number: chunk.number,
                };
                return Err(fail(progress, error, sink));
            }
            progress.status = UploadStatus::Uploading;

            let body = match file.read_range(chunk.offset, chunk.length).await {
                Ok(body) => body,
                Err(source) => {
                    let error = UploadError::Read {
                        chunk_number: chunk.number,
                        source,
                    };
                    return Err(fail(progress, error, sink));
                }
            };

            let request = ChunkRequest {
                target: target.clone(),
                document_id,
                file_name: progress.file_name.clone(),
                chunk_number: chunk.number,
                chunk_count,
                total_size,
                checksum: self.options.send_checksums.then(|| checksum_bytes(&body)),
                body,
            };

            let reply = match self.transport.send_chunk(request).await {
                Ok(reply) => reply,
                Err(failure) => {
                    return Err(fail(progress, map_failure(failure, chunk.number), sink));
                }
            };

            progress.uploaded_size += chunk.length;
            progress.chunks_uploaded += 1;

            debug!(
                document_id = %document_id,
                chunk = chunk.number,
                of = chunk_count,
                bytes = chunk.length,
                uploaded = progress.uploaded_size,
                "chunk accepted"
            );

            let is_final = chunk.number == chunk_count;
            match (reply, is_final) {
                (ChunkReply::Acknowledged(_), false) => sink.publish(progress.clone()),
                (ChunkReply::Finalized(document), true) => finalized = Some(document),
                (ChunkReply::Acknowledged(_), true) => {
                    let error = UploadError::Protocol {
                        chunk_number: chunk.number,
                        message: "final chunk was acknowledged without a document record"
                            .into(),
                    };
                    return Err(fail(progress, error, sink));
                }
                (ChunkReply::Finalized(document), false) => {
                    let error = UploadError::Protocol {
                        chunk_number: chunk.number,
                        message: format!(
                            "service finalized document {} after chunk {} of {}",
                            document.id, chunk.number, chunk_count
                        ),
                    };
                    return Err(fail(progress, error, sink));
                }
            }
        }

        let Some(document) = finalized else {
            let error = UploadError::Protocol {
                chunk_number: chunk_count,
                message: "upload ended without a document record".into(),
            };
            return Err(fail(progress, error, sink));
        };

        progress.status = UploadStatus::Completed;
        sink.publish(progress);

        info!(
            document_id = %document_id,
            vdr_document = %document.id,
            name = %document.name,
            size = document.size,
            chunks = chunk_count,
            "upload completed"
        );

        Ok(document)
    }
}

fn map_failure(failure: TransferFailure, chunk_number: u32) -> UploadError {
    match failure {
        TransferFailure::Transport(source) => UploadError::Transport {
            chunk_number,
            source,
        },
        TransferFailure::Rejected { status, message } => UploadError::Rejected {
            chunk_number,
            status,
            message,
        },
        TransferFailure::InvalidResponse(message) | TransferFailure::InvalidRequest(message) => {
            UploadError::Protocol {
                chunk_number,
                message,
            }
        }
    }
}

/// Publishes the terminal `failed` snapshot and builds the failure.
fn fail(mut progress: UploadProgress, error: UploadError, sink: &dyn ProgressSink) -> UploadFailure {
    progress.status = UploadStatus::Failed;
    progress.error = Some(error.to_string());
    sink.publish(progress.clone());

    warn!(
        document_id = %progress.document_id,
        file = %progress.file_name,
        chunk = error.chunk_number(),
        uploaded = progress.uploaded_size,
        total = progress.total_size,
        error = %error,
        "upload failed"
    );

    UploadFailure { error, progress }
}
