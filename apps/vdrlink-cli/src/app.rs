//! Upload driver: retries, cancellation and progress reporting.

use std::time::Duration;

use anyhow::Context;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use vdrlink_client::VdrClient;
use vdrlink_protocol::{UploadProgress, UploadStatus, UploadTarget, UploadedDocument};
use vdrlink_transfer::{FileHandle, LocalFile, SpeedCalculator};
use vdrlink_uploader::{ChunkTransport, ChunkedUploader, UploadFailure};

use crate::Cli;
use crate::config::Config;

/// How often a failed upload is started over.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

/// Uploads the file named on the command line.
pub async fn run(config: &Config, cli: &Cli) -> anyhow::Result<UploadedDocument> {
    let client = VdrClient::new(&config.client_config())?;
    let uploader = ChunkedUploader::new(client).with_options(config.upload_options());

    let mut file = LocalFile::open(&cli.file)
        .await
        .with_context(|| format!("opening {}", cli.file.display()))?;
    if let Some(name) = &cli.name {
        file = file.with_name(name.clone());
    }
    let target = UploadTarget::new(cli.project.clone(), cli.folder.clone());

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, stopping after the current chunk");
                cancel.cancel();
            }
        }
    });

    let policy = RetryPolicy {
        max_attempts: config.max_attempts,
        delay: config.retry_delay(),
    };
    let document = upload_with_retries(&uploader, &file, &target, policy, &cancel).await?;
    info!(id = %document.id, name = %document.name, size = document.size, "document stored");
    Ok(document)
}

/// Runs whole-file attempts until one succeeds or the policy is exhausted.
///
/// Every attempt is an independent upload under a fresh document id; the
/// service has no way to resume a partial one. Cancellation is never
/// retried.
pub async fn upload_with_retries<T: ChunkTransport>(
    uploader: &ChunkedUploader<T>,
    file: &dyn FileHandle,
    target: &UploadTarget,
    policy: RetryPolicy,
    cancel: &CancellationToken,
) -> Result<UploadedDocument, UploadFailure> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let (tx, rx) = mpsc::unbounded_channel();
        let reporter = tokio::spawn(report_progress(rx));

        let result = uploader.upload_with_cancel(file, target, &tx, cancel).await;
        drop(tx);
        let _ = reporter.await;

        match result {
            Ok(document) => return Ok(document),
            Err(failure) if failure.error.is_cancelled() || attempt >= max_attempts => {
                return Err(failure);
            }
            Err(failure) => {
                warn!(
                    attempt,
                    max_attempts,
                    document_id = %failure.progress.document_id,
                    error = %failure.error,
                    "upload attempt failed, starting over"
                );
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(policy.delay) => {}
            _ = cancel.cancelled() => {}
        }
        attempt += 1;
    }
}

/// Logs every snapshot of one upload attempt until the sender is dropped.
async fn report_progress(mut rx: mpsc::UnboundedReceiver<UploadProgress>) {
    let mut speed = SpeedCalculator::default();
    let mut last_uploaded = 0u64;

    while let Some(progress) = rx.recv().await {
        speed.add_sample(progress.uploaded_size.saturating_sub(last_uploaded));
        last_uploaded = progress.uploaded_size;

        match progress.status {
            UploadStatus::Pending => info!(
                file = %progress.file_name,
                document_id = %progress.document_id,
                size = %format_bytes(progress.total_size),
                chunks = progress.chunks_total,
                "upload started"
            ),
            UploadStatus::Uploading => {
                let eta = speed
                    .eta(progress.remaining_bytes())
                    .map(|d| format!("{}s", d.as_secs()))
                    .unwrap_or_else(|| "-".into());
                info!(
                    "{} {}/{} chunks, {} of {} ({:.0}%), {}/s, eta {}",
                    progress.file_name,
                    progress.chunks_uploaded,
                    progress.chunks_total,
                    format_bytes(progress.uploaded_size),
                    format_bytes(progress.total_size),
                    progress.percentage(),
                    format_bytes(speed.bytes_per_second() as u64),
                    eta,
                );
            }
            UploadStatus::Completed => info!(
                file = %progress.file_name,
                chunks = progress.chunks_total,
                "all chunks accepted"
            ),
            UploadStatus::Failed => warn!(
                file = %progress.file_name,
                uploaded = %format_bytes(progress.uploaded_size),
                error = progress.error.as_deref().unwrap_or("unknown"),
                "upload failed"
            ),
        }
    }
}

/// Human-readable byte count in binary units.
fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
