//! Where progress snapshots go.

use tokio::sync::{mpsc, watch};
use vdrlink_protocol::UploadProgress;

/// Receives one owned [`UploadProgress`] per state change.
///
/// Each snapshot is a fresh value, so a reader on another thread sees
/// either the previous snapshot or the new one, never a mix.
pub trait ProgressSink: Send + Sync {
    fn publish(&self, progress: UploadProgress);
}

impl<F> ProgressSink for F
where
    F: Fn(UploadProgress) + Send + Sync,
{
    fn publish(&self, progress: UploadProgress) {
        self(progress)
    }
}

/// Keeps only the latest snapshot.
impl ProgressSink for watch::Sender<UploadProgress> {
    fn publish(&self, progress: UploadProgress) {
        self.send_replace(progress);
    }
}

/// Queues every snapshot. A dropped receiver is ignored.
impl ProgressSink for mpsc::UnboundedSender<UploadProgress> {
    fn publish(&self, progress: UploadProgress) {
        let _ = self.send(progress);
    }
}

/// Discards progress.
impl ProgressSink for () {
    fn publish(&self, _progress: UploadProgress) {}
}
