//! Background uploads and downloads with observable progress.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::{DriveError, Result};

/// Lifecycle of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    InProgress,
    Completed,
    Failed,
}

/// Snapshot of a transfer's progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    pub status: TransferStatus,
    pub bytes_transferred: u64,
    /// Unknown until the server reports a length, for downloads.
    pub total_bytes: Option<u64>,
}

impl TransferProgress {
    fn started(total_bytes: Option<u64>) -> Self {
        Self {
            status: TransferStatus::InProgress,
            bytes_transferred: 0,
            total_bytes,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status != TransferStatus::InProgress
    }
}

/// Write side of the progress channel, shared with the transfer task.
#[derive(Clone)]
pub(crate) struct ProgressReporter {
    tx: Arc<watch::Sender<TransferProgress>>,
}

impl ProgressReporter {
    pub(crate) fn advance(&self, bytes: u64) {
        self.tx.send_modify(|p| p.bytes_transferred += bytes);
    }

    pub(crate) fn set_total(&self, total: Option<u64>) {
        self.tx.send_modify(|p| p.total_bytes = total);
    }

    fn finish(&self, status: TransferStatus) {
        self.tx.send_modify(|p| p.status = status);
    }
}

/// Marks the transfer failed if the task is torn down before finishing.
struct FinishGuard(ProgressReporter);

impl Drop for FinishGuard {
    fn drop(&mut self) {
        self.0.tx.send_if_modified(|p| {
            if p.status == TransferStatus::InProgress {
                p.status = TransferStatus::Failed;
                true
            } else {
                false
            }
        });
    }
}

/// Handle to a transfer running on the tokio runtime.
///
/// The transfer proceeds whether or not the handle is polled. Call
/// [`TransferHandle::wait`] to get the result; a failed transfer returns its
/// error there rather than a partial value.
pub struct TransferHandle<T> {
    progress: watch::Receiver<TransferProgress>,
    task: JoinHandle<Result<T>>,
}

impl<T: Send + 'static> TransferHandle<T> {
    /// Spawn `transfer` on the current runtime.
    pub(crate) fn spawn<F, Fut>(total_bytes: Option<u64>, transfer: F) -> Self
    where
        F: FnOnce(ProgressReporter) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let (tx, rx) = watch::channel(TransferProgress::started(total_bytes));
        let reporter = ProgressReporter { tx: Arc::new(tx) };
        let fut = transfer(reporter.clone());

        let guard = FinishGuard(reporter);
        let task = tokio::spawn(async move {
            let result = fut.await;
            guard.0.finish(if result.is_ok() {
                TransferStatus::Completed
            } else {
                TransferStatus::Failed
            });
            result
        });

        Self { progress: rx, task }
    }

    /// Latest progress update.
    pub fn progress(&self) -> TransferProgress {
        *self.progress.borrow()
    }

    /// A receiver that is notified on every progress update.
    pub fn subscribe(&self) -> watch::Receiver<TransferProgress> {
        self.progress.clone()
    }

    /// Wait for the transfer to reach a terminal state.
    pub async fn wait(self) -> Result<T> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(DriveError::TransferAborted(e.to_string())),
        }
    }
}
