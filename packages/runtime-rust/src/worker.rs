//! Serial job worker.
//!
//! Each worker owns a bounded queue and a tokio task that runs queued jobs
//! one at a time in submission order. Property writes go through one worker
//! per property, which is what keeps writes to the same property ordered.

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};
use wot_core::BoxFuture;

/// A unit of work run by a [`SerialWorker`].
pub type Job = BoxFuture<()>;

/// Why a job could not be queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error("worker queue is full")]
    Full,
    #[error("worker has stopped")]
    Closed,
}

/// Handle to a running serial worker. Dropping every handle closes the queue;
/// the worker drains what is already queued and then exits.
#[derive(Debug, Clone)]
pub struct SerialWorker {
    tx: mpsc::Sender<Job>,
}

impl SerialWorker {
    /// Spawns the worker task on `runtime` with a queue of `capacity` jobs.
    #[must_use]
    pub fn start(runtime: &Handle, label: String, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<Job>(capacity.max(1));
        let spawner = runtime.clone();

        runtime.spawn(async move {
            debug!(worker = %label, "serial worker started");
            while let Some(job) = rx.recv().await {
                // Each job runs as its own task so a panicking job fails alone
                // instead of taking the queue down with it.
                if let Err(err) = spawner.spawn(job).await {
                    warn!(worker = %label, error = %err, "serial job failed");
                }
            }
            debug!(worker = %label, "serial worker stopped");
        });

        Self { tx }
    }

    /// Queues `job` without waiting for capacity.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError::Full`] when the queue is at capacity and
    /// [`SubmitError::Closed`] when the worker task has exited.
    pub fn try_submit(&self, job: Job) -> Result<(), SubmitError> {
        self.tx.try_send(job).map_err(|err| match err {
            TrySendError::Full(_) => SubmitError::Full,
            TrySendError::Closed(_) => SubmitError::Closed,
        })
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }
}
