//! Batch synchronization of the records waiting in the local store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::{Error, Result};
use crate::record::{ObservationRecord, Status};
use crate::remote::{OcctaxApi, RemoteClient};
use crate::store::LocalStore;

/// Progress of one record within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncProgress {
    /// Records left to process, this one included.
    pub remaining: usize,
    pub internal_id: i64,
    pub status: Status,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncFailure {
    pub internal_id: i64,
    pub reason: String,
}

/// Outcome of a run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Internal ids of the records now on the server and gone locally.
    pub synchronized: Vec<i64>,
    pub failures: Vec<SyncFailure>,
    pub cancelled: bool,
}

impl SyncReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }
}

/// Sends every record marked for synchronization, one at a time.
///
/// Only one run may be active per store: a second call made while a run is
/// in progress, from this engine or any other engine or process using the
/// same inputs directory, fails right away with [`Error::SyncAlreadyRunning`].
pub struct SyncEngine<A> {
    store: LocalStore,
    client: RemoteClient<A>,
    delay: Duration,
    is_running: AtomicBool,
}

/// Clears the running flag when a run ends, however it ends.
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<A: OcctaxApi> SyncEngine<A> {
    /// `delay` is the pause between two records.
    pub fn new(store: LocalStore, client: RemoteClient<A>, delay: Duration) -> Self {
        SyncEngine {
            store,
            client,
            delay,
            is_running: AtomicBool::new(false),
        }
    }

    pub fn client(&self) -> &RemoteClient<A> {
        &self.client
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Acquire)
    }

    /// Runs one batch. Per-record failures do not stop the batch; they are
    /// collected in the report and the record stays pending locally.
    /// Cancellation is honored between records.
    pub async fn synchronize(
        &self,
        progress: mpsc::UnboundedSender<SyncProgress>,
        cancel: CancellationToken,
    ) -> Result<SyncReport> {
        if self
            .is_running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::SyncAlreadyRunning);
        }

        let _guard = RunGuard(&self.is_running);
        let _lock = self.store.try_lock_sync()?;

        let records = self.store.read_to_sync().await;
        let total = records.len();
        let mut report = SyncReport::default();

        info!(total, "starting synchronization");

        for (index, record) in records.iter().enumerate() {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            if index > 0 && !self.delay.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        report.cancelled = true;
                        break;
                    }
                    _ = tokio::time::sleep(self.delay) => {}
                }
            }

            let remaining = total - index;
            let notify = |status| {
                // A dropped receiver only means nobody is watching.
                let _ = progress.send(SyncProgress {
                    remaining,
                    internal_id: record.internal_id,
                    status,
                });
            };

            notify(Status::SyncInProgress);

            match self.synchronize_record(record).await {
                Ok(()) => {
                    info!(internal_id = record.internal_id, "record synchronized");
                    report.synchronized.push(record.internal_id);
                    notify(Status::SyncSuccessful);
                }
                Err(e) => {
                    warn!(internal_id = record.internal_id, error = %e, "record synchronization failed");
                    report.failures.push(SyncFailure {
                        internal_id: record.internal_id,
                        reason: e.to_string(),
                    });
                    notify(Status::SyncError);
                }
            }
        }

        info!(
            synchronized = report.synchronized.len(),
            failed = report.failures.len(),
            cancelled = report.cancelled,
            "synchronization finished"
        );

        Ok(report)
    }

    async fn synchronize_record(&self, record: &ObservationRecord) -> Result<()> {
        let sent = self.client.send_observation_record(record).await?;

        if let Err(e) = self.client.send_taxa(&sent).await {
            warn!(internal_id = record.internal_id, id = ?sent.id, "rolling back partial upload");

            if let Err(rollback) = self.client.delete_observation_record(&sent).await {
                error!(
                    internal_id = record.internal_id,
                    error = %rollback,
                    "failed to delete partial record from the server"
                );
            }

            return Err(e);
        }

        if let Err(e) = self.store.delete(record.internal_id).await {
            error!(
                internal_id = record.internal_id,
                id = ?sent.id,
                error = %e,
                "record is on the server but its local copy could not be removed"
            );

            return Err(Error::synchronize(
                record.internal_id,
                format!(
                    "sent as {} but the local copy could not be removed: {e}",
                    sent.server_visible_id()
                ),
            ));
        }

        Ok(())
    }
}
