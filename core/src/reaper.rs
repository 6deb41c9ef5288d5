//! Best-effort cleanup of tags and ingredients that no idea references.
//!
//! Each candidate is checked and deleted in its own transaction, so a failure
//! only loses that one candidate. The [`Reaper`] worker runs batches off the
//! request path; callers never see its errors.

use std::sync::{Arc, Mutex, PoisonError};

use rusqlite::{Transaction, TransactionBehavior};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::db::Database;
use crate::error::Result;
use crate::models::{LabelKind, OrphanCandidate, ReapSummary};
use crate::store::Store;

impl Database {
    /// Delete the candidate if it still exists and has no associations.
    ///
    /// Returns `true` when the record was deleted.
    pub fn reap_candidate(&self, candidate: OrphanCandidate) -> Result<bool> {
        let OrphanCandidate { id, kind } = candidate;
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        if self.find_label(kind, id)?.is_none() {
            return Ok(false);
        }
        if self.count_ideas_for(kind, id)? > 0 {
            return Ok(false);
        }
        let removed = self.delete_label(kind, id)?;
        tx.commit()?;
        Ok(removed)
    }

    /// Reap every candidate, logging and skipping the ones that fail.
    pub fn reap(&self, candidates: &[OrphanCandidate]) -> ReapSummary {
        let mut summary = ReapSummary::default();
        for &candidate in candidates {
            match self.reap_candidate(candidate) {
                Ok(true) => {
                    debug!(kind = %candidate.kind, id = candidate.id, "reaped orphan");
                    summary.removed += 1;
                }
                Ok(false) => summary.kept += 1,
                Err(e) => {
                    warn!(kind = %candidate.kind, id = candidate.id, error = %e, "failed to reap orphan");
                    summary.failed += 1;
                }
            }
        }
        summary
    }

    /// Every tag and ingredient with zero associations.
    pub fn orphaned_labels(&self) -> Result<Vec<OrphanCandidate>> {
        let mut orphans = Vec::new();
        for kind in LabelKind::ALL {
            let sql = format!(
                "SELECT id FROM {table} WHERE id NOT IN (SELECT {column} FROM {join}) ORDER BY id",
                table = kind.table(),
                column = kind.join_column(),
                join = kind.join_table(),
            );
            let mut stmt = self.conn.prepare(&sql)?;
            let ids = stmt
                .query_map([], |row| row.get(0))?
                .collect::<std::result::Result<Vec<i64>, _>>()?;
            orphans.extend(ids.into_iter().map(|id| OrphanCandidate { id, kind }));
        }
        Ok(orphans)
    }

    pub fn reap_all_orphans(&self) -> Result<ReapSummary> {
        let candidates = self.orphaned_labels()?;
        Ok(self.reap(&candidates))
    }
}

enum Job {
    Reap(Vec<OrphanCandidate>),
    Flush(oneshot::Sender<()>),
    Shutdown,
}

/// Handle to the background reaper task.
#[derive(Clone)]
pub struct Reaper {
    tx: mpsc::UnboundedSender<Job>,
    worker: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl Reaper {
    /// Start the worker on the current tokio runtime.
    #[must_use]
    pub fn spawn(store: Store) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(work(store, rx));
        Self {
            tx,
            worker: Arc::new(Mutex::new(Some(worker))),
        }
    }

    /// Queue a batch without waiting for it.
    pub fn dispatch(&self, candidates: Vec<OrphanCandidate>) {
        if candidates.is_empty() {
            return;
        }
        if self.tx.send(Job::Reap(candidates)).is_err() {
            warn!("orphan reaper has stopped, dropping batch");
        }
    }

    /// Wait until every batch queued before this call has been processed.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.tx.send(Job::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }

    /// Process what is already queued, then stop the worker and wait for it.
    pub async fn shutdown(&self) {
        let _ = self.tx.send(Job::Shutdown);
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "orphan reaper task ended abnormally");
            }
        }
    }
}

async fn work(store: Store, mut rx: mpsc::UnboundedReceiver<Job>) {
    while let Some(job) = rx.recv().await {
        match job {
            Job::Reap(candidates) => {
                let count = candidates.len();
                match store.run(move |db| Ok(db.reap(&candidates))).await {
                    Ok(summary) => debug!(
                        candidates = count,
                        removed = summary.removed,
                        kept = summary.kept,
                        failed = summary.failed,
                        "orphan batch processed"
                    ),
                    Err(e) => warn!(candidates = count, error = %e, "orphan batch failed"),
                }
            }
            Job::Flush(done) => {
                let _ = done.send(());
            }
            Job::Shutdown => break,
        }
    }
    info!("orphan reaper stopped");
}
