//! Write batching for the backing store.
//!
//! Mutations accumulate in queue order and are applied in transactions of at
//! most `batch_size` mutations. A failed transaction never stops the flush;
//! what happens to its mutations is decided by `FailedBatchPolicy`.

use std::collections::{HashSet, VecDeque};

use chrono::NaiveDate;

use crate::mutation::Mutation;
use crate::root_store::RootStoreBackend;
use crate::settings::{FailedBatchPolicy, DEFAULT_BATCH_SIZE};

/// Outcome of one flush.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Size of every attempted batch, in order.
    pub batch_sizes: Vec<usize>,
    /// Batches that committed.
    pub committed_batches: usize,
    /// Batches whose transaction failed.
    pub failed_batches: usize,
    /// Mutations that reached the store.
    pub applied: usize,
    /// Mutations put back on the queue.
    pub requeued: usize,
    /// Mutations dropped, either by policy or because a later batch superseded them.
    pub discarded: usize,
}

impl FlushReport {
    /// Whether every batch committed.
    pub fn is_clean(&self) -> bool {
        self.failed_batches == 0
    }
}

/// Result of one batch attempt, kept until the flush finishes.
enum Attempt {
    Committed(Vec<String>),
    Failed(Vec<Mutation>),
}

/// Ordered queue of pending mutations.
///
/// The queue does not deduplicate: every mutation is replayed, so the last
/// mutation for a path wins.
#[derive(Debug)]
pub struct WriteBatcher {
    queue: VecDeque<Mutation>,
    batch_size: usize,
    policy: FailedBatchPolicy,
}

impl Default for WriteBatcher {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE, FailedBatchPolicy::default())
    }
}

impl WriteBatcher {
    /// Create an empty batcher.
    ///
    /// # Arguments
    /// * `batch_size` - Maximum mutations per transaction (clamped to at least 1)
    /// * `policy` - Handling of failed batches
    pub fn new(batch_size: usize, policy: FailedBatchPolicy) -> Self {
        Self {
            queue: VecDeque::new(),
            batch_size: batch_size.max(1),
            policy,
        }
    }

    /// Append a mutation.
    pub fn enqueue(&mut self, mutation: Mutation) {
        self.queue.push_back(mutation);
    }

    /// Number of pending mutations.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Pending mutations in queue order.
    pub fn pending(&self) -> impl Iterator<Item = &Mutation> {
        self.queue.iter()
    }

    /// Drop every pending mutation.
    pub fn clear(&mut self) {
        self.queue.clear();
    }

    /// Apply all pending mutations in bounded transactions.
    ///
    /// # Arguments
    /// * `backend` - Store to write to
    /// * `purge_at` - Purge date for soft-deletes in this flush
    ///
    /// Failures are logged with the store's error code and never returned.
    pub async fn flush(
        &mut self,
        backend: &dyn RootStoreBackend,
        purge_at: NaiveDate,
    ) -> FlushReport {
        let mut report: FlushReport = FlushReport::default();
        if self.queue.is_empty() {
            return report;
        }

        log::info!("Bulk updating root store: {} pending mutations", self.queue.len());

        let mut attempts: Vec<Attempt> = Vec::new();
        while !self.queue.is_empty() {
            let count: usize = self.queue.len().min(self.batch_size);
            let batch: Vec<Mutation> = self.queue.drain(..count).collect();
            report.batch_sizes.push(count);

            match backend.apply_batch(&batch, purge_at).await {
                Ok(()) => {
                    log::debug!("Committed batch of {} mutations", count);
                    report.committed_batches += 1;
                    report.applied += count;
                    if self.policy == FailedBatchPolicy::Requeue {
                        attempts.push(Attempt::Committed(
                            batch.iter().map(|m| m.path().to_string()).collect(),
                        ));
                    }
                }
                Err(e) => {
                    log::error!(
                        "Root store batch of {} mutations failed (code {:?}): {}",
                        count,
                        e.code,
                        e.message
                    );
                    report.failed_batches += 1;
                    match self.policy {
                        FailedBatchPolicy::Requeue => attempts.push(Attempt::Failed(batch)),
                        FailedBatchPolicy::Discard => report.discarded += count,
                    }
                }
            }
        }

        let requeue: Vec<Mutation> = retain_unsuperseded(attempts, &mut report);
        if !requeue.is_empty() {
            log::warn!("Requeued {} mutations from failed batches", requeue.len());
        }
        self.queue.extend(requeue);
        report
    }
}

/// Collect failed mutations that no later committed batch has overwritten.
///
/// Replaying a failed mutation after a later one for the same path committed
/// would resurrect stale state, so those are dropped.
fn retain_unsuperseded(attempts: Vec<Attempt>, report: &mut FlushReport) -> Vec<Mutation> {
    let mut later_committed: HashSet<String> = HashSet::new();
    let mut kept_batches: Vec<Vec<Mutation>> = Vec::new();

    for attempt in attempts.into_iter().rev() {
        match attempt {
            Attempt::Committed(paths) => later_committed.extend(paths),
            Attempt::Failed(batch) => {
                let before: usize = batch.len();
                let kept: Vec<Mutation> = batch
                    .into_iter()
                    .filter(|m| !later_committed.contains(m.path()))
                    .collect();
                report.discarded += before - kept.len();
                report.requeued += kept.len();
                kept_batches.push(kept);
            }
        }
    }

    kept_batches.into_iter().rev().flatten().collect()
}
