//! In-process backend for the root index.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::NaiveDate;

use super::backend::RootStoreBackend;
use crate::entry::StoredRecord;
use crate::error::StoreError;
use crate::mutation::Mutation;

/// Error code reported by injected failures.
pub const INJECTED_FAILURE_CODE: i32 = -1;

#[derive(Debug, Default)]
struct MemoryState {
    rows: HashMap<String, StoredRecord>,
    unavailable: bool,
    failures_pending: usize,
    batch_sizes: Vec<usize>,
}

/// In-memory `RootStoreBackend`.
///
/// Follows the same row semantics as `SqliteRootStore`. Store outages and
/// failed batches can be injected, and every attempted batch size is
/// recorded, which makes it suitable for exercising the cache's
/// failure handling.
#[derive(Debug, Default)]
pub struct MemoryRootStore {
    state: Mutex<MemoryState>,
}

impl MemoryRootStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with rows.
    pub fn with_records(records: impl IntoIterator<Item = StoredRecord>) -> Self {
        let store: MemoryRootStore = Self::new();
        {
            let mut state = store.state();
            for record in records {
                state.rows.insert(record.entry.path().to_string(), record);
            }
        }
        store
    }

    /// Simulate the store being unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state().unavailable = unavailable;
    }

    /// Make the next `count` batches fail without applying anything.
    pub fn fail_next_batches(&self, count: usize) {
        self.state().failures_pending = count;
    }

    /// Sizes of every batch attempted so far, failed ones included.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.state().batch_sizes.clone()
    }

    /// Snapshot of all rows, sorted by path.
    pub fn records(&self) -> Vec<StoredRecord> {
        let mut records: Vec<StoredRecord> = self.state().rows.values().cloned().collect();
        records.sort_by(|a, b| a.entry.path().cmp(b.entry.path()));
        records
    }

    /// Row stored at `path`, if any.
    pub fn get(&self, path: &str) -> Option<StoredRecord> {
        self.state().rows.get(path).cloned()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn unavailable() -> StoreError {
    StoreError::new(Some(INJECTED_FAILURE_CODE), "store unavailable")
}

#[async_trait]
impl RootStoreBackend for MemoryRootStore {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        if self.state().unavailable {
            return Err(unavailable());
        }
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<StoredRecord>, StoreError> {
        if self.state().unavailable {
            return Err(unavailable());
        }
        Ok(self.records())
    }

    async fn apply_batch(&self, batch: &[Mutation], purge_at: NaiveDate) -> Result<(), StoreError> {
        let mut state = self.state();
        state.batch_sizes.push(batch.len());

        if state.unavailable {
            return Err(unavailable());
        }
        if state.failures_pending > 0 {
            state.failures_pending -= 1;
            return Err(StoreError::new(
                Some(INJECTED_FAILURE_CODE),
                "injected batch failure",
            ));
        }

        for mutation in batch {
            match mutation {
                Mutation::Upsert(entry) => {
                    state
                        .rows
                        .insert(entry.path().to_string(), StoredRecord::live(entry.clone()));
                }
                Mutation::SoftDelete { path } => {
                    if let Some(row) = state.rows.get_mut(path) {
                        row.purge_at = Some(purge_at);
                    }
                }
            }
        }
        Ok(())
    }

    async fn purge_expired(&self, today: NaiveDate) -> Result<usize, StoreError> {
        let mut state = self.state();
        if state.unavailable {
            return Err(unavailable());
        }
        let before: usize = state.rows.len();
        state
            .rows
            .retain(|_, row| !matches!(row.purge_at, Some(date) if date < today));
        Ok(before - state.rows.len())
    }
}
