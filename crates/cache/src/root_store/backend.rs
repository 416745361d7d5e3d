//! Backing store trait.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::entry::StoredRecord;
use crate::error::StoreError;
use crate::mutation::Mutation;

/// Durable store the root cache synchronizes with.
///
/// Unlike the cache facade, every method reports failures: the cache decides
/// which ones are fatal (load) and which are logged and tolerated (flush).
#[async_trait]
pub trait RootStoreBackend: Send + Sync {
    /// Create the schema if it does not exist.
    async fn ensure_schema(&self) -> Result<(), StoreError>;

    /// Fetch every persisted row.
    ///
    /// Rows that cannot be decoded are skipped with a warning.
    async fn load_all(&self) -> Result<Vec<StoredRecord>, StoreError>;

    /// Apply a batch of mutations as one transaction.
    ///
    /// # Arguments
    /// * `batch` - Mutations in queue order
    /// * `purge_at` - Purge date written by soft-deletes in this batch
    ///
    /// Either every mutation commits or none does.
    async fn apply_batch(&self, batch: &[Mutation], purge_at: NaiveDate) -> Result<(), StoreError>;

    /// Delete rows whose purge date is before `today`.
    ///
    /// # Returns
    /// Number of rows deleted.
    async fn purge_expired(&self, today: NaiveDate) -> Result<usize, StoreError>;
}
