//! Typed write-queue records.

use crate::entry::CacheEntry;

/// A pending change to the backing store.
///
/// Mutations are rendered into store statements only when flushed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Insert or replace the row at the entry's path and clear any purge schedule.
    Upsert(CacheEntry),
    /// Schedule the row at `path` for purge after the grace period.
    SoftDelete {
        /// Logical path of the row.
        path: String,
    },
}

impl Mutation {
    /// Soft-delete mutation for a path.
    pub fn soft_delete(path: impl Into<String>) -> Self {
        Self::SoftDelete { path: path.into() }
    }

    /// Logical path this mutation targets.
    pub fn path(&self) -> &str {
        match self {
            Mutation::Upsert(entry) => entry.path(),
            Mutation::SoftDelete { path } => path,
        }
    }
}
