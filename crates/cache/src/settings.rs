//! Configuration for the root cache.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CacheError;

/// Default number of mutations applied per store transaction.
pub const DEFAULT_BATCH_SIZE: usize = 2500;

/// Default grace period in days between soft-delete and purge.
pub const DEFAULT_PURGE_GRACE_DAYS: u32 = 7;

/// What to do with the mutations of a batch whose transaction failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailedBatchPolicy {
    /// Put the batch back at the front of the queue for the next flush.
    #[default]
    Requeue,
    /// Drop the batch. The index keeps the changes but the store never sees them.
    Discard,
}

/// Settings for `RootCache`.
///
/// # Example
///
/// ```ignore
/// let settings = CacheSettings::default()
///     .with_batch_size(1000)
///     .with_failed_batch_policy(FailedBatchPolicy::Discard);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Maximum mutations per store transaction.
    pub batch_size: usize,
    /// Days a soft-deleted row waits before it is purged.
    pub purge_grace_days: u32,
    /// Handling of failed flush batches.
    pub failed_batch_policy: FailedBatchPolicy,
    /// Lowest file data id handed out to new files.
    pub minimum_file_data_id: u32,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            purge_grace_days: DEFAULT_PURGE_GRACE_DAYS,
            failed_batch_policy: FailedBatchPolicy::default(),
            minimum_file_data_id: 0,
        }
    }
}

impl CacheSettings {
    /// Read settings from a JSON file. Missing fields take their defaults.
    ///
    /// # Errors
    /// Returns error if the file cannot be read, parsed, or fails validation.
    pub fn from_json_file(path: &Path) -> Result<Self, CacheError> {
        let text: String = std::fs::read_to_string(path).map_err(|e| CacheError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_json_str(&text)
    }

    /// Parse settings from JSON text. Missing fields take their defaults.
    ///
    /// # Errors
    /// Returns error if the text is not valid JSON or fails validation.
    pub fn from_json_str(text: &str) -> Result<Self, CacheError> {
        let settings: CacheSettings =
            serde_json::from_str(text).map_err(|e| CacheError::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check that the settings are usable.
    ///
    /// # Errors
    /// Returns error if `batch_size` is zero.
    pub fn validate(&self) -> Result<(), CacheError> {
        if self.batch_size == 0 {
            return Err(CacheError::Config("batch_size must be at least 1".into()));
        }
        Ok(())
    }

    /// Set the maximum mutations per transaction.
    ///
    /// # Arguments
    /// * `batch_size` - Mutations per transaction, at least 1
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the purge grace period.
    ///
    /// # Arguments
    /// * `days` - Days between soft-delete and purge
    pub fn with_purge_grace_days(mut self, days: u32) -> Self {
        self.purge_grace_days = days;
        self
    }

    /// Set the failed batch policy.
    pub fn with_failed_batch_policy(mut self, policy: FailedBatchPolicy) -> Self {
        self.failed_batch_policy = policy;
        self
    }

    /// Set the lowest file data id for new files.
    pub fn with_minimum_file_data_id(mut self, id: u32) -> Self {
        self.minimum_file_data_id = id;
        self
    }
}

/// Connection options for `SqliteRootStore`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteStoreOptions {
    /// How long to wait on a locked database before failing.
    pub busy_timeout: Duration,
    /// Use write-ahead logging.
    pub wal: bool,
}

impl Default for SqliteStoreOptions {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_secs(5),
            wal: true,
        }
    }
}
