//! Load-time reconciliation of persisted rows against the filesystem.
//!
//! Every persisted row is classified once per load:
//!
//! | staged file | purge_at     | file_data_id | outcome              |
//! |-------------|--------------|--------------|----------------------|
//! | present     | unset        | any          | keep                 |
//! | any         | any          | 0            | keep                 |
//! | missing     | unset        | non-zero     | schedule soft-delete |
//! | any         | <= today     | non-zero     | hard purge           |
//! | any         | > today      | non-zero     | drop                 |
//!
//! A kept bootstrap row that carries a purge date is re-upserted so the
//! store sweep cannot remove a row the index still holds.

use std::collections::{HashMap, HashSet};

use casc_host_filesystem::ContentFiles;
use chrono::NaiveDate;

use crate::entry::{CacheEntry, StoredRecord};
use crate::mutation::Mutation;

/// What to do with one persisted row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Insert into the index.
    Keep,
    /// Leave out of the index and schedule the row for purge.
    ScheduleSoftDelete,
    /// Leave out of the index and delete its content files now.
    HardPurge,
    /// Leave out of the index without touching anything.
    Drop,
}

/// Classify a persisted row.
///
/// # Arguments
/// * `record` - The persisted row
/// * `today` - Current date
/// * `staged_exists` - Whether the staged copy of the row's path exists
pub fn classify(record: &StoredRecord, today: NaiveDate, staged_exists: bool) -> Disposition {
    match record.purge_at {
        None if staged_exists => Disposition::Keep,
        _ if record.entry.is_bootstrap() => Disposition::Keep,
        None => Disposition::ScheduleSoftDelete,
        Some(date) if date <= today => Disposition::HardPurge,
        Some(_) => Disposition::Drop,
    }
}

/// Counts from one load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Rows inserted into the index.
    pub kept: usize,
    /// Rows newly scheduled for purge.
    pub scheduled: usize,
    /// Rows whose content was purged.
    pub purged: usize,
    /// Rows scheduled for a future purge and left out of the index.
    pub dropped: usize,
    /// Rows removed by the store's purge sweep.
    pub swept: usize,
    /// Kept bootstrap rows whose pending purge was cleared.
    pub restored: usize,
}

/// Result of reconciling all persisted rows.
#[derive(Debug, Default)]
pub struct Reconciliation {
    /// Rows that stay live.
    pub index: HashMap<String, CacheEntry>,
    /// Paths scheduled for or subjected to removal.
    pub to_purge: HashSet<String>,
    /// Writes to flush: soft-deletes for missing files and upserts that
    /// restore scheduled bootstrap rows.
    pub mutations: Vec<Mutation>,
    /// Per-outcome counts.
    pub report: LoadReport,
}

/// Classify every row and carry out hard purges.
///
/// # Arguments
/// * `records` - All persisted rows
/// * `today` - Current date
/// * `files` - Filesystem used for existence checks and deletions
///
/// Missing files during a hard purge are skipped; other filesystem errors
/// are logged and do not stop reconciliation.
pub fn reconcile(
    records: Vec<StoredRecord>,
    today: NaiveDate,
    files: &dyn ContentFiles,
) -> Reconciliation {
    let mut result: Reconciliation = Reconciliation::default();

    for record in records {
        let staged_exists: bool =
            record.purge_at.is_none() && files.staged_exists(record.entry.path());

        match classify(&record, today, staged_exists) {
            Disposition::Keep => {
                result.report.kept += 1;
                if record.purge_at.is_some() {
                    // kept rows must not be swept from the store
                    result.report.restored += 1;
                    result.mutations.push(Mutation::Upsert(record.entry.clone()));
                }
                result
                    .index
                    .insert(record.entry.path().to_string(), record.entry);
            }
            Disposition::ScheduleSoftDelete => {
                log::info!("{} missing. Marked for removal.", record.entry.path());
                result.report.scheduled += 1;
                result.to_purge.insert(record.entry.path().to_string());
                result
                    .mutations
                    .push(Mutation::soft_delete(record.entry.path()));
            }
            Disposition::HardPurge => {
                result.report.purged += 1;
                result.to_purge.insert(record.entry.path().to_string());
                purge_content(&record.entry, files);
            }
            Disposition::Drop => {
                result.report.dropped += 1;
            }
        }
    }

    result
}

/// Delete the encoded artifact and staged copy of an entry.
fn purge_content(entry: &CacheEntry, files: &dyn ContentFiles) {
    if let Err(e) = files.remove_output(entry.encoded_key()) {
        log::warn!("Failed to purge output for {}: {}", entry.path(), e);
    }
    if let Err(e) = files.remove_staged(entry.path()) {
        log::warn!("Failed to purge staged copy of {}: {}", entry.path(), e);
    }
}
