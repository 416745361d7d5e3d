//! SQLite backend for the root index.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use casc_host_common::ContentKey;
use chrono::NaiveDate;
use rusqlite::{params, Connection};

use super::backend::RootStoreBackend;
use crate::entry::{CacheEntry, StoredRecord};
use crate::error::{CacheError, StoreError};
use crate::mutation::Mutation;
use crate::settings::SqliteStoreOptions;

const CREATE_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS root_entries (
        id           INTEGER PRIMARY KEY AUTOINCREMENT,
        path         TEXT NOT NULL UNIQUE CHECK (length(CAST(path AS BLOB)) <= 1024),
        file_data_id INTEGER NOT NULL,
        hash         INTEGER NOT NULL,
        content_key  TEXT NOT NULL,
        encoded_key  TEXT NOT NULL,
        purge_at     TEXT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_root_entries_purge_at ON root_entries(purge_at);";

const SELECT_ALL: &str = "
    SELECT path, file_data_id, hash, content_key, encoded_key, purge_at
    FROM root_entries";

const UPSERT_BY_PATH: &str = "
    INSERT INTO root_entries (path, file_data_id, hash, content_key, encoded_key, purge_at)
    VALUES (?1, ?2, ?3, ?4, ?5, NULL)
    ON CONFLICT(path) DO UPDATE SET
        file_data_id = excluded.file_data_id,
        hash = excluded.hash,
        content_key = excluded.content_key,
        encoded_key = excluded.encoded_key,
        purge_at = NULL";

const SOFT_DELETE_BY_PATH: &str = "UPDATE root_entries SET purge_at = ?2 WHERE path = ?1";

const PURGE_EXPIRED: &str = "DELETE FROM root_entries WHERE purge_at IS NOT NULL AND purge_at < ?1";

/// Raw column values of one `root_entries` row.
type RawRow = (String, i64, i64, String, String, Option<String>);

/// SQLite-based root index store.
///
/// Every statement is parameterized; each flushed batch runs in its own
/// transaction.
pub struct SqliteRootStore {
    /// Database connection (protected by mutex for thread safety).
    conn: Mutex<Connection>,
}

impl SqliteRootStore {
    /// Create or open a SQLite root store at the given path.
    ///
    /// # Arguments
    /// * `db_path` - Path to the SQLite database file
    /// * `options` - Journal and locking options
    ///
    /// # Errors
    /// Returns error if the database cannot be opened or configured.
    pub fn open(db_path: &Path, options: &SqliteStoreOptions) -> Result<Self, StoreError> {
        let conn: Connection = Connection::open(db_path)?;
        Self::configure(conn, options)
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    /// Returns error if SQLite cannot allocate the database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn: Connection = Connection::open_in_memory()?;
        Self::configure(conn, &SqliteStoreOptions::default())
    }

    fn configure(conn: Connection, options: &SqliteStoreOptions) -> Result<Self, StoreError> {
        if options.wal {
            let _mode: String =
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        }
        conn.busy_timeout(options.busy_timeout)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Get the number of rows in the store.
    pub fn count(&self) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM root_entries", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::new(None, "SQLite connection mutex poisoned"))
    }
}

#[async_trait]
impl RootStoreBackend for SqliteRootStore {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute_batch(CREATE_SCHEMA)?;
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<StoredRecord>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(SELECT_ALL)?;
        let raw_rows: Vec<RawRow> = stmt
            .query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                ))
            })?
            .collect::<Result<_, _>>()?;

        let mut records: Vec<StoredRecord> = Vec::with_capacity(raw_rows.len());
        for raw in raw_rows {
            let path: String = raw.0.clone();
            match decode_row(raw) {
                Ok(record) => records.push(record),
                Err(e) => log::warn!("Skipping unreadable root entry {}: {}", path, e),
            }
        }
        Ok(records)
    }

    async fn apply_batch(&self, batch: &[Mutation], purge_at: NaiveDate) -> Result<(), StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut upsert = tx.prepare_cached(UPSERT_BY_PATH)?;
            let mut soft_delete = tx.prepare_cached(SOFT_DELETE_BY_PATH)?;

            for mutation in batch {
                match mutation {
                    Mutation::Upsert(entry) => {
                        upsert.execute(params![
                            entry.path(),
                            entry.file_data_id(),
                            entry.name_hash() as i64,
                            entry.content_key().to_hex(),
                            entry.encoded_key().to_hex(),
                        ])?;
                    }
                    Mutation::SoftDelete { path } => {
                        soft_delete.execute(params![path, purge_at])?;
                    }
                }
            }
        }
        // Dropping an uncommitted transaction rolls it back.
        tx.commit()?;
        Ok(())
    }

    async fn purge_expired(&self, today: NaiveDate) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let deleted: usize = conn.execute(PURGE_EXPIRED, params![today])?;
        Ok(deleted)
    }
}

/// Convert raw column values into a record.
///
/// # Errors
/// Returns `CacheError::InvalidEntry` if any column fails to parse.
fn decode_row(raw: RawRow) -> Result<StoredRecord, CacheError> {
    let (path, file_data_id, hash, content_key, encoded_key, purge_at) = raw;

    let file_data_id: u32 = u32::try_from(file_data_id).map_err(|_| {
        CacheError::InvalidEntry(format!("file data id {} out of range", file_data_id))
    })?;
    let content_key: ContentKey = ContentKey::from_hex(&content_key)?;
    let encoded_key: ContentKey = ContentKey::from_hex(&encoded_key)?;
    let purge_at: Option<NaiveDate> = purge_at
        .map(|text| {
            NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").map_err(|e| {
                CacheError::InvalidEntry(format!("bad purge date {:?}: {}", text, e))
            })
        })
        .transpose()?;

    // hash is stored as the bit pattern of the u64 name hash
    let entry: CacheEntry =
        CacheEntry::new(path, file_data_id, hash as u64, content_key, encoded_key)?;

    Ok(StoredRecord { entry, purge_at })
}
