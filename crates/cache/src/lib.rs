//! Root entry cache for a CASC content host.
//!
//! The cache keeps every logical path of the hosted build in memory and
//! mirrors it to a relational store:
//!
//! - **Loading** - Persisted rows are reconciled against the staged content.
//!   Missing files are soft-deleted with a grace period; rows whose grace
//!   period elapsed have their content purged.
//! - **Writing** - Mutations are queued and written in fixed-size
//!   transactional batches on `save`.
//!
//! # Backends
//!
//! - `SqliteRootStore` - File-backed SQLite store
//! - `MemoryRootStore` - In-process store with failure injection for tests

pub mod batcher;
pub mod build_info;
mod cache;
mod entry;
mod error;
mod mutation;
pub mod reconcile;
pub mod root_store;
mod settings;

pub use batcher::{FlushReport, WriteBatcher};
pub use build_info::{read_active_version, BuildInfo, DEFAULT_BUILD_VERSION};
pub use cache::{Change, RootCache};
pub use entry::{
    CacheEntry, StoredRecord, BOOTSTRAP_PATHS, ENCODING_MANIFEST_PATH, ROOT_MANIFEST_PATH,
};
pub use error::{CacheError, StoreError};
pub use mutation::Mutation;
pub use reconcile::{LoadReport, Reconciliation};
pub use root_store::{MemoryRootStore, RootStoreBackend, SqliteRootStore};
pub use settings::{
    CacheSettings, FailedBatchPolicy, SqliteStoreOptions, DEFAULT_BATCH_SIZE,
    DEFAULT_PURGE_GRACE_DAYS,
};
