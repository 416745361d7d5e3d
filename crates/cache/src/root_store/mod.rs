//! Backing stores for the root index.
//!
//! The cache owns the `root_entries` schema and talks to it only through
//! `RootStoreBackend`. Two implementations are provided:
//! - `SqliteRootStore` - durable store in a local SQLite database
//! - `MemoryRootStore` - in-process store with failure injection

mod backend;
mod memory;
mod sqlite;

pub use backend::RootStoreBackend;
pub use memory::MemoryRootStore;
pub use sqlite::SqliteRootStore;
