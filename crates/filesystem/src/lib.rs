//! File system access for the casc-host root index.
//!
//! This crate implements the filesystem side of reconciliation:
//! - `ContentFiles` - Existence checks and deletions the cache relies on
//! - `DiskContentFiles` - Implementation over a data root and an output root

pub mod content_files;
pub mod error;

pub use content_files::{ContentFiles, DiskContentFiles};
pub use error::FileSystemError;
