//! Content file access for reconciliation and purging.
//!
//! Two roots are involved:
//! - the data root holds staged copies addressed by logical path
//! - the output root holds encoded artifacts addressed by encoded key

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use casc_host_common::{resolve_under_root, CdnLayout, ContentKey, DATA_DIR_NAME, OUTPUT_DIR_NAME};

use crate::error::FileSystemError;

/// Filesystem capability used by the cache.
///
/// Removal methods return `Ok(false)` when there was nothing to delete.
pub trait ContentFiles: Send + Sync {
    /// Whether a staged copy exists for a logical path.
    fn staged_exists(&self, path: &str) -> bool;

    /// Delete the staged copy of a logical path.
    fn remove_staged(&self, path: &str) -> Result<bool, FileSystemError>;

    /// Delete the encoded artifact for an encoded key.
    fn remove_output(&self, encoded_key: &ContentKey) -> Result<bool, FileSystemError>;
}

/// `ContentFiles` backed by directories on local disk.
#[derive(Debug, Clone)]
pub struct DiskContentFiles {
    data_root: PathBuf,
    output_root: PathBuf,
    layout: CdnLayout,
}

impl DiskContentFiles {
    /// Create with explicit roots.
    ///
    /// # Arguments
    /// * `data_root` - Directory holding staged copies
    /// * `output_root` - Directory holding encoded artifacts
    /// * `layout` - Encoded key to output path mapping
    pub fn new(
        data_root: impl Into<PathBuf>,
        output_root: impl Into<PathBuf>,
        layout: CdnLayout,
    ) -> Self {
        Self {
            data_root: data_root.into(),
            output_root: output_root.into(),
            layout,
        }
    }

    /// Create with the standard `Data` and `Output` directories under a web root.
    pub fn from_web_root(web_root: &Path, layout: CdnLayout) -> Self {
        Self::new(
            web_root.join(DATA_DIR_NAME),
            web_root.join(OUTPUT_DIR_NAME),
            layout,
        )
    }

    /// Directory holding staged copies.
    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    /// Directory holding encoded artifacts.
    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Absolute path of a staged copy.
    ///
    /// # Errors
    /// Returns error if the logical path escapes the data root.
    pub fn staged_path(&self, path: &str) -> Result<PathBuf, FileSystemError> {
        Ok(resolve_under_root(path, &self.data_root)?)
    }

    /// Absolute path of an encoded artifact.
    pub fn output_path(&self, encoded_key: &ContentKey) -> PathBuf {
        self.layout.resolve(&self.output_root, encoded_key)
    }
}

impl ContentFiles for DiskContentFiles {
    fn staged_exists(&self, path: &str) -> bool {
        match self.staged_path(path) {
            Ok(full) => full.is_file(),
            Err(e) => {
                log::warn!("Ignoring staged path {}: {}", path, e);
                false
            }
        }
    }

    fn remove_staged(&self, path: &str) -> Result<bool, FileSystemError> {
        let full: PathBuf = self.staged_path(path)?;
        remove_if_present(&full)
    }

    fn remove_output(&self, encoded_key: &ContentKey) -> Result<bool, FileSystemError> {
        remove_if_present(&self.output_path(encoded_key))
    }
}

/// Delete a file, treating "not found" as nothing to do.
fn remove_if_present(path: &Path) -> Result<bool, FileSystemError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(FileSystemError::io(path.display().to_string(), e)),
    }
}
