//! Output layout for encoded content.
//!
//! Encoded artifacts are addressed by their encoded key, fanned out over two
//! directory levels taken from the first four hex characters:
//! `[prefix/]folder/ab/cd/abcd...`.

use std::path::{Path, PathBuf};

use crate::constants::DEFAULT_DATA_FOLDER;
use crate::content_key::ContentKey;
use crate::path_utils::from_posix_path;

/// Maps encoded keys to relative paths under the output root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdnLayout {
    /// Folder holding the fan-out directories (usually `data`).
    pub folder: String,
    /// Optional product prefix used when serving a static CDN tree.
    pub prefix: Option<String>,
}

impl Default for CdnLayout {
    fn default() -> Self {
        Self {
            folder: DEFAULT_DATA_FOLDER.to_string(),
            prefix: None,
        }
    }
}

impl CdnLayout {
    /// Create a layout with the given folder and no prefix.
    ///
    /// # Arguments
    /// * `folder` - Folder holding the fan-out directories
    pub fn new(folder: impl Into<String>) -> Self {
        Self {
            folder: folder.into(),
            prefix: None,
        }
    }

    /// Serve from a static CDN tree rooted at `prefix` (e.g. `tpr/wow`).
    ///
    /// # Arguments
    /// * `prefix` - POSIX-style product prefix
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix: String = prefix.into();
        let trimmed: &str = prefix.trim_matches('/');
        self.prefix = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self
    }

    /// POSIX-style relative path for an encoded key.
    pub fn relative_path(&self, key: &ContentKey) -> String {
        let hex: String = key.to_hex();
        let mut parts: Vec<&str> = Vec::with_capacity(5);
        if let Some(prefix) = &self.prefix {
            parts.push(prefix);
        }
        if !self.folder.is_empty() {
            parts.push(&self.folder);
        }
        parts.push(&hex[0..2]);
        parts.push(&hex[2..4]);
        parts.push(&hex);
        parts.join("/")
    }

    /// Absolute path for an encoded key under `output_root`.
    pub fn resolve(&self, output_root: &Path, key: &ContentKey) -> PathBuf {
        from_posix_path(&self.relative_path(key), output_root)
    }
}
