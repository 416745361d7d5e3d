//! Cache entry and persisted record types.

use casc_host_common::{validate_logical_path, ContentKey, PathError};
use chrono::NaiveDate;

/// Logical path of the root manifest bootstrap entry.
pub const ROOT_MANIFEST_PATH: &str = "__ROOT__";

/// Logical path of the encoding manifest bootstrap entry.
pub const ENCODING_MANIFEST_PATH: &str = "__ENCODING__";

/// Bootstrap manifest paths, regenerated by every build.
pub const BOOTSTRAP_PATHS: [&str; 2] = [ROOT_MANIFEST_PATH, ENCODING_MANIFEST_PATH];

/// One indexed file, keyed by its logical path.
///
/// Two entries are equal only if all five fields match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheEntry {
    path: String,
    file_data_id: u32,
    name_hash: u64,
    content_key: ContentKey,
    encoded_key: ContentKey,
}

impl CacheEntry {
    /// Create a cache entry.
    ///
    /// # Arguments
    /// * `path` - Logical content path (unique, case-sensitive)
    /// * `file_data_id` - File identifier, `0` for bootstrap manifests
    /// * `name_hash` - Hash of the logical name, opaque to the cache
    /// * `content_key` - Key of the content before encoding
    /// * `encoded_key` - Key of the stored, encoded artifact
    ///
    /// # Errors
    /// Returns error if the path is empty or longer than 1024 bytes.
    pub fn new(
        path: impl Into<String>,
        file_data_id: u32,
        name_hash: u64,
        content_key: ContentKey,
        encoded_key: ContentKey,
    ) -> Result<Self, PathError> {
        let path: String = path.into();
        validate_logical_path(&path)?;
        Ok(Self {
            path,
            file_data_id,
            name_hash,
            content_key,
            encoded_key,
        })
    }

    /// Logical content path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// File identifier; `0` marks a bootstrap manifest.
    pub fn file_data_id(&self) -> u32 {
        self.file_data_id
    }

    /// Hash of the logical name.
    pub fn name_hash(&self) -> u64 {
        self.name_hash
    }

    /// Key of the content before encoding.
    pub fn content_key(&self) -> &ContentKey {
        &self.content_key
    }

    /// Key of the encoded artifact.
    pub fn encoded_key(&self) -> &ContentKey {
        &self.encoded_key
    }

    /// Whether this entry is a root or encoding manifest.
    pub fn is_bootstrap(&self) -> bool {
        self.file_data_id == 0
    }
}

/// A row as persisted in the backing store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    /// The indexed fields.
    pub entry: CacheEntry,
    /// `None` while live; otherwise the date on or after which the row is purged.
    pub purge_at: Option<NaiveDate>,
}

impl StoredRecord {
    /// A live record.
    pub fn live(entry: CacheEntry) -> Self {
        Self {
            entry,
            purge_at: None,
        }
    }

    /// A record scheduled for purge on `purge_at`.
    pub fn scheduled(entry: CacheEntry, purge_at: NaiveDate) -> Self {
        Self {
            entry,
            purge_at: Some(purge_at),
        }
    }
}
