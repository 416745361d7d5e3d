//! Cache error types.

use casc_host_common::{KeyError, PathError};
use thiserror::Error;

/// Error reported by a backing store.
///
/// Carries the store-provided error code when one is available so failed
/// flushes can be diagnosed from the log alone.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}{}", .code.map(|c| format!(" (code {c})")).unwrap_or_default())]
pub struct StoreError {
    /// Store-specific error code (SQLite extended result code).
    pub code: Option<i32>,
    /// Error message from the store.
    pub message: String,
}

impl StoreError {
    /// Create a store error.
    ///
    /// # Arguments
    /// * `code` - Store-specific error code, if any
    /// * `message` - Error detail
    pub fn new(code: Option<i32>, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        let code: Option<i32> = match &err {
            rusqlite::Error::SqliteFailure(inner, _) => Some(inner.extended_code),
            _ => None,
        };
        Self::new(code, err.to_string())
    }
}

/// Errors that can occur during cache operations.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Backing store failure. Fatal when raised while loading.
    #[error("Backing store error: {0}")]
    Store(#[from] StoreError),

    /// I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the error occurred.
        path: String,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Invalid settings.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Invalid cache entry.
    #[error("Invalid cache entry: {0}")]
    InvalidEntry(String),
}

impl From<PathError> for CacheError {
    fn from(err: PathError) -> Self {
        Self::InvalidEntry(err.to_string())
    }
}

impl From<KeyError> for CacheError {
    fn from(err: KeyError) -> Self {
        Self::InvalidEntry(err.to_string())
    }
}
