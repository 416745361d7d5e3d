//! File system error types.

use casc_host_common::PathError;
use thiserror::Error;

/// Errors from content file access.
#[derive(Debug, Error)]
pub enum FileSystemError {
    /// I/O failure on a specific path.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the error occurred.
        path: String,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A logical path resolved outside its content root.
    #[error(transparent)]
    OutsideRoot(#[from] PathError),
}

impl FileSystemError {
    /// Create an Io error from std::io::Error.
    ///
    /// # Arguments
    /// * `path` - Path where the error occurred
    /// * `source` - The underlying IO error
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
