//! Shared error types used across casc-host crates.

use thiserror::Error;

/// Logical path validation errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    /// Path is empty.
    #[error("Path is empty")]
    Empty,

    /// Path exceeds the storable length.
    #[error("Path is {len} bytes, limit is {max}: {path}")]
    TooLong {
        /// The offending path.
        path: String,
        /// Its length in bytes.
        len: usize,
        /// Maximum allowed length in bytes.
        max: usize,
    },

    /// Path resolves outside the expected root directory.
    #[error("Path is outside root: {path} not in {root}")]
    PathOutsideRoot {
        /// The path that was checked.
        path: String,
        /// The root directory it should be within.
        root: String,
    },
}

/// Content key parsing errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// Input decoded to the wrong number of bytes.
    #[error("Content key must be {expected} bytes, got {actual}")]
    InvalidLength {
        /// Expected byte length.
        expected: usize,
        /// Actual byte length.
        actual: usize,
    },

    /// Input is not valid hexadecimal.
    #[error("Content key is not valid hex: {0}")]
    InvalidHex(String),
}
