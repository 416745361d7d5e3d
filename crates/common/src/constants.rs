//! Shared constants used across casc-host crates.

/// Length in bytes of a content key or encoded key.
pub const CONTENT_KEY_LEN: usize = 16;

/// Maximum length in bytes of a logical content path.
pub const MAX_PATH_LEN: usize = 1024;

/// Folder under the output root holding encoded archive data.
pub const DEFAULT_DATA_FOLDER: &str = "data";

/// Directory under the web root holding staged copies, addressed by logical path.
pub const DATA_DIR_NAME: &str = "Data";

/// Directory under the web root holding encoded output, addressed by encoded key.
pub const OUTPUT_DIR_NAME: &str = "Output";
