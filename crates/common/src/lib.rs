//! Shared types and utilities for the casc-host root index.
//!
//! This crate provides functionality used by the filesystem and cache crates:
//! - `ContentKey` - 16-byte content and encoded keys with a hex text form
//! - `CdnLayout` - Derivation of output paths from encoded keys
//! - Logical path validation and root-confined resolution
//! - Shared constants and error types

pub mod constants;
pub mod content_key;
pub mod error;
pub mod layout;
pub mod path_utils;

pub use constants::*;
pub use content_key::ContentKey;
pub use error::{KeyError, PathError};
pub use layout::CdnLayout;
pub use path_utils::{
    from_posix_path, is_within_root, lexical_normalize, resolve_under_root,
    validate_logical_path,
};
