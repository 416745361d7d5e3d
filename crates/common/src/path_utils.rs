//! Logical path validation and resolution under content roots.

use std::path::{Component, Path, PathBuf};

use crate::constants::MAX_PATH_LEN;
use crate::error::PathError;

/// Check that a logical path can be indexed and stored.
///
/// # Arguments
/// * `path` - Logical content path (case-sensitive, POSIX-style)
///
/// # Errors
/// Returns error if the path is empty or longer than `MAX_PATH_LEN` bytes.
pub fn validate_logical_path(path: &str) -> Result<(), PathError> {
    if path.is_empty() {
        return Err(PathError::Empty);
    }
    if path.len() > MAX_PATH_LEN {
        return Err(PathError::TooLong {
            path: path.to_string(),
            len: path.len(),
            max: MAX_PATH_LEN,
        });
    }
    Ok(())
}

/// Lexical path normalization without filesystem access.
///
/// Removes `.` components and resolves `..` components lexically.
/// Does not access the filesystem or resolve symlinks.
///
/// # Arguments
/// * `path` - Path to normalize
///
/// # Returns
/// Normalized path with `.` and `..` resolved lexically.
pub fn lexical_normalize(path: &Path) -> PathBuf {
    let mut components: Vec<Component> = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !components.is_empty()
                    && !matches!(
                        components.last(),
                        Some(Component::ParentDir) | Some(Component::RootDir)
                    )
                {
                    components.pop();
                } else {
                    components.push(component);
                }
            }
            _ => components.push(component),
        }
    }

    components.iter().collect()
}

/// Convert a POSIX-style logical path to a host path under `root`.
///
/// # Arguments
/// * `logical_path` - Forward-slash separated path
/// * `root` - Directory to resolve against
///
/// # Returns
/// PathBuf with OS-native separators. Empty components are skipped.
pub fn from_posix_path(logical_path: &str, root: &Path) -> PathBuf {
    let mut result: PathBuf = root.to_path_buf();
    for component in logical_path.split('/') {
        if !component.is_empty() {
            result.push(component);
        }
    }
    result
}

/// Check if a path is within a root directory.
///
/// Uses lexical comparison, does not access filesystem.
pub fn is_within_root(path: &Path, root: &Path) -> bool {
    let norm_path: PathBuf = lexical_normalize(path);
    let norm_root: PathBuf = lexical_normalize(root);
    norm_path.starts_with(&norm_root)
}

/// Resolve a logical path under `root`, refusing anything that escapes it.
///
/// # Arguments
/// * `logical_path` - Forward-slash separated path
/// * `root` - Directory the result must stay within
///
/// # Errors
/// Returns `PathError::PathOutsideRoot` if `..` components climb above `root`.
pub fn resolve_under_root(logical_path: &str, root: &Path) -> Result<PathBuf, PathError> {
    let candidate: PathBuf = from_posix_path(logical_path, root);
    if candidate.as_path() == root || !is_within_root(&candidate, root) {
        return Err(PathError::PathOutsideRoot {
            path: logical_path.to_string(),
            root: root.display().to_string(),
        });
    }
    Ok(lexical_normalize(&candidate))
}
