//! Safety checks applied while extracting a confirmed archive.
//!
//! Entry names come from an archive we could not even open a minute ago, so
//! they are validated before anything touches the output directory.

use crate::error::{ExtractionError, SecurityError};
use std::path::{Component, Path, PathBuf};

/// Validates and normalizes an archive entry path to prevent zip-slip.
///
/// Absolute paths and paths containing `..` are rejected; `.` components and
/// redundant separators are dropped.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use recovery::safety::validate_entry_path;
///
/// let safe_path = validate_entry_path(Path::new("dir/./file.txt")).unwrap();
/// assert_eq!(safe_path, Path::new("dir/file.txt"));
///
/// assert!(validate_entry_path(Path::new("../../etc/passwd")).is_err());
/// assert!(validate_entry_path(Path::new("/etc/passwd")).is_err());
/// ```
pub fn validate_entry_path(path: &Path) -> Result<PathBuf, SecurityError> {
    if path.is_absolute() {
        return Err(SecurityError::AbsolutePath(path.display().to_string()));
    }

    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => continue,
            Component::ParentDir => {
                return Err(SecurityError::PathTraversal(format!(
                    "Path contains '..' component: {}",
                    path.display()
                )));
            }
            // Windows prefixes ("C:") and stray roots are absolute in disguise
            Component::RootDir | Component::Prefix(_) => {
                return Err(SecurityError::AbsolutePath(path.display().to_string()));
            }
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(SecurityError::PathTraversal(
            "Path normalizes to empty".to_string(),
        ));
    }

    Ok(normalized)
}

/// Checks if the current extracted size exceeds the configured limit.
///
/// # Examples
///
/// ```
/// use recovery::safety::check_size_limits;
///
/// assert!(check_size_limits(1000, Some(2000)).is_ok());
/// assert!(check_size_limits(3000, Some(2000)).is_err());
/// assert!(check_size_limits(999_999_999, None).is_ok());
/// ```
pub fn check_size_limits(current_bytes: u64, limit: Option<u64>) -> Result<(), ExtractionError> {
    if let Some(max_bytes) = limit {
        if current_bytes > max_bytes {
            return Err(ExtractionError::SizeLimitExceeded {
                current: current_bytes,
                limit: max_bytes,
            });
        }
    }
    Ok(())
}
