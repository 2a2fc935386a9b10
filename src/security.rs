//! Security Validation Module
//!
//! Request paths are checked here before they reach the filesystem:
//! - Oversized paths are refused outright
//! - Null bytes and backslashes are refused (path truncation / Windows separators)
//! - Dot-segments (`.git`, `.env`, ...) are refused unless explicitly allowed
//!
//! Every violation surfaces to callers as "not found"; the distinct error
//! variants exist for logging only.

use crate::constants::MAX_LOGGED_PATH_LEN;
use crate::path;

/// Security validation error types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityError {
    /// Path contains bytes that are never valid in a request path
    InvalidCharacters { path: String },
    /// Path names a hidden (dot) file or directory
    DotPath { path: String },
    /// Path too long
    PathTooLong { length: usize, limit: usize },
}

impl std::fmt::Display for SecurityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecurityError::InvalidCharacters { path } => {
                write!(f, "Path contains forbidden characters: {}", path)
            }
            SecurityError::DotPath { path } => {
                write!(f, "Dot path access denied: {}", path)
            }
            SecurityError::PathTooLong { length, limit } => {
                write!(f, "Path length {} exceeds limit {}", length, limit)
            }
        }
    }
}

impl std::error::Error for SecurityError {}

/// Validate path length
pub fn validate_path_length(path: &str, limit: usize) -> Result<(), SecurityError> {
    let length = path.len();
    if length > limit {
        return Err(SecurityError::PathTooLong { length, limit });
    }
    Ok(())
}

/// Refuse null bytes (path truncation attack) and backslashes
pub fn check_path_characters(path: &str) -> Result<(), SecurityError> {
    if path.contains('\0') || path.contains('\\') {
        return Err(SecurityError::InvalidCharacters {
            path: sanitize_for_log(path),
        });
    }
    Ok(())
}

/// True when any segment of a normalized path starts with `.`
pub fn is_dot_path(normalized: &str) -> bool {
    path::segments(normalized).any(|segment| segment.starts_with('.'))
}

/// Refuse dot paths unless `allow_dot_paths` is set
///
/// `is_dot` decides what counts as a dot path; it is not consulted when
/// dot paths are allowed.
pub fn check_dot_path<F>(
    normalized: &str,
    allow_dot_paths: bool,
    is_dot: F,
) -> Result<(), SecurityError>
where
    F: FnOnce(&str) -> bool,
{
    if !allow_dot_paths && is_dot(normalized) {
        return Err(SecurityError::DotPath {
            path: sanitize_for_log(normalized),
        });
    }
    Ok(())
}

/// Make a request path safe to log: control characters are replaced and
/// the result is truncated on a char boundary.
pub fn sanitize_for_log(path: &str) -> String {
    let mut sanitized: String = path
        .chars()
        .take(MAX_LOGGED_PATH_LEN)
        .map(|c| if c.is_control() { '?' } else { c })
        .collect();
    if path.chars().count() > MAX_LOGGED_PATH_LEN {
        sanitized.push_str("...");
    }
    sanitized
}
