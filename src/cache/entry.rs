//! Cache key and entry types
//!
//! - `CacheKey`: slash-prefixed normalized request path, case-insensitive
//! - `CachedEntry`: one cached response body with its encoding and media type
//!
//! Timestamps are held at 100 ns tick precision (the resolution of the record
//! format) so an entry survives an encode/decode cycle unchanged.

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::compression::CompressionAlgorithm;
use crate::mime::MimeType;

/// Ticks per second (one tick is 100 ns)
pub const TICKS_PER_SECOND: i64 = 10_000_000;

/// Ticks between 0001-01-01T00:00:00Z and the UNIX epoch
pub const UNIX_EPOCH_TICKS: i64 = 621_355_968_000_000_000;

/// Convert a UTC timestamp to 100 ns ticks since 0001-01-01
pub fn to_ticks(timestamp: DateTime<Utc>) -> i64 {
    timestamp
        .timestamp()
        .saturating_mul(TICKS_PER_SECOND)
        .saturating_add(UNIX_EPOCH_TICKS)
        .saturating_add(i64::from(timestamp.timestamp_subsec_nanos() / 100))
}

/// Convert 100 ns ticks since 0001-01-01 back to a UTC timestamp
pub fn from_ticks(ticks: i64) -> Option<DateTime<Utc>> {
    let relative = ticks.checked_sub(UNIX_EPOCH_TICKS)?;
    let secs = relative.div_euclid(TICKS_PER_SECOND);
    let nanos = (relative.rem_euclid(TICKS_PER_SECOND) * 100) as u32;
    DateTime::from_timestamp(secs, nanos)
}

/// Drop precision finer than one tick
pub fn truncate_to_ticks(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    from_ticks(to_ticks(timestamp)).unwrap_or(timestamp)
}

/// Cache key for a served path
///
/// Built from an already normalized path; always starts with `/` and is
/// folded to lowercase so lookups ignore case.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key for a normalized root-relative path
    pub fn from_normalized(path: &str) -> Self {
        let trimmed = path.trim_start_matches('/');
        let mut key = String::with_capacity(trimmed.len() + 1);
        key.push('/');
        key.push_str(&trimmed.to_lowercase());
        CacheKey(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// One cached response body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedEntry {
    /// Body bytes, encoded with `compression`
    pub content: Bytes,
    /// Encoding of `content`
    pub compression: CompressionAlgorithm,
    /// Size of the decoded body; equals `content.len()` for identity
    pub uncompressed_size: usize,
    /// Media type of the decoded body
    pub mime_type: MimeType,
    /// When the entry was filled from the origin
    pub last_modified: DateTime<Utc>,
}

impl CachedEntry {
    /// Create an identity-encoded entry
    pub fn new(content: Bytes, mime_type: MimeType, last_modified: DateTime<Utc>) -> Self {
        let uncompressed_size = content.len();
        Self {
            content,
            compression: CompressionAlgorithm::None,
            uncompressed_size,
            mime_type,
            last_modified: truncate_to_ticks(last_modified),
        }
    }

    /// Create an entry whose content is already encoded with `compression`
    pub fn with_compression(
        content: Bytes,
        compression: CompressionAlgorithm,
        uncompressed_size: usize,
        mime_type: MimeType,
        last_modified: DateTime<Utc>,
    ) -> Self {
        let uncompressed_size = if compression.is_none() {
            content.len()
        } else {
            uncompressed_size
        };
        Self {
            content,
            compression,
            uncompressed_size,
            mime_type,
            last_modified: truncate_to_ticks(last_modified),
        }
    }

    /// Whether this copy is newer than an origin file modified at `origin_modified`
    pub fn is_fresh_against(&self, origin_modified: DateTime<Utc>) -> bool {
        self.last_modified > origin_modified
    }
}
