// Redis key formatting and hashing utilities

use sha2::{Digest, Sha256};

/// Keys longer than this are replaced by a hash
pub const MAX_KEY_LENGTH: usize = 250;

/// Formats a Redis key for a cache key
///
/// # Format
/// - Short keys: "{prefix}:{url-encoded cache key}"
/// - Long keys: "{prefix}:hash:{sha256}"
pub fn format_key(prefix: &str, cache_key: &str) -> String {
    let full_key = format!("{}:{}", prefix, urlencoding::encode(cache_key));

    if full_key.len() > MAX_KEY_LENGTH {
        hash_long_key(prefix, cache_key)
    } else {
        full_key
    }
}

fn hash_long_key(prefix: &str, cache_key: &str) -> String {
    let hash = Sha256::digest(cache_key.as_bytes());
    format!("{}:hash:{}", prefix, hex::encode(hash))
}

/// Validates a cache key before Redis operations
pub fn validate_key(key: &str) -> Result<(), String> {
    if key.is_empty() {
        return Err("Key is empty".to_string());
    }
    if key.contains('\0') {
        return Err("Key contains null bytes".to_string());
    }
    Ok(())
}
