//! Cache error types
//!
//! This module defines error types for cache backend operations. None of
//! them reach the resolver: the manager turns every backend failure into a
//! miss.

/// Cache error types
#[derive(Debug)]
pub enum CacheError {
    /// I/O error
    IoError(std::io::Error),
    /// Redis connection failed
    RedisConnectionFailed(String),
    /// Redis operation error
    RedisError(String),
    /// Configuration error
    ConfigurationError(String),
    /// Record encoding/decoding error
    SerializationError(String),
}

impl std::fmt::Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheError::IoError(err) => write!(f, "I/O error: {}", err),
            CacheError::RedisConnectionFailed(msg) => write!(f, "Redis connection failed: {}", msg),
            CacheError::RedisError(msg) => write!(f, "Redis error: {}", msg),
            CacheError::ConfigurationError(msg) => write!(f, "Configuration error: {}", msg),
            CacheError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CacheError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::IoError(err)
    }
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        CacheError::RedisError(err.to_string())
    }
}
