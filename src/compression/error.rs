/// Compression error types
use std::fmt;

use super::algorithms::CompressionAlgorithm;

/// Errors raised by the codecs and by compression configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompressionError {
    /// Name that is not in the algorithm registry
    UnknownAlgorithm(String),
    /// Encoder failed while writing
    Encode {
        algorithm: CompressionAlgorithm,
        reason: String,
    },
    /// Input is not a valid stream for the algorithm
    Decode {
        algorithm: CompressionAlgorithm,
        reason: String,
    },
    /// Decoded output would exceed the caller's limit
    DecodedTooLarge { limit: usize },
    InvalidConfig(String),
}

impl fmt::Display for CompressionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompressionError::UnknownAlgorithm(name) => {
                write!(f, "Unknown compression algorithm: {}", name)
            }
            CompressionError::Encode { algorithm, reason } => {
                write!(f, "{} encoding failed: {}", algorithm, reason)
            }
            CompressionError::Decode { algorithm, reason } => {
                write!(f, "{} decoding failed: {}", algorithm, reason)
            }
            CompressionError::DecodedTooLarge { limit } => {
                write!(f, "Decoded payload exceeds {} bytes", limit)
            }
            CompressionError::InvalidConfig(msg) => {
                write!(f, "Invalid compression configuration: {}", msg)
            }
        }
    }
}

impl std::error::Error for CompressionError {}
