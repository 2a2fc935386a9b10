//! Compression module for the origin
//!
//! This module provides serve-time compression support with:
//! - A closed registry of algorithms (identity, gzip, brotli, deflate)
//! - Accept-Encoding negotiation
//! - Buffered, in-place and streaming codec forms
//!
//! # Module Organization
//!
//! - [`algorithms`] - Algorithm registry and preference ranking
//! - [`compress`] - Codec functions
//! - [`config`] - Configuration structures
//! - [`error`] - Error types
//! - [`negotiation`] - Accept-Encoding parsing and per-entry re-encoding

pub mod algorithms;
pub mod compress;
pub mod config;
pub mod error;
pub mod negotiation;

// Re-export public types
pub use algorithms::{most_preferred, AlgorithmConfig, CompressionAlgorithm, PreferenceMode};
pub use compress::{
    compress, compress_in_place, decoder_reader, decompress, encoder_writer, DecoderReader,
    EncoderWriter,
};
pub use config::CompressionConfig;
pub use error::CompressionError;
pub use negotiation::{negotiate_entry, parse_accept_encoding, select_algorithm};
