/// Compression algorithm registry
///
/// The variant set is closed. Each algorithm carries its wire name, sidecar
/// extension, stable record id and two ranking grades. `None` has the lowest
/// grades so it always sorts last in any preference ordering.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::CompressionError;
use crate::constants::{DEFAULT_COMPRESSION_LEVEL, MIN_COMPRESSIBLE_SIZE};

/// Supported compression algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionAlgorithm {
    /// No compression (identity)
    #[serde(rename = "identity")]
    None,
    /// GZIP compression (RFC 1952)
    Gzip,
    /// Brotli compression (RFC 7932)
    #[serde(rename = "br")]
    Brotli,
    /// HTTP "deflate": zlib-wrapped DEFLATE (RFC 1950)
    Deflate,
}

/// How `most_preferred` ranks candidate algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreferenceMode {
    /// Smallest output wins
    #[default]
    Size,
    /// Fastest codec wins
    Speed,
    /// Sum of both grades
    Balanced,
}

impl CompressionAlgorithm {
    /// Every registered algorithm, `None` last
    pub const ALL: [CompressionAlgorithm; 4] = [
        CompressionAlgorithm::Brotli,
        CompressionAlgorithm::Gzip,
        CompressionAlgorithm::Deflate,
        CompressionAlgorithm::None,
    ];

    /// Content-Encoding header value
    pub fn wire_name(&self) -> &'static str {
        match self {
            CompressionAlgorithm::None => "identity",
            CompressionAlgorithm::Gzip => "gzip",
            CompressionAlgorithm::Brotli => "br",
            CompressionAlgorithm::Deflate => "deflate",
        }
    }

    /// Suffix of a pre-compressed sidecar file (empty for `None`)
    pub fn file_extension(&self) -> &'static str {
        match self {
            CompressionAlgorithm::None => "",
            CompressionAlgorithm::Gzip => ".gz",
            CompressionAlgorithm::Brotli => ".br",
            CompressionAlgorithm::Deflate => ".zz",
        }
    }

    /// Stable id stored in cache records
    pub fn id(&self) -> u32 {
        match self {
            CompressionAlgorithm::None => 0,
            CompressionAlgorithm::Gzip => 1,
            CompressionAlgorithm::Brotli => 2,
            CompressionAlgorithm::Deflate => 3,
        }
    }

    /// Look up an algorithm by its stable id
    pub fn from_id(id: u32) -> Option<Self> {
        match id {
            0 => Some(CompressionAlgorithm::None),
            1 => Some(CompressionAlgorithm::Gzip),
            2 => Some(CompressionAlgorithm::Brotli),
            3 => Some(CompressionAlgorithm::Deflate),
            _ => None,
        }
    }

    /// Output-size grade (higher compresses better)
    pub fn size_grade(&self) -> u8 {
        match self {
            CompressionAlgorithm::None => 0,
            CompressionAlgorithm::Gzip => 1,
            CompressionAlgorithm::Deflate => 2,
            CompressionAlgorithm::Brotli => 3,
        }
    }

    /// Throughput grade (higher is faster)
    pub fn speed_grade(&self) -> u8 {
        match self {
            CompressionAlgorithm::None => 0,
            CompressionAlgorithm::Brotli => 1,
            CompressionAlgorithm::Gzip => 2,
            CompressionAlgorithm::Deflate => 3,
        }
    }

    /// Grade used for ranking under `mode`
    pub fn grade(&self, mode: PreferenceMode) -> u8 {
        match mode {
            PreferenceMode::Size => self.size_grade(),
            PreferenceMode::Speed => self.speed_grade(),
            PreferenceMode::Balanced => self.size_grade() + self.speed_grade(),
        }
    }

    /// Inputs below this size are left uncompressed
    pub fn minimum_size(&self) -> usize {
        match self {
            CompressionAlgorithm::None => usize::MAX,
            _ => MIN_COMPRESSIBLE_SIZE,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, CompressionAlgorithm::None)
    }

    /// Lenient lookup used for negotiation: unknown names map to `None`
    pub fn from_name(name: &str) -> Self {
        Self::parse_algorithm(name).unwrap_or(CompressionAlgorithm::None)
    }

    /// Parse compression algorithm from string (case-insensitive)
    pub fn parse_algorithm(s: &str) -> Result<Self, CompressionError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "identity" | "none" => Ok(CompressionAlgorithm::None),
            "gzip" | "x-gzip" => Ok(CompressionAlgorithm::Gzip),
            "br" | "brotli" => Ok(CompressionAlgorithm::Brotli),
            "deflate" => Ok(CompressionAlgorithm::Deflate),
            _ => Err(CompressionError::UnknownAlgorithm(s.trim().to_string())),
        }
    }
}

impl FromStr for CompressionAlgorithm {
    type Err = CompressionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_algorithm(s)
    }
}

impl fmt::Display for CompressionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.wire_name())
    }
}

/// Pick the best algorithm among `candidates` under `mode`.
///
/// Unknown names count as `None`; an empty list yields `None`. Grades are
/// distinct per algorithm, so the result does not depend on input order.
pub fn most_preferred<I, S>(mode: PreferenceMode, candidates: I) -> CompressionAlgorithm
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    candidates
        .into_iter()
        .map(|name| CompressionAlgorithm::from_name(name.as_ref()))
        .max_by_key(|algo| algo.grade(mode))
        .unwrap_or(CompressionAlgorithm::None)
}

/// Default enabled state for algorithms
fn default_enabled() -> bool {
    true
}

/// Default compression level
fn default_level() -> u32 {
    DEFAULT_COMPRESSION_LEVEL
}

/// Configuration for a specific compression algorithm
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlgorithmConfig {
    /// Whether this algorithm is enabled (default: true)
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Compression level (1-9 for gzip/deflate, 1-11 for brotli; default: 6)
    #[serde(default = "default_level")]
    pub level: u32,
}

impl AlgorithmConfig {
    /// Create a new algorithm configuration
    pub fn new(enabled: bool, level: u32) -> Result<Self, CompressionError> {
        if !(1..=11).contains(&level) {
            return Err(CompressionError::InvalidConfig(format!(
                "compression level must be 1-11, got {}",
                level
            )));
        }
        Ok(AlgorithmConfig { enabled, level })
    }

    /// Default configuration for gzip (enabled, level 6)
    pub fn gzip_default() -> Self {
        AlgorithmConfig {
            enabled: true,
            level: 6,
        }
    }

    /// Default configuration for brotli (enabled, level 4)
    pub fn brotli_default() -> Self {
        AlgorithmConfig {
            enabled: true,
            level: 4,
        }
    }

    /// Default configuration for deflate (enabled, level 6)
    pub fn deflate_default() -> Self {
        AlgorithmConfig {
            enabled: true,
            level: 6,
        }
    }
}
