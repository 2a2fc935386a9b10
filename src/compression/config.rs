/// Compression configuration structures
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::algorithms::{AlgorithmConfig, CompressionAlgorithm, PreferenceMode};
use super::error::CompressionError;
use crate::constants::DEFAULT_COMPRESSION_LEVEL;

/// Serve-time compression configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionConfig {
    /// Enable serve-time compression
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// How competing accepted algorithms are ranked
    #[serde(default)]
    pub preference: PreferenceMode,

    /// Level used for algorithms without their own entry (1-11)
    #[serde(default = "default_compression_level")]
    pub compression_level: u32,

    /// Upper bound when decompressing a record of unknown size (default: 100MB)
    #[serde(default = "default_max_decompressed_size")]
    pub max_decompressed_size_bytes: usize,

    /// Per-algorithm configuration, keyed by wire name
    #[serde(default = "default_algorithms")]
    pub algorithms: HashMap<String, AlgorithmConfig>,
}

fn default_enabled() -> bool {
    true
}

fn default_compression_level() -> u32 {
    DEFAULT_COMPRESSION_LEVEL
}

fn default_max_decompressed_size() -> usize {
    104857600 // 100MB
}

fn default_algorithms() -> HashMap<String, AlgorithmConfig> {
    let mut map = HashMap::new();
    map.insert("gzip".to_string(), AlgorithmConfig::gzip_default());
    map.insert("br".to_string(), AlgorithmConfig::brotli_default());
    map.insert("deflate".to_string(), AlgorithmConfig::deflate_default());
    map
}

impl CompressionConfig {
    /// Create a new compression configuration with defaults
    pub fn new() -> Self {
        CompressionConfig {
            enabled: default_enabled(),
            preference: PreferenceMode::default(),
            compression_level: default_compression_level(),
            max_decompressed_size_bytes: default_max_decompressed_size(),
            algorithms: default_algorithms(),
        }
    }

    /// Validate the compression configuration
    pub fn validate(&self) -> Result<(), CompressionError> {
        if !(1..=11).contains(&self.compression_level) {
            return Err(CompressionError::InvalidConfig(format!(
                "compression_level must be 1-11, got {}",
                self.compression_level
            )));
        }

        if self.max_decompressed_size_bytes == 0 {
            return Err(CompressionError::InvalidConfig(
                "max_decompressed_size_bytes must be greater than 0".to_string(),
            ));
        }

        for (name, cfg) in &self.algorithms {
            let algo = CompressionAlgorithm::parse_algorithm(name)?;
            if algo.is_none() {
                return Err(CompressionError::InvalidConfig(format!(
                    "'{}' is not a compression algorithm",
                    name
                )));
            }
            if !(1..=11).contains(&cfg.level) {
                return Err(CompressionError::InvalidConfig(format!(
                    "algorithm {} level must be 1-11, got {}",
                    name, cfg.level
                )));
            }
        }

        Ok(())
    }

    /// Get configuration for a specific algorithm
    pub fn get_algorithm(&self, algo: CompressionAlgorithm) -> Option<&AlgorithmConfig> {
        self.algorithms.get(algo.wire_name())
    }

    /// Check if an algorithm is enabled
    pub fn is_algorithm_enabled(&self, algo: CompressionAlgorithm) -> bool {
        !algo.is_none()
            && self
                .get_algorithm(algo)
                .map(|cfg| cfg.enabled)
                .unwrap_or(false)
    }

    /// Level to compress with for `algo`
    pub fn level_for(&self, algo: CompressionAlgorithm) -> u32 {
        self.get_algorithm(algo)
            .map(|cfg| cfg.level)
            .unwrap_or(self.compression_level)
    }
}

impl Default for CompressionConfig {
    fn default() -> Self {
        CompressionConfig::new()
    }
}
