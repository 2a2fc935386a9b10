//! Cache configuration types
//!
//! This module defines configuration structures for the cache tier:
//! - Backend selection (memory, redis, none)
//! - Memory cache limits (size budget, sliding expiry)
//! - Redis backend settings (see [`super::redis::RedisConfig`])

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_ENTRY_TTL_SECONDS, DEFAULT_MAX_AGE_SECONDS, DEFAULT_MAX_CACHE_SIZE_BYTES,
};

use super::redis::RedisConfig;

/// Which store backs the cache manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    /// In-process bounded memory cache
    #[default]
    Memory,
    /// Shared Redis instance
    Redis,
    /// Caching disabled
    None,
}

impl std::fmt::Display for CacheBackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CacheBackendKind::Memory => "memory",
            CacheBackendKind::Redis => "redis",
            CacheBackendKind::None => "none",
        };
        f.write_str(name)
    }
}

/// Main cache configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub backend: CacheBackendKind,
    /// TTL hint handed to backends that expire records themselves
    #[serde(default = "default_entry_ttl_seconds")]
    pub entry_ttl_seconds: u64,
    /// Export hit/miss counters to the Prometheus registry
    #[serde(default)]
    pub metrics_enabled: bool,
    #[serde(default)]
    pub memory: MemoryCacheConfig,
    #[serde(default)]
    pub redis: RedisConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackendKind::default(),
            entry_ttl_seconds: default_entry_ttl_seconds(),
            metrics_enabled: false,
            memory: MemoryCacheConfig::default(),
            redis: RedisConfig::default(),
        }
    }
}

fn default_entry_ttl_seconds() -> u64 {
    DEFAULT_ENTRY_TTL_SECONDS
}

impl CacheConfig {
    /// Validate cache configuration
    pub fn validate(&self) -> Result<(), String> {
        self.memory.validate()?;
        if self.backend == CacheBackendKind::Redis {
            self.redis.validate()?;
        }
        Ok(())
    }

    /// TTL hint as a duration (None when zero)
    pub fn entry_ttl(&self) -> Option<std::time::Duration> {
        (self.entry_ttl_seconds > 0).then(|| std::time::Duration::from_secs(self.entry_ttl_seconds))
    }
}

/// Memory cache configuration
///
/// Both limits are read on every maintenance decision, so a swapped-in
/// value takes effect without restarting the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryCacheConfig {
    /// Budget for the sum of stored record sizes
    #[serde(default = "default_max_size_bytes")]
    pub max_size_bytes: u64,
    /// Entries not read or written for this long are purged (0 disables)
    #[serde(default = "default_max_age_seconds")]
    pub max_age_seconds: u64,
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: default_max_size_bytes(),
            max_age_seconds: default_max_age_seconds(),
        }
    }
}

fn default_max_size_bytes() -> u64 {
    DEFAULT_MAX_CACHE_SIZE_BYTES
}

fn default_max_age_seconds() -> u64 {
    DEFAULT_MAX_AGE_SECONDS
}

impl MemoryCacheConfig {
    /// Sliding expiry as a duration (None when purging is disabled)
    pub fn max_age(&self) -> Option<std::time::Duration> {
        (self.max_age_seconds > 0).then(|| std::time::Duration::from_secs(self.max_age_seconds))
    }

    /// Validate memory cache configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_size_bytes == 0 {
            return Err("memory.max_size_bytes must be greater than 0".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.backend, CacheBackendKind::Memory);
        assert_eq!(config.entry_ttl_seconds, 3600);
        assert!(!config.metrics_enabled);
        assert_eq!(config.memory.max_size_bytes, 256 * 1024 * 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_can_deserialize_minimal_cache_config_from_yaml() {
        let config: CacheConfig = serde_yaml::from_str("backend: none").unwrap();
        assert_eq!(config.backend, CacheBackendKind::None);
        assert_eq!(config.memory, MemoryCacheConfig::default());
    }

    #[test]
    fn test_can_parse_memory_section() {
        let yaml = r#"
backend: memory
memory:
  max_size_bytes: 1048576
  max_age_seconds: 0
"#;
        let config: CacheConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.memory.max_size_bytes, 1048576);
        assert_eq!(config.memory.max_age(), None);
    }

    #[test]
    fn test_rejects_zero_memory_budget() {
        let mut config = CacheConfig::default();
        config.memory.max_size_bytes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_redis_backend_requires_url() {
        let config: CacheConfig = serde_yaml::from_str("backend: redis").unwrap();
        assert!(config.validate().is_err());

        let yaml = r#"
backend: redis
redis:
  redis_url: "redis://localhost:6379"
"#;
        let config: CacheConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_unknown_backend() {
        assert!(serde_yaml::from_str::<CacheConfig>("backend: disk").is_err());
    }

    #[test]
    fn test_zero_ttl_means_no_hint() {
        let config = CacheConfig {
            entry_ttl_seconds: 0,
            ..Default::default()
        };
        assert_eq!(config.entry_ttl(), None);
    }
}
