// Configuration module
//
// One YAML file with four sections (origin, cache, compression, logging).
// `${VAR}` references are substituted from the environment before parsing;
// every field has a default so an empty file is a valid configuration.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::cache::CacheConfig;
use crate::compression::CompressionConfig;
use crate::error::ConfigError;

pub mod logging;
pub mod origin;

pub use logging::LoggingConfig;
pub use origin::OriginConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub origin: OriginConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub compression: CompressionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    pub fn from_yaml_with_env(yaml: &str) -> Result<Self, ConfigError> {
        // Replace ${VAR_NAME} with environment variable values
        let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        let mut missing = None;
        let substituted = re.replace_all(yaml, |caps: &regex::Captures| {
            let var_name = &caps[1];
            match std::env::var(var_name) {
                Ok(value) => value,
                Err(_) => {
                    missing.get_or_insert_with(|| var_name.to_string());
                    String::new()
                }
            }
        });
        if let Some(var_name) = missing {
            return Err(ConfigError::MissingEnvVar(var_name));
        }

        // An empty document deserializes as unit, not as an empty mapping.
        if substituted.trim().is_empty() {
            return Ok(Config::default());
        }
        Ok(serde_yaml::from_str(&substituted)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_with_env(&yaml)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.origin.validate().map_err(ConfigError::Invalid)?;
        self.cache
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("cache: {}", e)))?;
        self.compression
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("compression: {}", e)))?;
        Ok(())
    }
}
