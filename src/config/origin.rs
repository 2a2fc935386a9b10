//! Origin configuration types.
//!
//! Where files are served from and how the resolver treats them:
//! - Data root and the buffer/stream threshold
//! - Dot-file policy
//! - Reserved system prefix and directory index file name
//!
//! Default values are sourced from `crate::constants`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::constants::{
    DEFAULT_DATA_ROOT, DEFAULT_INDEX_FILE, DEFAULT_MAX_BUFFERED_FILE_SIZE,
    DEFAULT_MAX_PATH_LENGTH, DEFAULT_SYSTEM_PREFIX,
};

fn default_data_root() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_ROOT)
}

fn default_max_buffered_file_size() -> u64 {
    DEFAULT_MAX_BUFFERED_FILE_SIZE
}

fn default_system_prefix() -> String {
    DEFAULT_SYSTEM_PREFIX.to_string()
}

fn default_index_file() -> String {
    DEFAULT_INDEX_FILE.to_string()
}

fn default_max_path_length() -> usize {
    DEFAULT_MAX_PATH_LENGTH
}

/// Origin section of the configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginConfig {
    /// Directory every request path is resolved against
    #[serde(default = "default_data_root")]
    pub data_root: PathBuf,

    /// Files up to this size are buffered and cached; larger ones are streamed
    #[serde(default = "default_max_buffered_file_size")]
    pub max_buffered_file_size: u64,

    /// Serve paths with a segment starting with `.` (default: false)
    #[serde(default)]
    pub allow_dot_paths: bool,

    /// First path segment reserved for built-in assets (default: "_cdn")
    #[serde(default = "default_system_prefix")]
    pub system_prefix: String,

    /// File served for a directory before a listing is generated
    #[serde(default = "default_index_file")]
    pub index_file: String,

    /// Longer request paths are refused
    #[serde(default = "default_max_path_length")]
    pub max_path_length: usize,
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            data_root: default_data_root(),
            max_buffered_file_size: default_max_buffered_file_size(),
            allow_dot_paths: false,
            system_prefix: default_system_prefix(),
            index_file: default_index_file(),
            max_path_length: default_max_path_length(),
        }
    }
}

impl OriginConfig {
    /// Config serving `data_root` with every other field defaulted
    pub fn with_root(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.data_root.as_os_str().is_empty() {
            return Err("origin.data_root cannot be empty".to_string());
        }
        if self.system_prefix.is_empty() || self.system_prefix.contains('/') {
            return Err(format!(
                "origin.system_prefix '{}' must be a single non-empty path segment",
                self.system_prefix
            ));
        }
        if self.index_file.is_empty() || self.index_file.contains('/') {
            return Err(format!(
                "origin.index_file '{}' must be a plain file name",
                self.index_file
            ));
        }
        if self.max_path_length == 0 {
            return Err("origin.max_path_length must be greater than 0".to_string());
        }
        Ok(())
    }
}
