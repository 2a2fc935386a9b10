// Error types module
//
// Subsystem errors that are not owned by a submodule. Cache and compression
// keep their own enums next to the code that raises them.

use std::path::PathBuf;

/// Failure reported by the request resolver to its caller
///
/// Everything below the resolver is absorbed as "miss" or "not found", so
/// only these two outcomes escape.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// The caller's cancellation signal was set
    #[error("request cancelled")]
    Cancelled,

    /// Unexpected failure; carries the sanitized request path only
    #[error("internal error while resolving {path}")]
    Internal { path: String },
}

/// Filesystem collaborator failure
#[derive(Debug, thiserror::Error)]
pub enum OriginError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("not a regular file: {0}")]
    NotAFile(PathBuf),
}

impl OriginError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        OriginError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Configuration loading and validation failure
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Environment variable '{0}' is referenced but not set")]
    MissingEnvVar(String),

    #[error("Invalid YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
