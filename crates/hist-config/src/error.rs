//! Configuration errors.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse TOML config {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to parse JSON config {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unsupported config extension for {0} (expected .toml or .json)")]
    UnsupportedFormat(PathBuf),

    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    #[error("invalid config: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

impl From<ConfigError> for hist_common::Error {
    fn from(err: ConfigError) -> Self {
        hist_common::Error::Config(err.to_string())
    }
}
