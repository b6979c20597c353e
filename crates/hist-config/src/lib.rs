//! Historian configuration loading and validation.
//!
//! This crate provides:
//! - Typed config sections (storage, tables, query, ingest)
//! - Config resolution (CLI → env → XDG → defaults)
//! - Semantic validation
//! - Config snapshots with a content fingerprint

pub mod config;
pub mod error;
pub mod resolve;
pub mod snapshot;
pub mod validate;

pub use config::{
    Backend, HistorianConfig, IngestConfig, QueryConfig, StorageConfig, TableConfig,
    TopicReplacement, DEFAULT_QUERY_COUNT,
};
pub use error::ConfigError;
pub use resolve::{load_file, resolve_config, ConfigPaths, ConfigSource, ResolvedConfig, CONFIG_ENV};
pub use snapshot::{fingerprint, ConfigSnapshot};
pub use validate::{validate, ValidationResult};
