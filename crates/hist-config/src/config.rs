//! Historian configuration types.
//!
//! Every section is optional in the file; missing fields take the defaults
//! below. Files may be TOML or JSON.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default row limit for queries that do not specify one.
pub const DEFAULT_QUERY_COUNT: u64 = 20;

/// Complete historian configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HistorianConfig {
    pub storage: StorageConfig,
    pub tables: TableConfig,
    pub query: QueryConfig,
    pub ingest: IngestConfig,
}

/// Which storage backend to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Non-durable, process-local tables.
    #[default]
    Memory,
    /// Embedded DuckDB (requires the `duckdb` feature).
    Duckdb,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Memory => write!(f, "memory"),
            Backend::Duckdb => write!(f, "duckdb"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub backend: Backend,

    /// Database file. DuckDB runs in-memory when absent.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TableConfig {
    /// Prefix shared by every table name, e.g. `hist_` gives `hist_topic`.
    pub prefix: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueryConfig {
    /// Row limit applied when a query gives no count (or zero).
    pub default_count: u64,

    /// Upper clamp on any requested count.
    pub max_count: Option<u64>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_count: DEFAULT_QUERY_COUNT,
            max_count: None,
        }
    }
}

impl QueryConfig {
    /// Effective limit for a requested count.
    pub fn limit_for(&self, requested: Option<u64>) -> u64 {
        let count = match requested {
            Some(n) if n > 0 => n,
            _ => self.default_count,
        };
        match self.max_count {
            Some(max) => count.min(max),
            None => count,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IngestConfig {
    /// Substring rewrites applied, in order, to every ingested topic name.
    pub topic_replace_list: Vec<TopicReplacement>,
}

/// One topic rewrite rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TopicReplacement {
    pub from: String,
    pub to: String,
}

impl IngestConfig {
    /// Apply every replacement rule to a topic name.
    pub fn rewrite_topic(&self, topic: &str) -> String {
        self.topic_replace_list
            .iter()
            .fold(topic.to_string(), |acc, rule| acc.replace(&rule.from, &rule.to))
    }
}
