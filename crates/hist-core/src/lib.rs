//! Historian core.
//!
//! - [`TopicRegistry`]: topic name → deterministic id, mirrored to the topic table
//! - [`MetadataCache`]: per-topic metadata, written only when it changes
//! - [`IngestionPipeline`]: classifies, coerces and idempotently stores batches
//! - [`QueryEngine`]: turns a topic query into a bounded, ordered range scan
//! - [`Historian`]: owns the connection and both caches, and runs the above
//!
//! Rollups (hourly/daily aggregates) are not computed here; an aggregation
//! service can read the category tables directly.

pub mod exit_codes;
pub mod historian;
pub mod ingest;
pub mod logging;
pub mod metadata;
pub mod query;
pub mod registry;

pub use exit_codes::ExitCode;
pub use historian::{Historian, SetupSummary};
pub use ingest::{coerce_value, Acknowledge, BatchReport, IngestionPipeline, PointError, PointRejection};
pub use metadata::MetadataCache;
pub use query::{time_range, QueryEngine, QueryPlan};
pub use registry::{LoadSummary, Resolution, Resolved, TopicRegistry};
