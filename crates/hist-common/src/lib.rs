//! Historian common types, IDs, and errors.
//!
//! This crate provides foundational types shared across the historian crates:
//! - Deterministic topic identity (`TopicKey`, `TopicId`)
//! - Measurement categories and topic-name normalization
//! - Publish records, data points, query requests and results
//! - The unified error type

pub mod category;
pub mod error;
pub mod id;
pub mod point;

pub use category::{split_query_topic, Category};
pub use error::{Error, Result};
pub use id::{ParseTopicIdError, TopicId, TopicKey};
pub use point::{
    parse_timestamp, truncate_to_second, DataPoint, Metadata, Order, PublishRecord, QueryOutcome,
    QueryRequest, QueryResult,
};

/// Schema version stamped on JSON outputs.
pub const SCHEMA_VERSION: &str = "1.0.0";
