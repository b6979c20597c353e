//! Historian storage boundary.
//!
//! This crate provides:
//! - The storage client traits (`StorageClient` → `Connection` → `Cursor`)
//! - Typed statements with SQL rendering and idempotent upsert semantics
//! - An in-memory backend with connection-failure injection
//! - A DuckDB backend (feature `duckdb`)
//!
//! Tables: `topic(id, name)`, `meta(topic_id, meta_data)` and one table per
//! category with `(topic_id, ts, result)`, all sharing an optional prefix.

pub mod client;
#[cfg(feature = "duckdb")]
pub mod duck;
pub mod error;
pub mod layout;
pub mod memory;
pub mod row;
pub mod statement;

pub use client::{Connection, Cursor, ScopedCursor, StorageClient};
#[cfg(feature = "duckdb")]
pub use duck::DuckDbClient;
pub use error::{StoreError, StoreResult};
pub use layout::TableLayout;
pub use memory::{MemoryStats, MemoryStore};
pub use row::{Datum, Row};
pub use statement::{Param, RangeScan, Sql, Statement, TimeRange};
