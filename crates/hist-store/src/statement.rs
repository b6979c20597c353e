//! Typed storage statements and their SQL rendering.
//!
//! The historian never builds SQL strings directly. It issues [`Statement`]s,
//! which SQL backends render with [`Statement::render`] and the in-memory
//! backend interprets as-is. Every write is an idempotent upsert:
//!
//! - topics and points are insert-if-absent (`ON CONFLICT DO NOTHING`), so a
//!   duplicate announcement or a redelivered point is a no-op, never an error
//!   and never an overwrite;
//! - metadata is insert-or-replace, since a changed record must win.

use chrono::{DateTime, Utc};
use hist_common::{Category, Order, TopicId};
use serde_json::Value;

use crate::layout::TableLayout;

/// A bound query parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Text(String),
    Int(i64),
    /// Bound as whole epoch seconds.
    Timestamp(DateTime<Utc>),
}

/// Time predicate of a range scan.
///
/// Ranges are half-open: a point at `end` is never returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeRange {
    /// `start <= ts < end`
    Between {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    /// `ts = at`
    At(DateTime<Utc>),
    /// `ts >= start`
    From(DateTime<Utc>),
    /// `ts < end`
    Before(DateTime<Utc>),
}

impl TimeRange {
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        match *self {
            TimeRange::Between { start, end } => start <= ts && ts < end,
            TimeRange::At(at) => ts == at,
            TimeRange::From(start) => ts >= start,
            TimeRange::Before(end) => ts < end,
        }
    }

    fn predicate(&self, params: &mut Vec<Param>) -> &'static str {
        match *self {
            TimeRange::Between { start, end } => {
                params.push(Param::Timestamp(start));
                params.push(Param::Timestamp(end));
                "ts >= ? AND ts < ?"
            }
            TimeRange::At(at) => {
                params.push(Param::Timestamp(at));
                "ts = ?"
            }
            TimeRange::From(start) => {
                params.push(Param::Timestamp(start));
                "ts >= ?"
            }
            TimeRange::Before(end) => {
                params.push(Param::Timestamp(end));
                "ts < ?"
            }
        }
    }
}

/// Bounded, ordered, paginated scan of one topic in one category table.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeScan {
    pub category: Category,
    pub topic_id: TopicId,
    pub range: TimeRange,
    pub order: Order,
    pub skip: u64,
    pub limit: u64,
}

/// Every statement the historian issues.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Register a topic; a no-op if the id already exists.
    InsertTopic { id: TopicId, name: String },
    /// Replace the canonical name of an existing topic.
    RenameTopic { id: TopicId, name: String },
    /// Store one point; a no-op if `(topic_id, ts)` already exists in the table.
    UpsertPoint {
        category: Category,
        topic_id: TopicId,
        ts: DateTime<Utc>,
        value: Value,
    },
    /// Insert or replace the metadata document of a topic.
    UpsertMeta { topic_id: TopicId, meta_json: String },
    /// Rows: `(id TEXT, name TEXT)`.
    SelectTopics,
    /// Rows: `(topic_id TEXT, meta_data TEXT)`.
    SelectMeta,
    /// Rows: `(topic_id TEXT, ts INT epoch seconds, result TEXT json)`.
    RangeScan(RangeScan),
}

/// Rendered SQL text with positional `?` parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Sql {
    pub text: String,
    pub params: Vec<Param>,
}

impl Statement {
    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Statement::InsertTopic { .. } => "insert_topic",
            Statement::RenameTopic { .. } => "rename_topic",
            Statement::UpsertPoint { .. } => "upsert_point",
            Statement::UpsertMeta { .. } => "upsert_meta",
            Statement::SelectTopics => "select_topics",
            Statement::SelectMeta => "select_meta",
            Statement::RangeScan(_) => "range_scan",
        }
    }

    pub fn returns_rows(&self) -> bool {
        matches!(
            self,
            Statement::SelectTopics | Statement::SelectMeta | Statement::RangeScan(_)
        )
    }

    pub fn render(&self, layout: &TableLayout) -> Sql {
        let mut params = Vec::new();
        let text = match self {
            Statement::InsertTopic { id, name } => {
                params.push(Param::Text(id.to_hex()));
                params.push(Param::Text(name.clone()));
                format!(
                    "INSERT INTO {} (id, name) VALUES (?, ?) ON CONFLICT (id) DO NOTHING",
                    layout.topic_table()
                )
            }
            Statement::RenameTopic { id, name } => {
                params.push(Param::Text(name.clone()));
                params.push(Param::Text(id.to_hex()));
                format!("UPDATE {} SET name = ? WHERE id = ?", layout.topic_table())
            }
            Statement::UpsertPoint {
                category,
                topic_id,
                ts,
                value,
            } => {
                params.push(Param::Text(topic_id.to_hex()));
                params.push(Param::Timestamp(*ts));
                params.push(Param::Text(value.to_string()));
                format!(
                    "INSERT INTO {} (topic_id, ts, result) VALUES (?, ?, ?) \
                     ON CONFLICT (topic_id, ts) DO NOTHING",
                    layout.data_table(*category)
                )
            }
            Statement::UpsertMeta { topic_id, meta_json } => {
                params.push(Param::Text(topic_id.to_hex()));
                params.push(Param::Text(meta_json.clone()));
                format!(
                    "INSERT INTO {} (topic_id, meta_data) VALUES (?, ?) \
                     ON CONFLICT (topic_id) DO UPDATE SET meta_data = excluded.meta_data",
                    layout.meta_table()
                )
            }
            Statement::SelectTopics => format!("SELECT id, name FROM {}", layout.topic_table()),
            Statement::SelectMeta => {
                format!("SELECT topic_id, meta_data FROM {}", layout.meta_table())
            }
            Statement::RangeScan(scan) => {
                params.push(Param::Text(scan.topic_id.to_hex()));
                let predicate = scan.range.predicate(&mut params);
                let direction = match scan.order {
                    Order::FirstToLast => "ASC",
                    Order::LastToFirst => "DESC",
                };
                // Limit and offset are integers owned by us, inlined like the table name.
                format!(
                    "SELECT topic_id, ts, result FROM {} WHERE topic_id = ? AND {} \
                     ORDER BY ts {} LIMIT {} OFFSET {}",
                    layout.data_table(scan.category),
                    predicate,
                    direction,
                    scan.limit,
                    scan.skip
                )
            }
        };
        Sql { text, params }
    }
}
