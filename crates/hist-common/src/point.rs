//! Points, publish records, and query request/response types.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::category::Category;
use crate::error::{Error, Result};
use crate::id::TopicId;

/// Per-topic metadata mapping. Compared structurally (key order is irrelevant).
pub type Metadata = serde_json::Map<String, Value>;

/// One measurement as delivered to the ingestion pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishRecord {
    pub timestamp: DateTime<Utc>,
    /// Source tag, e.g. `scrape`, `log`, `analysis`, `record`.
    pub source: String,
    pub topic: String,
    pub value: Value,
    #[serde(default)]
    pub meta: Metadata,
}

impl PublishRecord {
    pub fn new(
        timestamp: DateTime<Utc>,
        source: impl Into<String>,
        topic: impl Into<String>,
        value: Value,
    ) -> Self {
        Self {
            timestamp,
            source: source.into(),
            topic: topic.into(),
            value,
            meta: Metadata::new(),
        }
    }

    pub fn with_meta(mut self, meta: Metadata) -> Self {
        self.meta = meta;
        self
    }
}

/// A classified, coerced point ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct DataPoint {
    pub topic_id: TopicId,
    /// UTC, truncated to whole seconds.
    pub ts: DateTime<Utc>,
    pub value: Value,
    pub category: Category,
}

impl DataPoint {
    pub fn new(topic_id: TopicId, ts: DateTime<Utc>, value: Value, category: Category) -> Self {
        Self {
            topic_id,
            ts: truncate_to_second(ts),
            value,
            category,
        }
    }
}

/// Drop sub-second precision. Storage keeps second resolution only.
pub fn truncate_to_second(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.trunc_subsecs(0)
}

/// Parse an ISO-8601 timestamp.
///
/// Accepts RFC 3339 with an offset, or a naive date-time (`T` or space
/// separated, optional fraction) or bare date, both read as UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let text = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc());
        }
    }
    Err(Error::InvalidTimestamp(raw.to_string()))
}

/// Result ordering for range queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Order {
    #[default]
    FirstToLast,
    LastToFirst,
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Order::FirstToLast => write!(f, "FIRST_TO_LAST"),
            Order::LastToFirst => write!(f, "LAST_TO_FIRST"),
        }
    }
}

impl FromStr for Order {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "FIRST_TO_LAST" => Ok(Order::FirstToLast),
            "LAST_TO_FIRST" => Ok(Order::LastToFirst),
            _ => Err(Error::InvalidQuery(format!("unknown order {s:?}"))),
        }
    }
}

/// A logical range query over one topic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Topic name including its category prefix, e.g. `device/building/ahu1/temp`.
    pub topic: String,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default)]
    pub order: Order,
    #[serde(default)]
    pub skip: u64,
    /// Row limit; the configured default applies when absent or zero.
    #[serde(default)]
    pub count: Option<u64>,
}

impl QueryRequest {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            ..Self::default()
        }
    }

    pub fn start(mut self, start: impl Into<String>) -> Self {
        self.start = Some(start.into());
        self
    }

    pub fn end(mut self, end: impl Into<String>) -> Self {
        self.end = Some(end.into());
        self
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order = order;
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }

    pub fn count(mut self, count: u64) -> Self {
        self.count = Some(count);
        self
    }
}

/// How a query was resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryOutcome {
    #[default]
    Found,
    /// The leading segment is not a recognized category.
    InvalidTopic,
    /// The category is valid but the topic was never registered.
    TopicNotFound,
}

/// Query response: ordered `(timestamp, value)` pairs plus the topic's metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub values: Vec<(DateTime<Utc>, Value)>,
    pub metadata: Metadata,
    #[serde(default)]
    pub outcome: QueryOutcome,
}

impl QueryResult {
    pub fn empty(outcome: QueryOutcome) -> Self {
        Self {
            values: Vec::new(),
            metadata: Metadata::new(),
            outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};
    use serde_json::json;

    #[test]
    fn test_truncate_to_second() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 7).unwrap()
            + chrono::Duration::milliseconds(987);
        let truncated = truncate_to_second(ts);
        assert_eq!(truncated.second(), 7);
        assert_eq!(truncated.nanosecond(), 0);
    }

    #[test]
    fn test_data_point_truncates() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 7).unwrap()
            + chrono::Duration::microseconds(5);
        let point = DataPoint::new(TopicId::for_name("a"), ts, json!(1), Category::Device);
        assert_eq!(point.ts, Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 7).unwrap());
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(parse_timestamp("2024-01-02T03:04:05Z").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-01-02T05:04:05+02:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-01-02T03:04:05").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-01-02 03:04:05.000").unwrap(), expected);
        assert_eq!(
            parse_timestamp("2024-01-02").unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        let err = parse_timestamp("yesterday").unwrap_err();
        assert!(matches!(err, Error::InvalidTimestamp(_)));
    }

    #[test]
    fn test_order_parse_and_serde() {
        assert_eq!("first_to_last".parse::<Order>().unwrap(), Order::FirstToLast);
        assert_eq!("LAST_TO_FIRST".parse::<Order>().unwrap(), Order::LastToFirst);
        assert!("sideways".parse::<Order>().is_err());
        assert_eq!(
            serde_json::to_string(&Order::LastToFirst).unwrap(),
            "\"LAST_TO_FIRST\""
        );
    }

    #[test]
    fn test_publish_record_meta_defaults_empty() {
        let record: PublishRecord = serde_json::from_value(json!({
            "timestamp": "2024-01-01T00:00:00Z",
            "source": "scrape",
            "topic": "building/ahu1/temp",
            "value": 72
        }))
        .unwrap();
        assert!(record.meta.is_empty());
        assert_eq!(record.value, json!(72));
    }

    #[test]
    fn test_metadata_equality_ignores_key_order() {
        let a: Metadata = serde_json::from_str(r#"{"type":"float","units":"F"}"#).unwrap();
        let b: Metadata = serde_json::from_str(r#"{"units":"F","type":"float"}"#).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_query_result_serializes_values_as_pairs() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let result = QueryResult {
            values: vec![(ts, json!(72.0))],
            metadata: Metadata::new(),
            outcome: QueryOutcome::Found,
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["values"][0][0], json!("2024-01-01T00:00:00Z"));
        assert_eq!(value["values"][0][1], json!(72.0));
    }
}
