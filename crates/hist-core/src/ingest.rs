//! Batch ingestion.
//!
//! For each record, in order: rewrite the topic, classify the source tag,
//! coerce the value by its `type` hint, normalize the storage name, register
//! the topic, upsert the point, then update metadata.
//!
//! Data problems in one record (unknown category, value that will not coerce)
//! reject that record only; it is logged and listed in the [`BatchReport`].
//! Any storage error aborts the whole batch before acknowledgment. Every
//! write is idempotent, so redelivering an aborted batch stores each point
//! exactly once.

use hist_common::{Category, DataPoint, Metadata, PublishRecord, Result};
use hist_config::IngestConfig;
use hist_store::{ScopedCursor, Statement};
use serde::Serialize;
use serde_json::{Number, Value};
use thiserror::Error;
use tracing::{debug, info, warn, Span};

use crate::metadata::MetadataCache;
use crate::registry::TopicRegistry;

/// Why a single record was rejected.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PointError {
    #[error("unknown category tag {tag:?}")]
    UnknownCategory { tag: String },

    #[error("cannot coerce {value} to {hint}")]
    Coercion { hint: String, value: String },

    #[error("topic name is empty")]
    EmptyTopic,
}

/// A rejected record and its position in the batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointRejection {
    pub index: usize,
    pub topic: String,
    pub reason: PointError,
}

/// Outcome of a fully processed batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub received: usize,
    /// Records that reached storage (including upserts absorbed as duplicates).
    pub stored: usize,
    /// Points that created a new row.
    pub inserted: usize,
    pub metadata_writes: usize,
    pub rejected: Vec<PointRejection>,
}

impl BatchReport {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// Receives the "batch handled" signal. Called at most once per batch, and
/// only when every record was either stored or rejected.
pub trait Acknowledge {
    fn acknowledge(&mut self, report: &BatchReport);
}

impl<F: FnMut(&BatchReport)> Acknowledge for F {
    fn acknowledge(&mut self, report: &BatchReport) {
        self(report)
    }
}

/// Coerce a raw value according to the `type` hint in its metadata.
///
/// `integer` yields an i64 (numbers truncate toward zero, numeric strings are
/// parsed, booleans map to 0/1); `float` yields a finite f64. Any other hint,
/// or none, passes the value through untouched.
pub fn coerce_value(value: &Value, meta: &Metadata) -> std::result::Result<Value, PointError> {
    let fail = |hint: &str| PointError::Coercion {
        hint: hint.to_string(),
        value: value.to_string(),
    };
    match meta.get("type").and_then(Value::as_str) {
        Some("integer") => to_integer(value).map(Value::from).ok_or_else(|| fail("integer")),
        Some("float") => to_float(value)
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| fail("float")),
        _ => Ok(value.clone()),
    }
}

fn to_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_u64().and_then(|u| i64::try_from(u).ok()))
            .or_else(|| n.as_f64().and_then(truncate_f64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(truncate_f64))
        }
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

fn truncate_f64(f: f64) -> Option<i64> {
    let t = f.trunc();
    // i64::MAX is not representable as f64; 2^63 is the first value out of range.
    if t.is_finite() && t >= i64::MIN as f64 && t < 9_223_372_036_854_775_808.0 {
        Some(t as i64)
    } else {
        None
    }
}

fn to_float(value: &Value) -> Option<f64> {
    let f = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        Value::Bool(b) => f64::from(u8::from(*b)),
        _ => return None,
    };
    f.is_finite().then_some(f)
}

/// A record that passed classification and coercion.
struct Classified {
    category: Category,
    name: String,
    value: Value,
}

/// Writes one batch through the registry and metadata cache.
///
/// Borrowed from the owning [`Historian`](crate::Historian) for the duration
/// of a batch.
pub struct IngestionPipeline<'a> {
    registry: &'a mut TopicRegistry,
    metadata: &'a mut MetadataCache,
    config: &'a IngestConfig,
    span: &'a Span,
}

impl<'a> IngestionPipeline<'a> {
    pub fn new(
        registry: &'a mut TopicRegistry,
        metadata: &'a mut MetadataCache,
        config: &'a IngestConfig,
        span: &'a Span,
    ) -> Self {
        Self {
            registry,
            metadata,
            config,
            span,
        }
    }

    fn classify(&self, record: &PublishRecord) -> std::result::Result<Classified, PointError> {
        let topic = self.config.rewrite_topic(&record.topic);
        let category = Category::from_source(&record.source).ok_or_else(|| PointError::UnknownCategory {
            tag: record.source.clone(),
        })?;
        let value = coerce_value(&record.value, &record.meta)?;
        let name = category.storage_name(&topic);
        if name.trim_matches('/').is_empty() {
            return Err(PointError::EmptyTopic);
        }
        Ok(Classified {
            category,
            name,
            value,
        })
    }

    /// Process every record, then acknowledge.
    ///
    /// On a storage error the batch is abandoned: no acknowledgment, and the
    /// error is returned so the caller can drop its connection and redeliver.
    pub fn publish(
        &mut self,
        cursor: &mut ScopedCursor<'_>,
        batch: &[PublishRecord],
        ack: &mut dyn Acknowledge,
    ) -> Result<BatchReport> {
        let mut report = BatchReport {
            received: batch.len(),
            ..BatchReport::default()
        };

        for (index, record) in batch.iter().enumerate() {
            let classified = match self.classify(record) {
                Ok(c) => c,
                Err(reason) => {
                    warn!(parent: self.span, index, topic = %record.topic, %reason, "rejecting point");
                    report.rejected.push(PointRejection {
                        index,
                        topic: record.topic.clone(),
                        reason,
                    });
                    continue;
                }
            };

            let topic_id = self.registry.register(cursor, &classified.name)?;
            let point = DataPoint::new(topic_id, record.timestamp, classified.value, classified.category);
            let inserted = cursor.execute(&Statement::UpsertPoint {
                category: point.category,
                topic_id: point.topic_id,
                ts: point.ts,
                value: point.value,
            })?;
            if self.metadata.update_if_changed(cursor, topic_id, &record.meta)? {
                report.metadata_writes += 1;
            }

            report.stored += 1;
            report.inserted += usize::try_from(inserted).unwrap_or(0);
            debug!(parent: self.span, index, topic = %classified.name, category = %classified.category, "point stored");
        }

        info!(
            parent: self.span,
            received = report.received,
            stored = report.stored,
            rejected = report.rejected.len(),
            "batch acknowledged"
        );
        ack.acknowledge(&report);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hint(kind: &str) -> Metadata {
        let mut meta = Metadata::new();
        meta.insert("type".into(), json!(kind));
        meta
    }

    #[test]
    fn test_integer_coercion() {
        let meta = hint("integer");
        assert_eq!(coerce_value(&json!(7), &meta).unwrap(), json!(7));
        assert_eq!(coerce_value(&json!(7.9), &meta).unwrap(), json!(7));
        assert_eq!(coerce_value(&json!(-7.9), &meta).unwrap(), json!(-7));
        assert_eq!(coerce_value(&json!(" 42 "), &meta).unwrap(), json!(42));
        assert_eq!(coerce_value(&json!(true), &meta).unwrap(), json!(1));
        assert!(coerce_value(&json!("warm"), &meta).is_err());
        assert!(coerce_value(&json!(null), &meta).is_err());
        assert!(coerce_value(&json!(1e300), &meta).is_err());
    }

    #[test]
    fn test_float_coercion() {
        let meta = hint("float");
        assert_eq!(coerce_value(&json!(72), &meta).unwrap(), json!(72.0));
        assert_eq!(coerce_value(&json!("3.5"), &meta).unwrap(), json!(3.5));
        assert_eq!(coerce_value(&json!(false), &meta).unwrap(), json!(0.0));
        assert!(coerce_value(&json!("NaN"), &meta).is_err());
        assert!(coerce_value(&json!("inf"), &meta).is_err());
        assert!(coerce_value(&json!([1.0]), &meta).is_err());
    }

    #[test]
    fn test_other_hints_pass_through() {
        let value = json!({"state": "on"});
        assert_eq!(coerce_value(&value, &hint("string")).unwrap(), value);
        assert_eq!(coerce_value(&value, &Metadata::new()).unwrap(), value);
    }

    #[test]
    fn test_point_error_serializes_with_kind() {
        let err = PointError::UnknownCategory { tag: "bogus".into() };
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            json!({"kind": "unknown_category", "tag": "bogus"})
        );
        assert_eq!(err.to_string(), "unknown category tag \"bogus\"");
    }

    #[test]
    fn test_closure_acknowledges() {
        let mut seen = 0;
        {
            let mut ack = |report: &BatchReport| seen += report.received;
            let ack: &mut dyn Acknowledge = &mut ack;
            ack.acknowledge(&BatchReport {
                received: 3,
                ..BatchReport::default()
            });
        }
        assert_eq!(seen, 3);
    }
}
