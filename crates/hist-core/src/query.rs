//! Range queries.
//!
//! A query topic carries its category as the leading path segment. The rest
//! is normalized exactly as ingestion normalizes it, looked up in the
//! registry, and turned into a bounded scan of that category's table.
//!
//! Time window policy:
//!
//! | start | end | predicate            |
//! |-------|-----|----------------------|
//! | yes   | yes | `start <= ts < end`  |
//! | = end | = start | `ts = start`     |
//! | yes   | no  | `ts >= start`        |
//! | no    | yes | `ts < end`           |
//! | no    | no  | `ts >= now`          |
//!
//! An `end` earlier than `start` selects nothing.

use chrono::{DateTime, Utc};
use hist_common::{
    parse_timestamp, split_query_topic, Error, QueryOutcome, QueryRequest, QueryResult, Result,
    TopicId,
};
use hist_config::QueryConfig;
use hist_store::{RangeScan, ScopedCursor, Statement, TimeRange};
use serde_json::Value;
use tracing::{debug, Span};

use crate::metadata::MetadataCache;
use crate::registry::TopicRegistry;

/// Build the time predicate for optional bounds.
///
/// Returns `None` when the window is empty (`end < start`).
pub fn time_range(
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<TimeRange> {
    match (start, end) {
        (Some(s), Some(e)) if s == e => Some(TimeRange::At(s)),
        (Some(s), Some(e)) if e < s => None,
        (Some(start), Some(end)) => Some(TimeRange::Between { start, end }),
        (Some(s), None) => Some(TimeRange::From(s)),
        (None, Some(e)) => Some(TimeRange::Before(e)),
        (None, None) => Some(TimeRange::From(now)),
    }
}

/// What a query resolves to before touching storage.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryPlan {
    /// Scan the table.
    Scan(RangeScan),
    /// The topic exists but the window cannot contain anything.
    EmptyWindow(TopicId),
    /// The topic did not resolve.
    Unresolved(QueryOutcome),
}

/// Answers queries against the registry and metadata cache it borrows.
pub struct QueryEngine<'a> {
    registry: &'a TopicRegistry,
    metadata: &'a MetadataCache,
    config: &'a QueryConfig,
    span: &'a Span,
}

impl<'a> QueryEngine<'a> {
    pub fn new(
        registry: &'a TopicRegistry,
        metadata: &'a MetadataCache,
        config: &'a QueryConfig,
        span: &'a Span,
    ) -> Self {
        Self {
            registry,
            metadata,
            config,
            span,
        }
    }

    /// Resolve a request into a plan. `now` is the lower bound used when the
    /// request gives neither start nor end.
    pub fn plan(&self, request: &QueryRequest, now: DateTime<Utc>) -> Result<QueryPlan> {
        let start = request.start.as_deref().map(parse_timestamp).transpose()?;
        let end = request.end.as_deref().map(parse_timestamp).transpose()?;

        let Some((category, name)) = split_query_topic(&request.topic) else {
            debug!(parent: self.span, topic = %request.topic, "query topic has no known category");
            return Ok(QueryPlan::Unresolved(QueryOutcome::InvalidTopic));
        };
        let Some(topic_id) = self.registry.lookup(&name) else {
            debug!(parent: self.span, topic = %request.topic, "query topic not registered");
            return Ok(QueryPlan::Unresolved(QueryOutcome::TopicNotFound));
        };
        let Some(range) = time_range(start, end, now) else {
            return Ok(QueryPlan::EmptyWindow(topic_id));
        };

        Ok(QueryPlan::Scan(RangeScan {
            category,
            topic_id,
            range,
            order: request.order,
            skip: request.skip,
            limit: self.config.limit_for(request.count),
        }))
    }

    /// Plan and run a query.
    pub fn execute(
        &self,
        cursor: &mut ScopedCursor<'_>,
        request: &QueryRequest,
        now: DateTime<Utc>,
    ) -> Result<QueryResult> {
        let scan = match self.plan(request, now)? {
            QueryPlan::Unresolved(outcome) => return Ok(QueryResult::empty(outcome)),
            QueryPlan::EmptyWindow(topic_id) => {
                return Ok(QueryResult {
                    metadata: self.metadata_for(&topic_id),
                    ..QueryResult::empty(QueryOutcome::Found)
                })
            }
            QueryPlan::Scan(scan) => scan,
        };

        let rows = cursor.query(&Statement::RangeScan(scan.clone()))?;
        let mut values = Vec::with_capacity(rows.len());
        for row in rows {
            let ts = row.timestamp(1)?;
            let raw = row.text(2)?;
            let value: Value = serde_json::from_str(raw)
                .map_err(|e| Error::CorruptRow(format!("value at {ts} is not JSON: {e}")))?;
            values.push((ts, value));
        }
        debug!(
            parent: self.span,
            topic = %request.topic,
            category = %scan.category,
            rows = values.len(),
            "query answered"
        );

        Ok(QueryResult {
            values,
            metadata: self.metadata_for(&scan.topic_id),
            outcome: QueryOutcome::Found,
        })
    }

    fn metadata_for(&self, topic_id: &TopicId) -> hist_common::Metadata {
        self.metadata.get(topic_id).cloned().unwrap_or_default()
    }
}
