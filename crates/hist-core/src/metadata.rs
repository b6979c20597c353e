//! Per-topic metadata with change detection.
//!
//! Publishers resend the same metadata with nearly every point. The cache keeps
//! the last stored document per topic id and only writes when the new one
//! differs structurally. Key order never counts as a difference.

use std::collections::HashMap;

use hist_common::{Metadata, Result, TopicId};
use hist_store::{ScopedCursor, Statement};
use serde_json::Value;
use tracing::{debug, info, info_span, warn, Span};

use crate::registry::LoadSummary;

#[derive(Debug)]
pub struct MetadataCache {
    entries: HashMap<TopicId, Metadata>,
    span: Span,
}

impl MetadataCache {
    pub fn new(parent: &Span) -> Self {
        Self {
            entries: HashMap::new(),
            span: info_span!(parent: parent, "metadata_cache"),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, topic_id: &TopicId) -> Option<&Metadata> {
        self.entries.get(topic_id)
    }

    /// Replace the cache with the contents of the meta table.
    ///
    /// A row with an undecodable id, invalid JSON, or a JSON value that is
    /// not an object is skipped and counted; the load carries on.
    pub fn load(&mut self, cursor: &mut ScopedCursor<'_>) -> Result<LoadSummary> {
        let rows = cursor.query(&Statement::SelectMeta)?;

        let mut entries = HashMap::with_capacity(rows.len());
        let mut summary = LoadSummary::default();
        for row in rows {
            let decoded = match (row.text(0), row.text(1)) {
                (Ok(raw_id), Ok(text)) => decode(raw_id, text),
                _ => Err("malformed row".to_string()),
            };
            match decoded {
                Ok((id, meta)) => {
                    entries.insert(id, meta);
                    summary.loaded += 1;
                }
                Err(reason) => {
                    warn!(parent: &self.span, ?row, %reason, "skipping corrupt metadata record");
                    summary.skipped += 1;
                }
            }
        }

        self.entries = entries;
        info!(
            parent: &self.span,
            loaded = summary.loaded,
            skipped = summary.skipped,
            "metadata cache loaded"
        );
        Ok(summary)
    }

    /// Persist `metadata` for a topic if it differs from the cached value.
    ///
    /// Returns `true` when a write happened. The cache changes only after the
    /// write succeeds.
    pub fn update_if_changed(
        &mut self,
        cursor: &mut ScopedCursor<'_>,
        topic_id: TopicId,
        metadata: &Metadata,
    ) -> Result<bool> {
        if self.entries.get(&topic_id) == Some(metadata) {
            return Ok(false);
        }
        let meta_json = serde_json::to_string(metadata)?;
        cursor.execute(&Statement::UpsertMeta { topic_id, meta_json })?;
        debug!(parent: &self.span, %topic_id, keys = metadata.len(), "metadata updated");
        self.entries.insert(topic_id, metadata.clone());
        Ok(true)
    }
}

fn decode(raw_id: &str, text: &str) -> std::result::Result<(TopicId, Metadata), String> {
    let id: TopicId = raw_id.parse().map_err(|e| format!("{e}"))?;
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok((id, map)),
        Ok(other) => Err(format!("expected a JSON object, got {other}")),
        Err(err) => Err(format!("invalid JSON: {err}")),
    }
}
