//! The historian facade.
//!
//! Owns the storage client, one lazily opened connection, the topic registry
//! and the metadata cache. Every operation takes `&mut self`, so a single
//! instance serves one batch or one query at a time.
//!
//! When an operation fails with a lost connection, the cached connection is
//! dropped and the error returned; the next call reconnects. Nothing is
//! retried inside the failed call.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use hist_common::{Error, Metadata, PublishRecord, QueryRequest, QueryResult, Result};
use hist_config::HistorianConfig;
use hist_store::{Connection, ScopedCursor, StorageClient};
use serde::Serialize;
use tracing::{error, info, info_span, Span};

use crate::ingest::{Acknowledge, BatchReport, IngestionPipeline};
use crate::metadata::MetadataCache;
use crate::query::QueryEngine;
use crate::registry::{LoadSummary, TopicRegistry};

/// Counts reported by [`Historian::setup`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SetupSummary {
    pub topics: LoadSummary,
    pub metadata: LoadSummary,
}

pub struct Historian<C: StorageClient> {
    client: C,
    connection: Option<Box<dyn Connection>>,
    registry: TopicRegistry,
    metadata: MetadataCache,
    config: HistorianConfig,
    ready: bool,
    span: Span,
}

impl<C: StorageClient> Historian<C> {
    /// Build a historian. Nothing touches storage until [`setup`](Self::setup).
    pub fn new(client: C, config: HistorianConfig, parent: &Span) -> Self {
        let span = info_span!(parent: parent, "historian", backend = client.backend_name());
        Self {
            registry: TopicRegistry::new(&span),
            metadata: MetadataCache::new(&span),
            client,
            connection: None,
            config,
            ready: false,
            span,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn config(&self) -> &HistorianConfig {
        &self.config
    }

    pub fn registry(&self) -> &TopicRegistry {
        &self.registry
    }

    pub fn metadata(&self) -> &MetadataCache {
        &self.metadata
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Whether a connection is currently cached.
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Ensure the schema exists and load both caches.
    ///
    /// Must succeed before any publish or query. Calling it again reloads
    /// the caches from storage.
    pub fn setup(&mut self) -> Result<SetupSummary> {
        let registry = &mut self.registry;
        let cache = &mut self.metadata;
        let summary = with_connection(&mut self.connection, &self.client, &self.span, |conn| {
            conn.ensure_schema()?;
            let mut cursor = ScopedCursor::open(conn)?;
            let topics = registry.load(&mut cursor)?;
            let metadata = cache.load(&mut cursor)?;
            Ok(SetupSummary { topics, metadata })
        })?;
        self.ready = true;
        info!(
            parent: &self.span,
            topics = summary.topics.loaded,
            metadata = summary.metadata.loaded,
            skipped = summary.topics.skipped + summary.metadata.skipped,
            durable = self.client.is_durable(),
            "historian ready"
        );
        Ok(summary)
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.ready {
            Ok(())
        } else {
            Err(Error::NotReady("setup has not completed".into()))
        }
    }

    /// Ingest one batch. `ack` is called once if the whole batch was handled.
    pub fn publish(
        &mut self,
        batch: &[PublishRecord],
        ack: &mut dyn Acknowledge,
    ) -> Result<BatchReport> {
        self.ensure_ready()?;
        let mut pipeline = IngestionPipeline::new(
            &mut self.registry,
            &mut self.metadata,
            &self.config.ingest,
            &self.span,
        );
        with_connection(&mut self.connection, &self.client, &self.span, |conn| {
            let mut cursor = ScopedCursor::open(conn)?;
            pipeline.publish(&mut cursor, batch, ack)
        })
    }

    /// Run a query; an open-ended window starts at the current time.
    pub fn query(&mut self, request: &QueryRequest) -> Result<QueryResult> {
        self.query_at(request, Utc::now())
    }

    /// Run a query with an explicit `now`.
    pub fn query_at(&mut self, request: &QueryRequest, now: DateTime<Utc>) -> Result<QueryResult> {
        self.ensure_ready()?;
        let engine = QueryEngine::new(&self.registry, &self.metadata, &self.config.query, &self.span);
        with_connection(&mut self.connection, &self.client, &self.span, |conn| {
            let mut cursor = ScopedCursor::open(conn)?;
            engine.execute(&mut cursor, request, now)
        })
    }

    /// Canonical names of every known topic, sorted.
    pub fn topic_list(&self) -> Vec<String> {
        self.registry
            .topics()
            .into_iter()
            .map(|(name, _)| name.to_string())
            .collect()
    }

    /// Metadata for each requested topic that is known; unknown names are left out.
    pub fn topics_metadata<S: AsRef<str>>(&self, names: &[S]) -> BTreeMap<String, Metadata> {
        names
            .iter()
            .filter_map(|name| {
                let name = name.as_ref();
                let id = self.registry.lookup(name)?;
                let meta = self.metadata.get(&id).cloned().unwrap_or_default();
                Some((name.to_string(), meta))
            })
            .collect()
    }
}

/// Run `op` on the cached connection, opening one first if needed.
///
/// A lost connection is dropped from the slot so the next call starts fresh.
fn with_connection<C, T>(
    slot: &mut Option<Box<dyn Connection>>,
    client: &C,
    span: &Span,
    op: impl FnOnce(&mut dyn Connection) -> Result<T>,
) -> Result<T>
where
    C: StorageClient + ?Sized,
{
    let result = match slot {
        Some(conn) => op(conn.as_mut()),
        None => match client.connect() {
            Ok(conn) => {
                info!(parent: span, backend = client.backend_name(), "storage connected");
                op(slot.insert(conn).as_mut())
            }
            Err(err) => Err(err.into()),
        },
    };
    if let Err(err) = &result {
        if err.is_connectivity() {
            error!(parent: span, error = %err, "storage connection lost; dropping cached connection");
            *slot = None;
        }
    }
    result
}
