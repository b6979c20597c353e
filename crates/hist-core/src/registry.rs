//! Topic registry: name → stable identifier.
//!
//! Identifiers are derived from the lower-cased topic name, so any two
//! spellings that differ only by case share one id. The registry remembers the
//! canonical spelling last written for each key and keeps the `topic` table in
//! step with it: a new key is inserted, a new spelling of a known key is
//! renamed in place, and a known spelling costs no I/O.
//!
//! The in-memory map is only updated after the corresponding write succeeds.

use std::collections::HashMap;

use hist_common::{Result, TopicId, TopicKey};
use hist_store::{ScopedCursor, Statement};
use serde::Serialize;
use tracing::{debug, info, info_span, warn, Span};

/// Counts from a bulk load at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub loaded: usize,
    /// Rows that could not be decoded and were left out.
    pub skipped: usize,
}

/// How a topic name relates to what the registry already knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Never seen under any spelling.
    New,
    /// Known key, different canonical spelling.
    Renamed,
    /// Known key and spelling.
    Known,
}

/// Result of [`TopicRegistry::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub id: TopicId,
    pub key: TopicKey,
    pub resolution: Resolution,
}

#[derive(Debug, Clone)]
struct Entry {
    id: TopicId,
    name: String,
}

/// Cache of `normalized key → (id, canonical name)` mirroring the topic table.
#[derive(Debug)]
pub struct TopicRegistry {
    topics: HashMap<TopicKey, Entry>,
    span: Span,
}

impl TopicRegistry {
    pub fn new(parent: &Span) -> Self {
        Self {
            topics: HashMap::new(),
            span: info_span!(parent: parent, "topic_registry"),
        }
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// Replace the cache with the contents of the topic table.
    ///
    /// Rows whose id does not decode are skipped. If a stored id differs from
    /// the one computed for its name, the stored id is kept, since that is what
    /// the data tables reference.
    pub fn load(&mut self, cursor: &mut ScopedCursor<'_>) -> Result<LoadSummary> {
        let rows = cursor.query(&Statement::SelectTopics)?;

        let mut topics = HashMap::with_capacity(rows.len());
        let mut summary = LoadSummary::default();
        for row in rows {
            let (raw_id, name) = match (row.text(0), row.text(1)) {
                (Ok(id), Ok(name)) => (id, name),
                _ => {
                    warn!(parent: &self.span, ?row, "skipping malformed topic row");
                    summary.skipped += 1;
                    continue;
                }
            };
            let id: TopicId = match raw_id.parse() {
                Ok(id) => id,
                Err(err) => {
                    warn!(parent: &self.span, topic = name, error = %err, "skipping topic with undecodable id");
                    summary.skipped += 1;
                    continue;
                }
            };
            let key = TopicKey::new(name);
            let computed = TopicId::for_key(&key);
            if computed != id {
                warn!(
                    parent: &self.span,
                    topic = name,
                    stored = %id,
                    computed = %computed,
                    "stored topic id differs from computed id"
                );
            }
            topics.insert(
                key,
                Entry {
                    id,
                    name: name.to_string(),
                },
            );
            summary.loaded += 1;
        }

        self.topics = topics;
        info!(
            parent: &self.span,
            loaded = summary.loaded,
            skipped = summary.skipped,
            "topic registry loaded"
        );
        Ok(summary)
    }

    /// Classify a name against the cache without touching storage.
    pub fn resolve(&self, name: &str) -> Resolved {
        let key = TopicKey::new(name);
        match self.topics.get(&key) {
            Some(entry) if entry.name == name => Resolved {
                id: entry.id,
                key,
                resolution: Resolution::Known,
            },
            Some(entry) => Resolved {
                id: entry.id,
                key,
                resolution: Resolution::Renamed,
            },
            None => Resolved {
                id: TopicId::for_key(&key),
                key,
                resolution: Resolution::New,
            },
        }
    }

    /// Make sure `name` is stored and return its id.
    ///
    /// Inserting a topic that already exists in storage is a no-op there, so
    /// a stale cache never turns into a duplicate-key failure.
    pub fn register(&mut self, cursor: &mut ScopedCursor<'_>, name: &str) -> Result<TopicId> {
        let resolved = self.resolve(name);
        match resolved.resolution {
            Resolution::Known => Ok(resolved.id),
            Resolution::New => {
                let id = resolved.id;
                cursor.execute(&Statement::InsertTopic {
                    id,
                    name: name.to_string(),
                })?;
                debug!(parent: &self.span, topic = name, %id, "registered topic");
                self.remember(resolved, name);
                Ok(id)
            }
            Resolution::Renamed => self.write_rename(cursor, resolved, name),
        }
    }

    /// Store `name` as the canonical spelling of its key.
    ///
    /// Behaves like [`register`](Self::register) when the key is new or the
    /// spelling is unchanged.
    pub fn rename(&mut self, cursor: &mut ScopedCursor<'_>, name: &str) -> Result<TopicId> {
        let resolved = self.resolve(name);
        match resolved.resolution {
            Resolution::Renamed => self.write_rename(cursor, resolved, name),
            _ => self.register(cursor, name),
        }
    }

    fn write_rename(
        &mut self,
        cursor: &mut ScopedCursor<'_>,
        resolved: Resolved,
        name: &str,
    ) -> Result<TopicId> {
        let id = resolved.id;
        cursor.execute(&Statement::RenameTopic {
            id,
            name: name.to_string(),
        })?;
        info!(parent: &self.span, topic = name, %id, "renamed topic");
        self.remember(resolved, name);
        Ok(id)
    }

    fn remember(&mut self, resolved: Resolved, name: &str) {
        self.topics.insert(
            resolved.key,
            Entry {
                id: resolved.id,
                name: name.to_string(),
            },
        );
    }

    /// Id of a known topic, matched case-insensitively.
    pub fn lookup(&self, name: &str) -> Option<TopicId> {
        self.topics.get(&TopicKey::new(name)).map(|e| e.id)
    }

    /// Canonical spelling stored for a name's key.
    pub fn canonical_name(&self, name: &str) -> Option<&str> {
        self.topics
            .get(&TopicKey::new(name))
            .map(|e| e.name.as_str())
    }

    /// Every known topic as `(canonical name, id)`, sorted by name.
    pub fn topics(&self) -> Vec<(&str, TopicId)> {
        let mut all: Vec<(&str, TopicId)> = self
            .topics
            .values()
            .map(|e| (e.name.as_str(), e.id))
            .collect();
        all.sort_unstable_by(|a, b| a.0.cmp(b.0));
        all
    }
}
