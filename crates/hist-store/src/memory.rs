//! In-memory storage backend.
//!
//! Holds the topic, meta and category tables in ordinary maps behind one
//! mutex, with the same idempotent-upsert semantics as the SQL backends. It
//! exists for tests and local development, and it can inject connection
//! failures so redelivery behaviour can be exercised without a real database.
//!
//! Values and metadata are kept as JSON text and timestamps as epoch seconds,
//! exactly as a SQL backend stores them, so the decode paths are the same.
//!
//! Connections carry a generation number. Injecting a connection loss bumps
//! the store's generation, which invalidates every connection opened earlier;
//! a fresh `connect` works again.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use hist_common::{Category, Order, TopicId};

use crate::client::{Connection, Cursor, StorageClient};
use crate::error::{StoreError, StoreResult};
use crate::row::{Datum, Row};
use crate::statement::{RangeScan, Statement};

/// Counters describing what the store has been asked to do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStats {
    pub connects: u64,
    pub schema_checks: u64,
    pub statements: u64,
    pub topic_inserts: u64,
    pub topic_renames: u64,
    /// Point upserts that created a row.
    pub points_written: u64,
    /// Point upserts absorbed because the key already existed.
    pub points_ignored: u64,
    pub meta_writes: u64,
    pub cursors_opened: u64,
    pub cursors_closed: u64,
}

impl MemoryStats {
    pub fn open_cursors(&self) -> u64 {
        self.cursors_opened - self.cursors_closed
    }
}

#[derive(Debug, Default)]
struct Faults {
    /// Statements that may still run before the connection drops.
    fail_after: Option<u64>,
    /// Number of upcoming `connect` calls to refuse.
    refuse_connects: u32,
}

#[derive(Debug, Default)]
struct MemoryState {
    /// id (hex) -> canonical name
    topics: BTreeMap<String, String>,
    /// topic id (hex) -> metadata JSON text
    meta: BTreeMap<String, String>,
    /// per category: (topic id hex, epoch seconds) -> value JSON text
    data: HashMap<Category, BTreeMap<(String, i64), String>>,
    generation: u64,
    faults: Faults,
    stats: MemoryStats,
}

impl MemoryState {
    fn apply(&mut self, statement: &Statement) -> StoreResult<(u64, Vec<Row>)> {
        match statement {
            Statement::InsertTopic { id, name } => {
                let key = id.to_hex();
                if self.topics.contains_key(&key) {
                    return Ok((0, Vec::new()));
                }
                self.topics.insert(key, name.clone());
                self.stats.topic_inserts += 1;
                Ok((1, Vec::new()))
            }
            Statement::RenameTopic { id, name } => match self.topics.get_mut(&id.to_hex()) {
                Some(stored) => {
                    *stored = name.clone();
                    self.stats.topic_renames += 1;
                    Ok((1, Vec::new()))
                }
                None => Ok((0, Vec::new())),
            },
            Statement::UpsertPoint {
                category,
                topic_id,
                ts,
                value,
            } => {
                let table = self.data.entry(*category).or_default();
                let key = (topic_id.to_hex(), ts.timestamp());
                if table.contains_key(&key) {
                    self.stats.points_ignored += 1;
                    return Ok((0, Vec::new()));
                }
                table.insert(key, value.to_string());
                self.stats.points_written += 1;
                Ok((1, Vec::new()))
            }
            Statement::UpsertMeta { topic_id, meta_json } => {
                self.meta.insert(topic_id.to_hex(), meta_json.clone());
                self.stats.meta_writes += 1;
                Ok((1, Vec::new()))
            }
            Statement::SelectTopics => {
                let rows: Vec<Row> = self
                    .topics
                    .iter()
                    .map(|(id, name)| Row(vec![Datum::Text(id.clone()), Datum::Text(name.clone())]))
                    .collect();
                Ok((rows.len() as u64, rows))
            }
            Statement::SelectMeta => {
                let rows: Vec<Row> = self
                    .meta
                    .iter()
                    .map(|(id, meta)| Row(vec![Datum::Text(id.clone()), Datum::Text(meta.clone())]))
                    .collect();
                Ok((rows.len() as u64, rows))
            }
            Statement::RangeScan(scan) => {
                let rows = self.scan(scan);
                Ok((rows.len() as u64, rows))
            }
        }
    }

    fn scan(&self, scan: &RangeScan) -> Vec<Row> {
        let Some(table) = self.data.get(&scan.category) else {
            return Vec::new();
        };
        let id = scan.topic_id.to_hex();
        let mut matched: Vec<(&(String, i64), &String)> = table
            .iter()
            .filter(|((topic, secs), _)| {
                *topic == id
                    && chrono::DateTime::from_timestamp(*secs, 0)
                        .is_some_and(|ts| scan.range.contains(ts))
            })
            .collect();
        // BTreeMap order is already ascending by (topic, ts).
        if scan.order == Order::LastToFirst {
            matched.reverse();
        }
        matched
            .into_iter()
            .skip(scan.skip as usize)
            .take(scan.limit as usize)
            .map(|((topic, secs), value)| {
                Row(vec![
                    Datum::Text(topic.clone()),
                    Datum::Int(*secs),
                    Datum::Text(value.clone()),
                ])
            })
            .collect()
    }
}

/// Shared in-memory database. Clones refer to the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Mutex<MemoryState>>,
}

fn lock(shared: &Mutex<MemoryState>) -> MutexGuard<'_, MemoryState> {
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let `statements` more statements succeed, then drop the connection on
    /// the next one. The failing statement has no effect.
    pub fn fail_after(&self, statements: u64) {
        lock(&self.shared).faults.fail_after = Some(statements);
    }

    /// Drop every open connection now.
    pub fn drop_connections(&self) {
        lock(&self.shared).generation += 1;
    }

    /// Refuse the next `count` connection attempts.
    pub fn refuse_connects(&self, count: u32) {
        lock(&self.shared).faults.refuse_connects = count;
    }

    pub fn stats(&self) -> MemoryStats {
        lock(&self.shared).stats.clone()
    }

    pub fn row_count(&self, category: Category) -> usize {
        lock(&self.shared)
            .data
            .get(&category)
            .map_or(0, BTreeMap::len)
    }

    pub fn topic_name(&self, id: &TopicId) -> Option<String> {
        lock(&self.shared).topics.get(&id.to_hex()).cloned()
    }

    pub fn meta_json(&self, id: &TopicId) -> Option<String> {
        lock(&self.shared).meta.get(&id.to_hex()).cloned()
    }

    /// Write a topic row verbatim, bypassing id computation.
    pub fn put_raw_topic(&self, id: &str, name: &str) {
        lock(&self.shared)
            .topics
            .insert(id.to_string(), name.to_string());
    }

    /// Write a meta row verbatim, e.g. to simulate a corrupt record.
    pub fn put_raw_meta(&self, topic_id: &str, meta_data: &str) {
        lock(&self.shared)
            .meta
            .insert(topic_id.to_string(), meta_data.to_string());
    }
}

impl StorageClient for MemoryStore {
    fn connect(&self) -> StoreResult<Box<dyn Connection>> {
        let mut state = lock(&self.shared);
        if state.faults.refuse_connects > 0 {
            state.faults.refuse_connects -= 1;
            return Err(StoreError::ConnectionLost("connection refused".into()));
        }
        state.stats.connects += 1;
        Ok(Box::new(MemoryConnection {
            shared: Arc::clone(&self.shared),
            generation: state.generation,
        }))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }

    fn is_durable(&self) -> bool {
        false
    }
}

struct MemoryConnection {
    shared: Arc<Mutex<MemoryState>>,
    generation: u64,
}

impl MemoryConnection {
    fn check_alive(&self, state: &MemoryState) -> StoreResult<()> {
        if state.generation != self.generation {
            return Err(StoreError::ConnectionLost("server closed the connection".into()));
        }
        Ok(())
    }
}

impl Connection for MemoryConnection {
    fn cursor(&mut self) -> StoreResult<Box<dyn Cursor + '_>> {
        let mut state = lock(&self.shared);
        self.check_alive(&state)?;
        state.stats.cursors_opened += 1;
        drop(state);
        Ok(Box::new(MemoryCursor {
            conn: &*self,
            rows: Vec::new(),
            closed: false,
        }))
    }

    fn ensure_schema(&mut self) -> StoreResult<()> {
        let mut state = lock(&self.shared);
        self.check_alive(&state)?;
        state.stats.schema_checks += 1;
        Ok(())
    }
}

struct MemoryCursor<'c> {
    conn: &'c MemoryConnection,
    rows: Vec<Row>,
    closed: bool,
}

impl Cursor for MemoryCursor<'_> {
    fn execute(&mut self, statement: &Statement) -> StoreResult<u64> {
        if self.closed {
            return Err(StoreError::CursorClosed);
        }
        let mut state = lock(&self.conn.shared);
        self.conn.check_alive(&state)?;
        if let Some(remaining) = state.faults.fail_after {
            if remaining == 0 {
                state.faults.fail_after = None;
                state.generation += 1;
                return Err(StoreError::ConnectionLost(format!(
                    "connection dropped during {}",
                    statement.kind()
                )));
            }
            state.faults.fail_after = Some(remaining - 1);
        }
        state.stats.statements += 1;
        let (count, rows) = state.apply(statement)?;
        self.rows = rows;
        Ok(count)
    }

    fn fetch_all(&mut self) -> StoreResult<Vec<Row>> {
        if self.closed {
            return Err(StoreError::CursorClosed);
        }
        Ok(std::mem::take(&mut self.rows))
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.rows.clear();
        lock(&self.conn.shared).stats.cursors_closed += 1;
    }
}

impl Drop for MemoryCursor<'_> {
    fn drop(&mut self) {
        self.close();
    }
}
