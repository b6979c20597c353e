//! DuckDB-backed storage client.
//!
//! Renders [`Statement`]s to SQL and runs them on an embedded DuckDB
//! database, either file-backed or in-memory. Timestamps are kept as BIGINT
//! epoch seconds; values and metadata as JSON text. Conflict handling relies
//! on the primary keys created by [`Connection::ensure_schema`].

use std::path::{Path, PathBuf};

use duckdb::types::Value as DuckValue;
use duckdb::params_from_iter;
use hist_common::Category;
use tracing::debug;

use crate::client::{Connection, Cursor, StorageClient};
use crate::error::{StoreError, StoreResult};
use crate::layout::TableLayout;
use crate::row::{Datum, Row};
use crate::statement::{Param, Statement};

impl From<duckdb::Error> for StoreError {
    fn from(err: duckdb::Error) -> Self {
        StoreError::Query(err.to_string())
    }
}

/// Client for one DuckDB database.
///
/// Connections are clones of a root handle, so an in-memory database is
/// shared by every connection the client hands out.
pub struct DuckDbClient {
    root: duckdb::Connection,
    path: Option<PathBuf>,
    layout: TableLayout,
}

impl DuckDbClient {
    /// Open (or create) a database file, or an in-memory database when `path` is `None`.
    pub fn open(path: Option<&Path>, layout: TableLayout) -> StoreResult<Self> {
        let root = match path {
            Some(p) => duckdb::Connection::open(p)?,
            None => duckdb::Connection::open_in_memory()?,
        };
        Ok(Self {
            root,
            path: path.map(Path::to_path_buf),
            layout,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl StorageClient for DuckDbClient {
    fn connect(&self) -> StoreResult<Box<dyn Connection>> {
        let conn = self
            .root
            .try_clone()
            .map_err(|e| StoreError::ConnectionLost(e.to_string()))?;
        Ok(Box::new(DuckConnection {
            conn,
            layout: self.layout.clone(),
        }))
    }

    fn backend_name(&self) -> &'static str {
        "duckdb"
    }

    fn is_durable(&self) -> bool {
        self.path.is_some()
    }
}

struct DuckConnection {
    conn: duckdb::Connection,
    layout: TableLayout,
}

impl Connection for DuckConnection {
    fn cursor(&mut self) -> StoreResult<Box<dyn Cursor + '_>> {
        Ok(Box::new(DuckCursor {
            conn: &self.conn,
            layout: &self.layout,
            rows: Vec::new(),
            closed: false,
        }))
    }

    fn ensure_schema(&mut self) -> StoreResult<()> {
        let mut ddl = format!(
            "CREATE TABLE IF NOT EXISTS {topic} (id VARCHAR PRIMARY KEY, name VARCHAR NOT NULL);\n\
             CREATE TABLE IF NOT EXISTS {meta} (topic_id VARCHAR PRIMARY KEY, meta_data VARCHAR NOT NULL);\n",
            topic = self.layout.topic_table(),
            meta = self.layout.meta_table(),
        );
        for category in Category::ALL {
            ddl.push_str(&format!(
                "CREATE TABLE IF NOT EXISTS {} (topic_id VARCHAR NOT NULL, ts BIGINT NOT NULL, \
                 result VARCHAR, PRIMARY KEY (topic_id, ts));\n",
                self.layout.data_table(category)
            ));
        }
        self.conn.execute_batch(&ddl)?;
        Ok(())
    }
}

struct DuckCursor<'c> {
    conn: &'c duckdb::Connection,
    layout: &'c TableLayout,
    rows: Vec<Row>,
    closed: bool,
}

fn bind(params: Vec<Param>) -> Vec<DuckValue> {
    params
        .into_iter()
        .map(|p| match p {
            Param::Text(s) => DuckValue::Text(s),
            Param::Int(v) => DuckValue::BigInt(v),
            Param::Timestamp(ts) => DuckValue::BigInt(ts.timestamp()),
        })
        .collect()
}

#[derive(Clone, Copy)]
enum Column {
    Text,
    Int,
}

/// Column types of the rows a statement produces.
fn columns(statement: &Statement) -> &'static [Column] {
    match statement {
        Statement::SelectTopics | Statement::SelectMeta => &[Column::Text, Column::Text],
        Statement::RangeScan(_) => &[Column::Text, Column::Int, Column::Text],
        _ => &[],
    }
}

impl Cursor for DuckCursor<'_> {
    fn execute(&mut self, statement: &Statement) -> StoreResult<u64> {
        if self.closed {
            return Err(StoreError::CursorClosed);
        }
        let sql = statement.render(self.layout);
        debug!(kind = statement.kind(), sql = %sql.text, "duckdb execute");
        let values = bind(sql.params);

        if !statement.returns_rows() {
            self.rows.clear();
            let affected = self.conn.execute(&sql.text, params_from_iter(values))?;
            return Ok(affected as u64);
        }

        let kinds = columns(statement);
        let mut prepared = self.conn.prepare(&sql.text)?;
        let mut result = prepared.query(params_from_iter(values))?;
        let mut rows = Vec::new();
        while let Some(row) = result.next()? {
            let mut cells = Vec::with_capacity(kinds.len());
            for (idx, kind) in kinds.iter().enumerate() {
                let datum = match kind {
                    Column::Int => row.get::<_, Option<i64>>(idx)?.map_or(Datum::Null, Datum::Int),
                    Column::Text => row
                        .get::<_, Option<String>>(idx)?
                        .map_or(Datum::Null, Datum::Text),
                };
                cells.push(datum);
            }
            rows.push(Row(cells));
        }
        let count = rows.len() as u64;
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
        self.closed = true;
        self.rows.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ScopedCursor;
    use crate::statement::{RangeScan, TimeRange};
    use chrono::{TimeZone, Utc};
    use hist_common::{Order, TopicId};
    use serde_json::json;

    fn client() -> DuckDbClient {
        DuckDbClient::open(None, TableLayout::default()).expect("duckdb mem")
    }

    #[test]
    fn test_upserts_and_scan() {
        let client = client();
        let mut conn = client.connect().unwrap();
        conn.ensure_schema().unwrap();
        let id = TopicId::for_name("a/b");
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let mut cursor = ScopedCursor::open(conn.as_mut()).unwrap();
        let insert = Statement::InsertTopic {
            id,
            name: "a/b".into(),
        };
        assert_eq!(cursor.execute(&insert).unwrap(), 1);
        assert_eq!(cursor.execute(&insert).unwrap(), 0);

        let point = |value| Statement::UpsertPoint {
            category: Category::Device,
            topic_id: id,
            ts,
            value,
        };
        assert_eq!(cursor.execute(&point(json!(72.0))).unwrap(), 1);
        assert_eq!(cursor.execute(&point(json!(73.0))).unwrap(), 0);

        let rows = cursor
            .query(&Statement::RangeScan(RangeScan {
                category: Category::Device,
                topic_id: id,
                range: TimeRange::At(ts),
                order: Order::FirstToLast,
                skip: 0,
                limit: 20,
            }))
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].timestamp(1).unwrap(), ts);
        assert_eq!(rows[0].text(2).unwrap(), "72.0");
    }

    #[test]
    fn test_meta_upsert_replaces() {
        let client = client();
        let mut conn = client.connect().unwrap();
        conn.ensure_schema().unwrap();
        let id = TopicId::for_name("a/b");
        let mut cursor = ScopedCursor::open(conn.as_mut()).unwrap();
        for meta in ["{\"units\":\"F\"}", "{\"units\":\"C\"}"] {
            cursor
                .execute(&Statement::UpsertMeta {
                    topic_id: id,
                    meta_json: meta.into(),
                })
                .unwrap();
        }
        let rows = cursor.query(&Statement::SelectMeta).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].text(1).unwrap(), "{\"units\":\"C\"}");
    }

    #[test]
    fn test_connections_share_in_memory_database() {
        let client = client();
        let mut first = client.connect().unwrap();
        first.ensure_schema().unwrap();
        {
            let mut cursor = ScopedCursor::open(first.as_mut()).unwrap();
            cursor
                .execute(&Statement::InsertTopic {
                    id: TopicId::for_name("x"),
                    name: "x".into(),
                })
                .unwrap();
        }
        let mut second = client.connect().unwrap();
        let mut cursor = ScopedCursor::open(second.as_mut()).unwrap();
        assert_eq!(cursor.query(&Statement::SelectTopics).unwrap().len(), 1);
    }
}
