//! File-backed DuckDB persistence across client instances.
#![cfg(feature = "duckdb")]

use hist_common::TopicId;
use hist_store::{DuckDbClient, ScopedCursor, Statement, StorageClient, TableLayout};
use tempfile::tempdir;

#[test]
fn rows_survive_reopen() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("historian.duckdb");
    let id = TopicId::for_name("campus/meter");

    {
        let client = DuckDbClient::open(Some(&path), TableLayout::with_prefix("h_")).unwrap();
        assert!(client.is_durable());
        let mut conn = client.connect().unwrap();
        conn.ensure_schema().unwrap();
        let mut cursor = ScopedCursor::open(conn.as_mut()).unwrap();
        cursor
            .execute(&Statement::InsertTopic {
                id,
                name: "campus/meter".into(),
            })
            .unwrap();
    }

    let client = DuckDbClient::open(Some(&path), TableLayout::with_prefix("h_")).unwrap();
    let mut conn = client.connect().unwrap();
    conn.ensure_schema().unwrap();
    let mut cursor = ScopedCursor::open(conn.as_mut()).unwrap();
    let rows = cursor.query(&Statement::SelectTopics).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].text(0).unwrap(), id.to_hex());
    assert_eq!(rows[0].text(1).unwrap(), "campus/meter");
}
