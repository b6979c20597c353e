//! Storage client traits.
//!
//! The historian talks to its database through three layers:
//! `StorageClient::connect` → [`Connection`] → [`Cursor`]. A connection is
//! long-lived and reused across calls; a cursor lives for one call and must be
//! released on every exit path, which [`ScopedCursor`] guarantees.

use tracing::trace;

use crate::error::StoreResult;
use crate::row::Row;
use crate::statement::Statement;

/// Factory for connections to one database.
pub trait StorageClient {
    fn connect(&self) -> StoreResult<Box<dyn Connection>>;

    /// Backend name used in logs.
    fn backend_name(&self) -> &'static str;

    /// Whether data survives a process restart.
    fn is_durable(&self) -> bool;
}

impl<C: StorageClient + ?Sized> StorageClient for Box<C> {
    fn connect(&self) -> StoreResult<Box<dyn Connection>> {
        (**self).connect()
    }

    fn backend_name(&self) -> &'static str {
        (**self).backend_name()
    }

    fn is_durable(&self) -> bool {
        (**self).is_durable()
    }
}

/// An open database connection.
pub trait Connection: Send {
    fn cursor(&mut self) -> StoreResult<Box<dyn Cursor + '_>>;

    /// Make sure the topic, meta and category tables exist.
    ///
    /// Invoked once at startup, before the caches are loaded.
    fn ensure_schema(&mut self) -> StoreResult<()>;
}

/// Executes statements and buffers the rows of the last query.
pub trait Cursor {
    /// Returns the number of rows affected (writes) or produced (queries).
    fn execute(&mut self, statement: &Statement) -> StoreResult<u64>;

    /// Drain the rows produced by the last executed query.
    fn fetch_all(&mut self) -> StoreResult<Vec<Row>>;

    /// Release the cursor. Must be idempotent.
    fn close(&mut self);
}

/// Cursor guard that closes the underlying cursor when dropped.
pub struct ScopedCursor<'c> {
    inner: Box<dyn Cursor + 'c>,
}

impl<'c> ScopedCursor<'c> {
    pub fn open(conn: &'c mut dyn Connection) -> StoreResult<Self> {
        Ok(Self {
            inner: conn.cursor()?,
        })
    }

    pub fn execute(&mut self, statement: &Statement) -> StoreResult<u64> {
        trace!(kind = statement.kind(), "execute");
        self.inner.execute(statement)
    }

    /// Execute a row-returning statement and fetch everything it produced.
    pub fn query(&mut self, statement: &Statement) -> StoreResult<Vec<Row>> {
        self.execute(statement)?;
        self.inner.fetch_all()
    }
}

impl Drop for ScopedCursor<'_> {
    fn drop(&mut self) {
        self.inner.close();
    }
}
