//! Storage error types.

use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by storage clients.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The connection to the database is gone. Any cached connection must be
    /// discarded; the operation may be retried on a fresh one.
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("unexpected row shape: {0}")]
    RowShape(String),

    #[error("cursor already closed")]
    CursorClosed,
}

impl StoreError {
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, StoreError::ConnectionLost(_))
    }
}

impl From<StoreError> for hist_common::Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ConnectionLost(msg) => hist_common::Error::Connectivity(msg),
            StoreError::RowShape(msg) => hist_common::Error::CorruptRow(msg),
            other => hist_common::Error::Storage(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_lost_maps_to_connectivity() {
        let err: hist_common::Error = StoreError::ConnectionLost("reset by peer".into()).into();
        assert!(err.is_connectivity());
    }

    #[test]
    fn test_query_error_maps_to_storage() {
        let err: hist_common::Error = StoreError::Query("syntax".into()).into();
        assert!(matches!(err, hist_common::Error::Storage(_)));
    }
}
