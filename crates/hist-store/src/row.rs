//! Result rows returned by cursors.

use chrono::{DateTime, Utc};

use crate::error::{StoreError, StoreResult};

/// A single column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    Null,
    Text(String),
    Int(i64),
}

/// One fetched row, columns in `SELECT` order.
#[derive(Debug, Clone, PartialEq)]
pub struct Row(pub Vec<Datum>);

impl Row {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn column(&self, idx: usize) -> StoreResult<&Datum> {
        self.0
            .get(idx)
            .ok_or_else(|| StoreError::RowShape(format!("missing column {idx}")))
    }

    pub fn text(&self, idx: usize) -> StoreResult<&str> {
        match self.column(idx)? {
            Datum::Text(s) => Ok(s),
            other => Err(StoreError::RowShape(format!(
                "column {idx}: expected text, got {other:?}"
            ))),
        }
    }

    pub fn int(&self, idx: usize) -> StoreResult<i64> {
        match self.column(idx)? {
            Datum::Int(v) => Ok(*v),
            other => Err(StoreError::RowShape(format!(
                "column {idx}: expected integer, got {other:?}"
            ))),
        }
    }

    /// Timestamps are stored as whole epoch seconds.
    pub fn timestamp(&self, idx: usize) -> StoreResult<DateTime<Utc>> {
        let secs = self.int(idx)?;
        DateTime::from_timestamp(secs, 0)
            .ok_or_else(|| StoreError::RowShape(format!("column {idx}: timestamp {secs} out of range")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_accessors() {
        let row = Row(vec![
            Datum::Text("abc".into()),
            Datum::Int(1_704_067_200),
            Datum::Null,
        ]);
        assert_eq!(row.text(0).unwrap(), "abc");
        assert_eq!(row.timestamp(1).unwrap().to_rfc3339(), "2024-01-01T00:00:00+00:00");
        assert!(row.text(2).is_err());
        assert!(row.int(0).is_err());
        assert!(matches!(row.text(9), Err(StoreError::RowShape(_))));
    }
}
