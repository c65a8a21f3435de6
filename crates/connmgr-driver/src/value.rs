//! Statement parameters and results.

use bytes::Bytes;

/// A parameter or column value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// NULL value.
    #[default]
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed integer value.
    Int(i64),
    /// Floating point value.
    Float(f64),
    /// Text value.
    Text(String),
    /// Binary value.
    Bytes(Bytes),
}

impl Value {
    /// Check if the value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the value as an i64, if it is one.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Bool(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    /// Get the value as a string slice, if it is one.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<Bytes> for Value {
    fn from(v: Bytes) -> Self {
        Self::Bytes(v)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Self::Null,
        }
    }
}

/// Outcome of one executed statement.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryResult {
    /// Column names, empty for statements that return no rows.
    pub columns: Vec<String>,
    /// Result rows in server order.
    pub rows: Vec<Vec<Value>>,
    /// Rows changed by a write statement.
    pub affected_rows: u64,
    /// Id generated by the last insert, if any.
    pub last_insert_id: Option<u64>,
}

impl QueryResult {
    /// A result for a statement that changed `count` rows.
    #[must_use]
    pub fn affected(count: u64) -> Self {
        Self {
            affected_rows: count,
            ..Self::default()
        }
    }

    /// A result set with the given columns and rows.
    #[must_use]
    pub fn rows(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns,
            rows,
            ..Self::default()
        }
    }

    /// A single-row, single-column result.
    #[must_use]
    pub fn scalar(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::rows(vec![column.into()], vec![vec![value.into()]])
    }

    /// First column of the first row.
    #[must_use]
    pub fn first_value(&self) -> Option<&Value> {
        self.rows.first().and_then(|row| row.first())
    }

    /// Number of rows in the result set.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_conversions() {
        assert_eq!(Value::from(7i32), Value::Int(7));
        assert_eq!(Value::from("abc").as_str(), Some("abc"));
        assert!(Value::from(None::<i64>).is_null());
        assert_eq!(Value::from(true).as_i64(), Some(1));
    }

    #[test]
    fn test_scalar_result() {
        let result = QueryResult::scalar("answer", 42i64);
        assert_eq!(result.columns, vec!["answer".to_string()]);
        assert_eq!(result.first_value(), Some(&Value::Int(42)));
        assert_eq!(result.row_count(), 1);
    }

    #[test]
    fn test_affected_result() {
        let result = QueryResult::affected(3);
        assert_eq!(result.affected_rows, 3);
        assert!(result.first_value().is_none());
    }
}
