//! Backend-neutral values, rows and cursors.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use super::DbError;

/// A dynamically typed SQL value, used both for parameters and results.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Bool(bool),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Text(_) => "text",
            Value::Bool(_) => "bool",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Real(r) => write!(f, "{}", r),
            Value::Text(t) => write!(f, "{:?}", t),
            Value::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::Integer(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Value::Integer(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Real(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Value::Text(value.clone())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Build a parameter slice for [`Connection::execute`](super::Connection::execute).
///
/// ```rust,ignore
/// conn.execute("SELECT * FROM users WHERE email = ?", db_params![email]).await?;
/// ```
#[macro_export]
macro_rules! db_params {
    () => {
        &[] as &[$crate::db::Value]
    };
    ($($value:expr),+ $(,)?) => {
        &[$($crate::db::Value::from($value)),+] as &[$crate::db::Value]
    };
}

/// Conversion from a [`Value`] into a Rust type.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Integer(i) => Some(*i),
            Value::Bool(b) => Some(i64::from(*b)),
            Value::Text(t) => t.trim().parse().ok(),
            _ => None,
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Option<Self> {
        i64::from_value(value).and_then(|i| i32::try_from(i).ok())
    }
}

impl FromValue for u32 {
    fn from_value(value: &Value) -> Option<Self> {
        i64::from_value(value).and_then(|i| u32::try_from(i).ok())
    }
}

impl FromValue for u64 {
    fn from_value(value: &Value) -> Option<Self> {
        i64::from_value(value).and_then(|i| u64::try_from(i).ok())
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Real(r) => Some(*r),
            Value::Integer(i) => Some(*i as f64),
            Value::Text(t) => t.trim().parse().ok(),
            _ => None,
        }
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(*b),
            Value::Integer(i) => Some(*i != 0),
            Value::Text(t) => match t.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "t" => Some(true),
                "0" | "false" | "f" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Text(t) => Some(t.clone()),
            Value::Integer(i) => Some(i.to_string()),
            Value::Real(r) => Some(r.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Null => None,
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Option<Self> {
        if value.is_null() {
            Some(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}

/// One result row with columns addressable by name on every backend.
#[derive(Debug, Clone)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    pub(crate) fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Raw value of a column, matching the name case-insensitively.
    pub fn value(&self, column: &str) -> Option<&Value> {
        let index = self
            .columns
            .iter()
            .position(|c| c == column)
            .or_else(|| {
                self.columns
                    .iter()
                    .position(|c| c.eq_ignore_ascii_case(column))
            })?;
        self.values.get(index)
    }

    /// Typed value of a column. Use `Option<T>` for nullable columns.
    pub fn get<T: FromValue>(&self, column: &str) -> Result<T, DbError> {
        let value = self
            .value(column)
            .ok_or_else(|| DbError::MissingColumn(column.to_string()))?;
        T::from_value(value).ok_or_else(|| DbError::Decode {
            column: column.to_string(),
            found: value.kind().to_string(),
        })
    }
}

/// Result of one executed statement.
#[derive(Debug, Default)]
pub struct Cursor {
    rows: VecDeque<Row>,
    rows_affected: u64,
    last_insert_id: Option<i64>,
}

impl Cursor {
    pub(crate) fn new(rows: Vec<Row>, rows_affected: u64) -> Self {
        Self {
            rows: rows.into(),
            rows_affected,
            last_insert_id: None,
        }
    }

    pub(crate) fn with_last_insert_id(mut self, id: i64) -> Self {
        self.last_insert_id = Some(id);
        self
    }

    /// Rows changed by the statement, or rows returned for queries.
    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }

    /// Rowid of the last insert. SQLite only; use `RETURNING id` portably.
    pub fn last_insert_id(&self) -> Option<i64> {
        self.last_insert_id
    }

    pub fn fetch_one(&mut self) -> Option<Row> {
        self.rows.pop_front()
    }

    pub fn fetch_all(self) -> Vec<Row> {
        self.rows.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, Value)]) -> Row {
        let columns: Arc<[String]> = pairs.iter().map(|(c, _)| c.to_string()).collect();
        Row::new(columns, pairs.iter().map(|(_, v)| v.clone()).collect())
    }

    #[test]
    fn test_row_get_by_name() {
        let r = row(&[
            ("id", Value::Integer(7)),
            ("title", Value::Text("Heat".to_string())),
            ("video_link", Value::Null),
        ]);
        assert_eq!(r.get::<i64>("id").unwrap(), 7);
        assert_eq!(r.get::<String>("title").unwrap(), "Heat");
        assert_eq!(r.get::<Option<String>>("video_link").unwrap(), None);
        assert_eq!(r.get::<String>("TITLE").unwrap(), "Heat");
    }

    #[test]
    fn test_row_missing_column() {
        let r = row(&[("id", Value::Integer(1))]);
        assert!(matches!(
            r.get::<i64>("nickname"),
            Err(DbError::MissingColumn(c)) if c == "nickname"
        ));
    }

    #[test]
    fn test_row_decode_error_on_null_for_required() {
        let r = row(&[("title", Value::Null)]);
        assert!(matches!(r.get::<String>("title"), Err(DbError::Decode { .. })));
    }

    #[test]
    fn test_bool_from_integer_and_native() {
        let r = row(&[
            ("sqlite_flag", Value::Integer(1)),
            ("pg_flag", Value::Bool(false)),
        ]);
        assert!(r.get::<bool>("sqlite_flag").unwrap());
        assert!(!r.get::<bool>("pg_flag").unwrap());
    }

    #[test]
    fn test_value_from_option() {
        assert_eq!(Value::from(None::<String>), Value::Null);
        assert_eq!(Value::from(Some("x")), Value::Text("x".to_string()));
    }

    #[test]
    fn test_db_params_macro() {
        let params = db_params![1_i64, "two", Some(3.0_f64), None::<String>];
        assert_eq!(params.len(), 4);
        assert_eq!(params[3], Value::Null);
        assert!(db_params![].is_empty());
    }

    #[test]
    fn test_cursor_fetch() {
        let mut cursor = Cursor::new(
            vec![row(&[("n", Value::Integer(1))]), row(&[("n", Value::Integer(2))])],
            2,
        );
        assert_eq!(cursor.rows_affected(), 2);
        assert_eq!(cursor.fetch_one().unwrap().get::<i64>("n").unwrap(), 1);
        let rest = cursor.fetch_all();
        assert_eq!(rest.len(), 1);
    }
}
