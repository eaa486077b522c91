//! SQLite driver backed by rusqlite.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{ffi, params_from_iter, ErrorCode, ToSql};

use super::{Cursor, DbError, Driver, Row, Value};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) struct SqliteDriver {
    conn: rusqlite::Connection,
}

impl SqliteDriver {
    /// Open the database file, creating its parent directory if needed.
    pub(crate) fn open(path: &Path) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| DbError::Connection(format!("{}: {}", parent.display(), e)))?;
            }
        }

        let conn = rusqlite::Connection::open(path)
            .map_err(|e| DbError::Connection(format!("{}: {}", path.display(), e)))?;
        conn.busy_timeout(BUSY_TIMEOUT).map_err(map_error)?;
        // WAL lets readers proceed while another connection writes.
        conn.query_row("PRAGMA journal_mode=WAL", [], |_| Ok(()))
            .map_err(map_error)?;

        Ok(Self { conn })
    }

    fn run_sync(&mut self, sql: &str, params: &[Value]) -> Result<Cursor, DbError> {
        let mut stmt = self.conn.prepare(sql).map_err(map_error)?;
        let columns: Arc<[String]> = stmt
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();

        if columns.is_empty() {
            let affected = stmt
                .execute(params_from_iter(params.iter()))
                .map_err(map_error)?;
            drop(stmt);
            let cursor = Cursor::new(Vec::new(), affected as u64);
            return Ok(if is_insert(sql) && affected > 0 {
                cursor.with_last_insert_id(self.conn.last_insert_rowid())
            } else {
                cursor
            });
        }

        let mut rows = stmt
            .query(params_from_iter(params.iter()))
            .map_err(map_error)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(map_error)? {
            let mut values = Vec::with_capacity(columns.len());
            for index in 0..columns.len() {
                values.push(from_sqlite(row.get_ref(index).map_err(map_error)?));
            }
            out.push(Row::new(Arc::clone(&columns), values));
        }

        let count = out.len() as u64;
        Ok(Cursor::new(out, count))
    }
}

#[async_trait]
impl Driver for SqliteDriver {
    async fn run(&mut self, sql: &str, params: &[Value]) -> Result<Cursor, DbError> {
        self.run_sync(sql, params)
    }

    async fn begin(&mut self) -> Result<(), DbError> {
        self.conn.execute_batch("BEGIN").map_err(map_error)
    }

    async fn begin_write(&mut self) -> Result<(), DbError> {
        self.conn.execute_batch("BEGIN IMMEDIATE").map_err(map_error)
    }

    async fn commit(&mut self) -> Result<(), DbError> {
        self.conn.execute_batch("COMMIT").map_err(map_error)
    }

    async fn rollback(&mut self) -> Result<(), DbError> {
        self.conn.execute_batch("ROLLBACK").map_err(map_error)
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(rusqlite::types::Value::Null),
            Value::Integer(i) => ToSqlOutput::Owned(rusqlite::types::Value::Integer(*i)),
            Value::Real(r) => ToSqlOutput::Owned(rusqlite::types::Value::Real(*r)),
            Value::Text(t) => ToSqlOutput::Borrowed(ValueRef::Text(t.as_bytes())),
            Value::Bool(b) => ToSqlOutput::Owned(rusqlite::types::Value::Integer(i64::from(*b))),
        })
    }
}

fn from_sqlite(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(r) => Value::Real(r),
        ValueRef::Text(t) | ValueRef::Blob(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
    }
}

fn is_insert(sql: &str) -> bool {
    sql.trim_start()
        .get(..6)
        .is_some_and(|kw| kw.eq_ignore_ascii_case("INSERT"))
}

fn map_error(err: rusqlite::Error) -> DbError {
    if let rusqlite::Error::SqliteFailure(code, message) = &err {
        if code.code == ErrorCode::ConstraintViolation
            && matches!(
                code.extended_code,
                ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY
            )
        {
            return DbError::UniqueViolation(
                message.clone().unwrap_or_else(|| err.to_string()),
            );
        }
    }
    DbError::Query(err.to_string())
}
