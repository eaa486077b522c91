//! PostgreSQL driver backed by sqlx.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{Column, Connection as _, PgConnection, Postgres, Row as _, TypeInfo, ValueRef};

use super::{Cursor, DbError, Driver, Row, Value};

pub(crate) struct PostgresDriver {
    conn: PgConnection,
}

impl PostgresDriver {
    pub(crate) async fn open(url: &str) -> Result<Self, DbError> {
        let conn = PgConnection::connect(url)
            .await
            .map_err(|e| DbError::Connection(e.to_string()))?;
        Ok(Self { conn })
    }

    async fn simple(&mut self, statement: &str) -> Result<(), DbError> {
        sqlx::query(statement)
            .execute(&mut self.conn)
            .await
            .map(|_| ())
            .map_err(map_error)
    }
}

#[async_trait]
impl Driver for PostgresDriver {
    async fn run(&mut self, sql: &str, params: &[Value]) -> Result<Cursor, DbError> {
        let (sql, bound) = rewrite_placeholders(sql, params);
        let mut query = sqlx::query(&sql);
        for value in bound {
            query = bind(query, value);
        }

        if returns_rows(&sql) {
            let rows = query.fetch_all(&mut self.conn).await.map_err(map_error)?;
            let columns: Arc<[String]> = match rows.first() {
                Some(first) => first
                    .columns()
                    .iter()
                    .map(|c| c.name().to_string())
                    .collect(),
                None => Arc::from(Vec::new()),
            };
            let rows = rows
                .iter()
                .map(|row| decode_row(row, &columns))
                .collect::<Result<Vec<_>, _>>()?;
            let count = rows.len() as u64;
            Ok(Cursor::new(rows, count))
        } else {
            let result = query.execute(&mut self.conn).await.map_err(map_error)?;
            Ok(Cursor::new(Vec::new(), result.rows_affected()))
        }
    }

    async fn begin(&mut self) -> Result<(), DbError> {
        self.simple("BEGIN").await
    }

    async fn commit(&mut self) -> Result<(), DbError> {
        self.simple("COMMIT").await
    }

    async fn rollback(&mut self) -> Result<(), DbError> {
        self.simple("ROLLBACK").await
    }
}

/// Rewrite `?` placeholders to `$1..$n`.
///
/// This is a plain textual substitution: a `?` inside a string literal is
/// rewritten too. NULL parameters are inlined as `NULL` so the server infers
/// the column type instead of receiving an explicitly typed null.
pub(crate) fn rewrite_placeholders<'a>(sql: &str, params: &'a [Value]) -> (String, Vec<&'a Value>) {
    let mut out = String::with_capacity(sql.len() + params.len() * 2);
    let mut bound = Vec::with_capacity(params.len());
    let mut index = 0;

    for ch in sql.chars() {
        if ch != '?' {
            out.push(ch);
            continue;
        }
        match params.get(index) {
            Some(Value::Null) => out.push_str("NULL"),
            Some(value) => {
                bound.push(value);
                out.push('$');
                out.push_str(&bound.len().to_string());
            }
            None => out.push('?'),
        }
        index += 1;
    }

    (out, bound)
}

fn returns_rows(sql: &str) -> bool {
    let upper = sql.trim_start().to_ascii_uppercase();
    ["SELECT", "WITH", "VALUES", "SHOW"]
        .iter()
        .any(|kw| upper.starts_with(kw))
        || upper.contains("RETURNING")
}

fn bind<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &Value,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Integer(i) => query.bind(*i),
        Value::Real(r) => query.bind(*r),
        Value::Text(t) => query.bind(t.clone()),
        Value::Bool(b) => query.bind(*b),
    }
}

fn decode_row(row: &PgRow, columns: &Arc<[String]>) -> Result<Row, DbError> {
    let mut values = Vec::with_capacity(columns.len());
    for (index, column) in row.columns().iter().enumerate() {
        let is_null = row.try_get_raw(index).map_err(map_error)?.is_null();
        if is_null {
            values.push(Value::Null);
            continue;
        }
        let value = match column.type_info().name() {
            "BOOL" => Value::Bool(row.try_get(index).map_err(map_error)?),
            "INT2" => Value::Integer(i64::from(row.try_get::<i16, _>(index).map_err(map_error)?)),
            "INT4" => Value::Integer(i64::from(row.try_get::<i32, _>(index).map_err(map_error)?)),
            "INT8" => Value::Integer(row.try_get(index).map_err(map_error)?),
            "FLOAT4" => Value::Real(f64::from(row.try_get::<f32, _>(index).map_err(map_error)?)),
            "FLOAT8" => Value::Real(row.try_get(index).map_err(map_error)?),
            "TIMESTAMP" => Value::Text(
                row.try_get::<NaiveDateTime, _>(index)
                    .map_err(map_error)?
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string(),
            ),
            "TIMESTAMPTZ" => Value::Text(
                row.try_get::<DateTime<Utc>, _>(index)
                    .map_err(map_error)?
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string(),
            ),
            "DATE" => Value::Text(
                row.try_get::<NaiveDate, _>(index)
                    .map_err(map_error)?
                    .format("%Y-%m-%d")
                    .to_string(),
            ),
            _ => Value::Text(row.try_get(index).map_err(map_error)?),
        };
        values.push(value);
    }
    Ok(Row::new(Arc::clone(columns), values))
}

fn map_error(err: sqlx::Error) -> DbError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return DbError::UniqueViolation(db_err.message().to_string());
        }
    }
    DbError::Query(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewrite_placeholders_numbers_in_order() {
        let params = vec![Value::from("a@b.c"), Value::from(3_i64)];
        let (sql, bound) =
            rewrite_placeholders("SELECT * FROM users WHERE email = ? AND id = ?", &params);
        assert_eq!(sql, "SELECT * FROM users WHERE email = $1 AND id = $2");
        assert_eq!(bound.len(), 2);
    }

    #[test]
    fn test_rewrite_placeholders_inlines_null() {
        let params = vec![Value::from("Heat"), Value::Null, Value::from(1_i64)];
        let (sql, bound) = rewrite_placeholders(
            "UPDATE movies SET title = ?, video_link = ? WHERE id = ?",
            &params,
        );
        assert_eq!(sql, "UPDATE movies SET title = $1, video_link = NULL WHERE id = $2");
        assert_eq!(bound, vec![&Value::from("Heat"), &Value::from(1_i64)]);
    }

    #[test]
    fn test_rewrite_placeholders_is_textual() {
        let params = vec![Value::from(1_i64)];
        let (sql, _) = rewrite_placeholders("SELECT '?' FROM t WHERE id = ?", &params);
        assert_eq!(sql, "SELECT '$1' FROM t WHERE id = ?");
    }

    #[test]
    fn test_returns_rows() {
        assert!(returns_rows("  select 1"));
        assert!(returns_rows("INSERT INTO t (a) VALUES (1) RETURNING id"));
        assert!(!returns_rows("UPDATE t SET a = 1"));
        assert!(!returns_rows("DELETE FROM t"));
    }
}
