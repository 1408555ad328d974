use std::{
    sync::Mutex,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use sqlx::{query::Query, Column as _, Database, Encode, Type};

use crate::{errors::DiagramError, models::config::SqlDialect};

pub mod mysql;
pub mod sqlite;

/// One result row, column name to scalar value.
pub type Row = serde_json::Map<String, Value>;

/// Boundary into the database layer. Every introspection statement goes
/// through here, with a human readable label for diagnostics.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn query(&self, sql: &str, params: &[Value], label: &str)
        -> Result<Vec<Row>, DiagramError>;
}

#[async_trait]
impl<T: QueryExecutor + ?Sized> QueryExecutor for Box<T> {
    async fn query(
        &self,
        sql: &str,
        params: &[Value],
        label: &str,
    ) -> Result<Vec<Row>, DiagramError> {
        (**self).query(sql, params, label).await
    }
}

/// Adapts a plain closure into a [`QueryExecutor`].
pub struct FnExecutor<F> {
    f: F,
}

impl<F> FnExecutor<F>
where
    F: Fn(&str, &[Value], &str) -> Result<Vec<Row>, DiagramError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> QueryExecutor for FnExecutor<F>
where
    F: Fn(&str, &[Value], &str) -> Result<Vec<Row>, DiagramError> + Send + Sync,
{
    async fn query(
        &self,
        sql: &str,
        params: &[Value],
        label: &str,
    ) -> Result<Vec<Row>, DiagramError> {
        (self.f)(sql, params, label)
    }
}

/// An executed statement as seen by [`RecordingExecutor`].
#[derive(Debug, Clone, Serialize)]
pub struct QueryRecord {
    pub label: String,
    pub sql: String,
    pub params: Vec<Value>,
    pub row_count: usize,
    pub duration: Duration,
}

/// Wraps an executor, logging and recording every statement it runs.
pub struct RecordingExecutor<E> {
    inner: E,
    records: Mutex<Vec<QueryRecord>>,
}

impl<E: QueryExecutor> RecordingExecutor<E> {
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            records: Mutex::new(Vec::new()),
        }
    }

    pub fn records(&self) -> Vec<QueryRecord> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl<E: QueryExecutor> QueryExecutor for RecordingExecutor<E> {
    async fn query(
        &self,
        sql: &str,
        params: &[Value],
        label: &str,
    ) -> Result<Vec<Row>, DiagramError> {
        let started = Instant::now();
        let result = self.inner.query(sql, params, label).await;
        let duration = started.elapsed();

        match &result {
            Ok(rows) => {
                log::debug!("{}: {} row(s) in {:?}", label, rows.len(), duration);
                self.records
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .push(QueryRecord {
                        label: label.to_string(),
                        sql: sql.to_string(),
                        params: params.to_vec(),
                        row_count: rows.len(),
                        duration,
                    });
            }
            Err(e) => log::debug!("{} failed after {:?}: {}", label, duration, e),
        }

        result
    }
}

/// Binds JSON parameters positionally onto a sqlx query.
pub(crate) fn bind_params<'q, DB>(
    mut query: Query<'q, DB, <DB as Database>::Arguments<'q>>,
    params: &[Value],
) -> Query<'q, DB, <DB as Database>::Arguments<'q>>
where
    DB: Database,
    bool: Encode<'q, DB> + Type<DB>,
    i64: Encode<'q, DB> + Type<DB>,
    Option<f64>: Encode<'q, DB> + Type<DB>,
    String: Encode<'q, DB> + Type<DB>,
    Option<String>: Encode<'q, DB> + Type<DB>,
{
    for param in params {
        query = match param {
            Value::Null => query.bind(None::<String>),
            Value::Bool(b) => query.bind(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => query.bind(i),
                None => query.bind(n.as_f64()),
            },
            Value::String(s) => query.bind(s.clone()),
            other => query.bind(other.to_string()),
        };
    }
    query
}

/// Converts fetched rows into JSON objects keyed by column name.
pub(crate) fn rows_to_json<R, F>(rows: &[R], decode: F) -> Vec<Row>
where
    R: sqlx::Row,
    F: Fn(&R, usize) -> Value,
{
    rows.iter()
        .map(|row| {
            row.columns()
                .iter()
                .enumerate()
                .map(|(i, column)| (column.name().to_string(), decode(row, i)))
                .collect::<Row>()
        })
        .collect()
}

/// Opens a pool for `database_url`, inferring the dialect from its scheme.
pub async fn connect(
    database_url: &str,
) -> Result<(SqlDialect, Box<dyn QueryExecutor>), DiagramError> {
    let scheme = database_url
        .split_once(':')
        .map(|(scheme, _)| scheme.to_ascii_lowercase())
        .unwrap_or_default();

    match scheme.as_str() {
        "sqlite" => {
            let client: Box<dyn QueryExecutor> =
                Box::new(sqlite::SqliteClient::connect(database_url).await?);
            Ok((SqlDialect::Sqlite, client))
        }
        "mysql" | "mariadb" => {
            let client: Box<dyn QueryExecutor> =
                Box::new(mysql::MySqlClient::connect(database_url).await?);
            Ok((SqlDialect::MySql, client))
        }
        _ => Err(DiagramError::Connection(format!(
            "Unsupported database url '{}', expected sqlite: or mysql:",
            database_url
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::{mock, predicate};
    use serde_json::json;

    mock! {
        pub Executor {}

        #[async_trait]
        impl QueryExecutor for Executor {
            async fn query(&self, sql: &str, params: &[Value], label: &str)
                -> Result<Vec<Row>, DiagramError>;
        }
    }

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_fn_executor_forwards_arguments() {
        let executor = FnExecutor::new(|sql: &str, params: &[Value], label: &str| {
            assert_eq!(sql, "SELECT 1");
            assert_eq!(params, &[json!("users")]);
            assert_eq!(label, "Echo");
            Ok(vec![row(json!({"one": 1}))])
        });

        let rows = executor
            .query("SELECT 1", &[json!("users")], "Echo")
            .await
            .unwrap();
        assert_eq!(rows[0]["one"], 1);
    }

    #[tokio::test]
    async fn test_recording_executor_records_queries() {
        let mut mock = MockExecutor::new();
        mock.expect_query()
            .with(
                predicate::eq("PRAGMA table_info([users])"),
                predicate::always(),
                predicate::eq("List columns in users"),
            )
            .times(1)
            .returning(|_, _, _| Ok(vec![row(json!({"name": "id"})), row(json!({"name": "email"}))]));

        let executor = RecordingExecutor::new(mock);
        executor
            .query("PRAGMA table_info([users])", &[], "List columns in users")
            .await
            .unwrap();

        let records = executor.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].label, "List columns in users");
        assert_eq!(records[0].row_count, 2);
    }

    #[tokio::test]
    async fn test_recording_executor_propagates_errors() {
        let mut mock = MockExecutor::new();
        mock.expect_query()
            .returning(|_, _, label| Err(DiagramError::query(label, "no such table")));

        let executor = RecordingExecutor::new(mock);
        let result = executor.query("SHOW TABLES", &[], "List tables").await;

        assert!(matches!(result, Err(DiagramError::Query { .. })));
        assert!(executor.records().is_empty());
    }

    #[tokio::test]
    async fn test_connect_rejects_unknown_scheme() {
        let result = connect("postgres://localhost/school").await;
        assert!(matches!(result, Err(DiagramError::Connection(_))));
    }
}
