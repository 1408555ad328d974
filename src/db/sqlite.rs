use async_trait::async_trait;
use serde_json::Value;
use sqlx::{
    sqlite::{SqlitePoolOptions, SqliteRow},
    Row as _, SqlitePool, ValueRef,
};

use crate::errors::DiagramError;

use super::{bind_params, rows_to_json, QueryExecutor, Row};

pub struct SqliteClient {
    pub pool: SqlitePool,
}

impl SqliteClient {
    pub async fn connect(database_url: &str) -> Result<Self, DiagramError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(|e| DiagramError::Connection(e.to_string()))?;

        Ok(Self { pool })
    }
}

fn decode_value(row: &SqliteRow, index: usize) -> Value {
    match row.try_get_raw(index) {
        Ok(raw) if !raw.is_null() => {}
        _ => return Value::Null,
    }

    if let Ok(val) = row.try_get::<i64, _>(index) {
        return Value::from(val);
    }
    if let Ok(val) = row.try_get::<f64, _>(index) {
        return serde_json::Number::from_f64(val)
            .map(Value::Number)
            .unwrap_or(Value::Null);
    }
    if let Ok(val) = row.try_get::<String, _>(index) {
        return Value::String(val);
    }
    match row.try_get::<Vec<u8>, _>(index) {
        Ok(val) => Value::String(String::from_utf8_lossy(&val).into_owned()),
        Err(_) => Value::Null,
    }
}

#[async_trait]
impl QueryExecutor for SqliteClient {
    async fn query(
        &self,
        sql: &str,
        params: &[Value],
        label: &str,
    ) -> Result<Vec<Row>, DiagramError> {
        log::trace!("{}: {}", label, sql);
        let rows = bind_params(sqlx::query(sql), params)
            .fetch_all(&self.pool)
            .await
            .map_err(DiagramError::Sqlx)?;

        Ok(rows_to_json(&rows, decode_value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_client() -> SqliteClient {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        SqliteClient { pool }
    }

    #[tokio::test]
    async fn test_query_converts_rows_to_json() {
        let client = memory_client().await;

        let rows = client
            .query(
                "SELECT 1 AS one, 'two' AS two, NULL AS three, 4.5 AS four",
                &[],
                "Echo",
            )
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["one"], 1);
        assert_eq!(rows[0]["two"], "two");
        assert_eq!(rows[0]["three"], Value::Null);
        assert_eq!(rows[0]["four"], 4.5);
    }

    #[tokio::test]
    async fn test_query_binds_positional_params() {
        let client = memory_client().await;

        let rows = client
            .query(
                "SELECT ? AS name, ? AS answer, ? AS ratio, ? AS missing, ? AS flag",
                &[
                    Value::from("teacher"),
                    Value::from(42),
                    Value::from(2.5),
                    Value::Null,
                    Value::from(true),
                ],
                "Echo",
            )
            .await
            .unwrap();

        assert_eq!(rows[0]["name"], "teacher");
        assert_eq!(rows[0]["answer"], 42);
        assert_eq!(rows[0]["ratio"], 2.5);
        assert_eq!(rows[0]["missing"], Value::Null);
        assert_eq!(rows[0]["flag"], 1);
    }

    #[tokio::test]
    async fn test_query_error_is_sqlx_error() {
        let client = memory_client().await;

        let result = client.query("SELECT * FROM missing", &[], "Echo").await;
        assert!(matches!(result, Err(DiagramError::Sqlx(_))));
    }
}
