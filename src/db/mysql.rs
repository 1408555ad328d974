use async_trait::async_trait;
use serde_json::Value;
use sqlx::{
    mysql::{MySqlPoolOptions, MySqlRow},
    MySqlPool, Row as _, ValueRef,
};

use crate::errors::DiagramError;

use super::{bind_params, rows_to_json, QueryExecutor, Row};

pub struct MySqlClient {
    pub pool: MySqlPool,
}

impl MySqlClient {
    pub async fn connect(database_url: &str) -> Result<Self, DiagramError> {
        let pool = MySqlPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(|e| DiagramError::Connection(e.to_string()))?;

        Ok(Self { pool })
    }
}

// information_schema and SHOW output mixes signed, unsigned and binary
// collated text columns depending on the server version.
fn decode_value(row: &MySqlRow, index: usize) -> Value {
    match row.try_get_raw(index) {
        Ok(raw) if !raw.is_null() => {}
        _ => return Value::Null,
    }

    if let Ok(val) = row.try_get::<i64, _>(index) {
        return Value::from(val);
    }
    if let Ok(val) = row.try_get::<u64, _>(index) {
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
impl QueryExecutor for MySqlClient {
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
