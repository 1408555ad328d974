use async_trait::async_trait;
use serde_json::Value;

use crate::{
    db::{QueryExecutor, Row},
    errors::DiagramError,
    models::{config::SqlDialect, schema::Schema},
};

pub mod mysql;
pub mod sqlite;

pub use mysql::MySqlDialect;
pub use sqlite::SqliteDialect;

/// Builds a [`Schema`] by running the dialect's introspection statements
/// through the supplied executor. Executor errors are returned unchanged.
#[async_trait]
pub trait DialectAdapter: Send + Sync {
    async fn introspect(&self, executor: &dyn QueryExecutor) -> Result<Schema, DiagramError>;
}

pub fn adapter_for(dialect: SqlDialect) -> Box<dyn DialectAdapter> {
    match dialect {
        SqlDialect::Sqlite => Box::new(SqliteDialect),
        SqlDialect::MySql => Box::new(MySqlDialect),
    }
}

fn lookup<'a>(row: &'a Row, key: &str) -> Option<&'a Value> {
    row.get(key).or_else(|| {
        row.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    })
}

fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Text value of `key`; empty for missing or NULL values.
pub(crate) fn text(row: &Row, key: &str) -> String {
    lookup(row, key).map(value_text).unwrap_or_default()
}

/// Like [`text`] but a missing or empty value is an introspection error.
pub(crate) fn required_text(row: &Row, key: &str, label: &str) -> Result<String, DiagramError> {
    let value = text(row, key);
    if value.is_empty() {
        return Err(DiagramError::query(
            label,
            format!("result row has no '{}' value", key),
        ));
    }
    Ok(value)
}

pub(crate) fn integer(row: &Row, key: &str) -> Option<i64> {
    match lookup(row, key)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::Bool(b) => Some(i64::from(*b)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Accepts numbers, numeric strings, booleans and YES/TRUE strings.
pub(crate) fn flag(row: &Row, key: &str) -> bool {
    match lookup(row, key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => {
            let s = s.trim();
            s.eq_ignore_ascii_case("yes")
                || s.eq_ignore_ascii_case("true")
                || s.parse::<i64>().map(|n| n != 0).unwrap_or(false)
        }
        Some(_) => integer(row, key).map(|n| n != 0).unwrap_or(false),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_flag_accepts_driver_spellings() {
        let r = row(json!({"a": 1, "b": "1", "c": true, "d": "YES", "e": 0, "f": "NO", "g": null}));
        assert!(flag(&r, "a"));
        assert!(flag(&r, "b"));
        assert!(flag(&r, "c"));
        assert!(flag(&r, "d"));
        assert!(!flag(&r, "e"));
        assert!(!flag(&r, "f"));
        assert!(!flag(&r, "g"));
        assert!(!flag(&r, "missing"));
    }

    #[test]
    fn test_lookup_falls_back_to_case_insensitive_keys() {
        let r = row(json!({"COLUMN_NAME": "teacher_id", "Non_unique": "0"}));
        assert_eq!(text(&r, "column_name"), "teacher_id");
        assert_eq!(integer(&r, "non_unique"), Some(0));
    }

    #[test]
    fn test_required_text_reports_label() {
        let r = row(json!({"name": null}));
        match required_text(&r, "name", "List tables") {
            Err(DiagramError::Query { label, .. }) => assert_eq!(label, "List tables"),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
