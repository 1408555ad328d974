use std::collections::HashSet;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::{
    db::QueryExecutor,
    errors::DiagramError,
    models::schema::{Column, ForeignKey, Schema, Table},
};

use super::{flag, integer, required_text, text, DialectAdapter};

// `sqlite_` is reserved for internal tables (sqlite_sequence, sqlite_stat1...).
// The underscore is escaped so it is not a LIKE wildcard.
const LIST_TABLES: &str = "SELECT [name]\nFROM sqlite_master\nWHERE type = 'table'\n AND [name] NOT LIKE 'sqlite\\_%' ESCAPE '\\'";

const LIST_INDEX_DDL: &str = "SELECT *\nFROM sqlite_master\nWHERE [type] = 'index' AND [tbl_name] = ? AND [sql] <> ''\nORDER BY name";

static UNIQUE_INDEX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*CREATE\s+UNIQUE\s+INDEX\b").unwrap());

pub struct SqliteDialect;

/// Quotes an identifier for use inside a PRAGMA argument.
fn quote(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Strips quoting and ordering/collation suffixes from one entry of an
/// index column list. Expressions yield `None`.
fn index_column_name(entry: &str) -> Option<String> {
    let entry = entry.trim();
    let (open, close) = match entry.chars().next()? {
        '[' => ('[', ']'),
        '"' => ('"', '"'),
        '`' => ('`', '`'),
        _ => {
            let name = entry.split_whitespace().next()?;
            return (!name.contains('(')).then(|| name.to_string());
        }
    };
    let rest = entry.strip_prefix(open)?;
    let end = rest.find(close)?;
    Some(rest[..end].to_string())
}

/// Column names of a `CREATE UNIQUE INDEX ... ON <table> (...)` statement.
/// Any other statement, or one that does not parse, yields nothing.
pub(crate) fn unique_index_columns(sql: &str, table_name: &str) -> Vec<String> {
    if !UNIQUE_INDEX_RE.is_match(sql) {
        return Vec::new();
    }

    let table = regex::escape(table_name);
    let pattern = format!(
        r#"(?is)\sON\s+(?:\[{t}\]|"{t}"|`{t}`|{t})\s*\(([^()]*(?:\([^()]*\)[^()]*)*)\)"#,
        t = table
    );
    let Ok(re) = Regex::new(&pattern) else {
        return Vec::new();
    };

    match re.captures(sql) {
        Some(caps) => caps[1].split(',').filter_map(index_column_name).collect(),
        None => {
            log::debug!("Skipping index on {} with unrecognised DDL: {}", table_name, sql);
            Vec::new()
        }
    }
}

impl SqliteDialect {
    async fn unique_columns(
        &self,
        executor: &dyn QueryExecutor,
        table_name: &str,
    ) -> Result<HashSet<String>, DiagramError> {
        let mut unique = HashSet::new();

        let ddl_rows = executor
            .query(
                LIST_INDEX_DDL,
                &[Value::from(table_name)],
                &format!("List index columns in {}", table_name),
            )
            .await?;
        for row in &ddl_rows {
            unique.extend(unique_index_columns(&text(row, "sql"), table_name));
        }

        // Inline UNIQUE constraints are backed by automatic indexes without DDL.
        let index_rows = executor
            .query(
                &format!("PRAGMA index_list({})", quote(table_name)),
                &[],
                &format!("List indexes in {}", table_name),
            )
            .await?;
        for row in &index_rows {
            if !flag(row, "unique") || text(row, "origin") != "u" {
                continue;
            }
            let index_name = text(row, "name");
            let info_rows = executor
                .query(
                    &format!("PRAGMA index_info({})", quote(&index_name)),
                    &[],
                    &format!("List columns in index {}", index_name),
                )
                .await?;
            unique.extend(
                info_rows
                    .iter()
                    .map(|info| text(info, "name"))
                    .filter(|name| !name.is_empty()),
            );
        }

        Ok(unique)
    }

    async fn table(
        &self,
        executor: &dyn QueryExecutor,
        table_name: &str,
    ) -> Result<Table, DiagramError> {
        let label = format!("List columns in {}", table_name);
        let column_rows = executor
            .query(
                &format!("PRAGMA table_info({})", quote(table_name)),
                &[],
                &label,
            )
            .await?;
        let unique = self.unique_columns(executor, table_name).await?;

        let mut table = Table::new(table_name);
        for row in &column_rows {
            let name = required_text(row, "name", &label)?;
            let is_unique = unique.contains(&name);
            table = table.with_column(Column::new(
                name,
                text(row, "type"),
                !flag(row, "notnull"),
                integer(row, "pk").unwrap_or(0) > 0,
                is_unique,
            ));
        }

        let label = format!("List foreign keys in {}", table_name);
        let fk_rows = executor
            .query(
                &format!("PRAGMA foreign_key_list({})", quote(table_name)),
                &[],
                &label,
            )
            .await?;
        for row in &fk_rows {
            table = table.with_foreign_key(ForeignKey::new(
                required_text(row, "from", &label)?,
                required_text(row, "table", &label)?,
                text(row, "to"),
            ));
        }

        Ok(table)
    }
}

#[async_trait]
impl DialectAdapter for SqliteDialect {
    async fn introspect(&self, executor: &dyn QueryExecutor) -> Result<Schema, DiagramError> {
        let mut schema = Schema::new();

        let table_rows = executor.query(LIST_TABLES, &[], "List tables").await?;
        for row in &table_rows {
            let table_name = required_text(row, "name", "List tables")?;
            schema.insert(self.table(executor, &table_name).await?);
        }

        log::debug!("Introspected {} SQLite table(s)", schema.len());
        Ok(schema)
    }
}
