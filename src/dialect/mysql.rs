use std::collections::HashSet;

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    db::QueryExecutor,
    errors::DiagramError,
    models::schema::{Column, ForeignKey, Schema, Table},
};

use super::{integer, required_text, text, value_text, DialectAdapter};

const LIST_FOREIGN_KEYS: &str = "SELECT\n `column_name` AS `column_name`,\n `constraint_name` AS `constraint_name`,\n `referenced_table_name` AS `referenced_table_name`,\n `referenced_column_name` AS `referenced_column_name`\nFROM `information_schema`.`key_column_usage`\nWHERE `table_schema` = DATABASE()\n AND `table_name` = ?\n AND `referenced_table_name` IS NOT NULL\nORDER BY `constraint_name`, `ordinal_position`";

pub struct MySqlDialect;

fn quote(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

impl MySqlDialect {
    async fn table(
        &self,
        executor: &dyn QueryExecutor,
        table_name: &str,
    ) -> Result<Table, DiagramError> {
        let label = format!("List columns in {}", table_name);
        let column_rows = executor
            .query(&format!("SHOW COLUMNS FROM {}", quote(table_name)), &[], &label)
            .await?;

        let index_rows = executor
            .query(
                &format!("SHOW INDEXES FROM {}", quote(table_name)),
                &[],
                &format!("List indexes in {}", table_name),
            )
            .await?;
        let unique: HashSet<String> = index_rows
            .iter()
            .filter(|row| integer(row, "Non_unique") == Some(0))
            .map(|row| text(row, "Column_name"))
            .filter(|name| !name.is_empty())
            .collect();

        let mut table = Table::new(table_name);
        for row in &column_rows {
            let name = required_text(row, "Field", &label)?;
            let is_unique = unique.contains(&name);
            table = table.with_column(Column::new(
                name,
                text(row, "Type"),
                !text(row, "Null").eq_ignore_ascii_case("NO"),
                text(row, "Key").eq_ignore_ascii_case("PRI"),
                is_unique,
            ));
        }

        let label = format!("List foreign keys in {}", table_name);
        let fk_rows = executor
            .query(LIST_FOREIGN_KEYS, &[Value::from(table_name)], &label)
            .await?;
        for row in &fk_rows {
            table = table.with_foreign_key(ForeignKey::new(
                required_text(row, "column_name", &label)?,
                required_text(row, "referenced_table_name", &label)?,
                text(row, "referenced_column_name"),
            ));
        }

        Ok(table)
    }
}

#[async_trait]
impl DialectAdapter for MySqlDialect {
    async fn introspect(&self, executor: &dyn QueryExecutor) -> Result<Schema, DiagramError> {
        let mut schema = Schema::new();

        // SHOW TABLES names its only column after the database.
        let table_rows = executor.query("SHOW TABLES", &[], "List tables").await?;
        for row in &table_rows {
            let table_name = row.values().next().map(value_text).unwrap_or_default();
            if table_name.is_empty() {
                return Err(DiagramError::query("List tables", "result row has no table name"));
            }
            schema.insert(self.table(executor, &table_name).await?);
        }

        log::debug!("Introspected {} MySQL table(s)", schema.len());
        Ok(schema)
    }
}
