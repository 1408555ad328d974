use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A single introspected table column.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Column {
    name: String,
    data_type: String,
    nullable: bool,
    primary_key: bool,
    unique: bool,
}

impl Column {
    pub fn new(
        name: impl Into<String>,
        data_type: impl Into<String>,
        nullable: bool,
        primary_key: bool,
        unique: bool,
    ) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable,
            primary_key,
            unique,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Column type as spelled by the source dialect.
    pub fn data_type(&self) -> &str {
        &self.data_type
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    /// True when the column belongs to a unique index.
    pub fn is_unique(&self) -> bool {
        self.unique
    }
}

/// Outgoing foreign key. The referenced table is resolved by name against
/// the [`Schema`] at generation time.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    column_name: String,
    foreign_table: String,
    foreign_column: String,
}

impl ForeignKey {
    pub fn new(
        column_name: impl Into<String>,
        foreign_table: impl Into<String>,
        foreign_column: impl Into<String>,
    ) -> Self {
        Self {
            column_name: column_name.into(),
            foreign_table: foreign_table.into(),
            foreign_column: foreign_column.into(),
        }
    }

    pub fn column_name(&self) -> &str {
        &self.column_name
    }

    pub fn foreign_table(&self) -> &str {
        &self.foreign_table
    }

    pub fn foreign_column(&self) -> &str {
        &self.foreign_column
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Table {
    name: String,
    /// Column name to column, in declaration order.
    columns: IndexMap<String, Column>,
    foreign_keys: Vec<ForeignKey>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: IndexMap::new(),
            foreign_keys: Vec::new(),
        }
    }

    /// Builder used by the dialect adapters. A column with an existing name
    /// replaces the previous one in place.
    pub fn with_column(mut self, column: Column) -> Self {
        self.columns.insert(column.name.clone(), column);
        self
    }

    pub fn with_foreign_key(mut self, foreign_key: ForeignKey) -> Self {
        self.foreign_keys.push(foreign_key);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> indexmap::map::Values<'_, String, Column> {
        self.columns.values()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    pub fn foreign_keys(&self) -> &[ForeignKey] {
        &self.foreign_keys
    }

    pub fn is_foreign_key_column(&self, name: &str) -> bool {
        self.foreign_keys.iter().any(|fk| fk.column_name == name)
    }
}

/// Every introspected table, in discovery order.
#[derive(Debug, Default, Clone)]
pub struct Schema {
    tables: IndexMap<String, Table>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a table, replacing (in place) any table with the same name.
    pub fn insert(&mut self, table: Table) {
        self.tables.insert(table.name.clone(), table);
    }

    pub fn get(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn iter(&self) -> indexmap::map::Values<'_, String, Table> {
        self.tables.values()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl<'a> IntoIterator for &'a Schema {
    type Item = &'a Table;
    type IntoIter = indexmap::map::Values<'a, String, Table>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl FromIterator<Table> for Schema {
    fn from_iter<I: IntoIterator<Item = Table>>(iter: I) -> Self {
        let mut schema = Schema::new();
        for table in iter {
            schema.insert(table);
        }
        schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_keeps_discovery_order() {
        let schema: Schema = ["teacher", "course", "person"]
            .into_iter()
            .map(Table::new)
            .collect();

        let names: Vec<&str> = schema.iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["teacher", "course", "person"]);
        assert!(schema.contains("course"));
        assert!(!schema.contains("student"));
    }

    #[test]
    fn test_schema_insert_replaces_in_place() {
        let mut schema = Schema::new();
        schema.insert(Table::new("a"));
        schema.insert(Table::new("b"));
        schema.insert(Table::new("a").with_column(Column::new("id", "INT", false, true, false)));

        assert_eq!(schema.len(), 2);
        assert_eq!(schema.iter().next().unwrap().columns().len(), 1);
    }

    #[test]
    fn test_table_columns_keep_declaration_order() {
        let table = Table::new("course")
            .with_column(Column::new("id", "INTEGER", false, true, false))
            .with_column(Column::new("teacher_id", "CHAR", false, false, false))
            .with_column(Column::new("id", "BIGINT", false, true, false))
            .with_foreign_key(ForeignKey::new("teacher_id", "teacher", "id"));

        let names: Vec<&str> = table.columns().map(|c| c.name()).collect();
        assert_eq!(names, vec!["id", "teacher_id"]);
        assert_eq!(table.column("id").unwrap().data_type(), "BIGINT");
        assert!(table.is_foreign_key_column("teacher_id"));
        assert!(!table.is_foreign_key_column("id"));
        assert_eq!(table.column("teacher_id").unwrap().data_type(), "CHAR");
    }
}
