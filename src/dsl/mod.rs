use std::{fmt, str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{
    errors::DiagramError,
    models::schema::{Column, Schema, Table},
};

pub mod basic;

pub use basic::{BasicDslGenerator, Cardinality};

pub type TableFormatter = Arc<dyn Fn(&Table) -> String + Send + Sync>;
pub type ColumnFormatter = Arc<dyn Fn(&Column) -> String + Send + Sync>;

/// Renders a [`Schema`] as diagram DSL text.
pub trait DslGenerator: Send + Sync {
    fn generate(&self, schema: &Schema) -> Result<String, DiagramError>;
}

/// The table name as is.
pub fn default_table_format(table: &Table) -> String {
    table.name().to_string()
}

/// `+'id' INTEGER NOT NULL`: `+` marks a primary key, the type is
/// uppercased and `NOT NULL` is appended for non-nullable columns.
pub fn default_column_format(column: &Column) -> String {
    let mut out = String::new();
    if column.is_primary_key() {
        out.push('+');
    }
    out.push('\'');
    out.push_str(column.name());
    out.push('\'');
    if !column.data_type().is_empty() {
        out.push(' ');
        out.push_str(&column.data_type().to_uppercase());
    }
    if !column.is_nullable() {
        out.push_str(" NOT NULL");
    }
    out
}

/// Caller controlled rendering of table headers and column entries.
#[derive(Clone)]
pub struct Formatters {
    pub table: TableFormatter,
    pub column: ColumnFormatter,
}

impl Formatters {
    pub fn with_table<F>(mut self, f: F) -> Self
    where
        F: Fn(&Table) -> String + Send + Sync + 'static,
    {
        self.table = Arc::new(f);
        self
    }

    pub fn with_column<F>(mut self, f: F) -> Self
    where
        F: Fn(&Column) -> String + Send + Sync + 'static,
    {
        self.column = Arc::new(f);
        self
    }
}

impl Default for Formatters {
    fn default() -> Self {
        Self {
            table: Arc::new(default_table_format),
            column: Arc::new(default_column_format),
        }
    }
}

impl fmt::Debug for Formatters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Formatters").finish_non_exhaustive()
    }
}

/// Available DSL generators.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorKind {
    #[default]
    Basic,
}

impl GeneratorKind {
    pub fn build(&self, formatters: &Formatters) -> Box<dyn DslGenerator> {
        match self {
            GeneratorKind::Basic => Box::new(BasicDslGenerator::new(formatters)),
        }
    }
}

impl FromStr for GeneratorKind {
    type Err = DiagramError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(GeneratorKind::Basic),
            other => Err(DiagramError::Config(format!(
                "Unknown generator '{}', valid values are basic",
                other
            ))),
        }
    }
}
