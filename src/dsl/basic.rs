use std::collections::HashSet;

use crate::{
    errors::DiagramError,
    models::schema::{ForeignKey, Schema, Table},
};

use super::{ColumnFormatter, DslGenerator, Formatters, TableFormatter};

/// Multiplicity attached to a foreign key edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cardinality {
    /// Plain foreign key.
    #[default]
    ManyToOne,
    /// Nullable foreign key column.
    ManyToOptional,
    /// Unique foreign key column.
    OptionalToOne,
}

impl Cardinality {
    /// Evaluated against the referencing column. Unique wins over nullable.
    pub fn of(table: &Table, fk: &ForeignKey) -> Self {
        match table.column(fk.column_name()) {
            Some(column) if column.is_unique() => Cardinality::OptionalToOne,
            Some(column) if column.is_nullable() => Cardinality::ManyToOptional,
            _ => Cardinality::ManyToOne,
        }
    }

    pub fn as_yuml(self) -> &'static str {
        match self {
            Cardinality::ManyToOne => "0..*-1",
            Cardinality::ManyToOptional => "0..*-0..1",
            Cardinality::OptionalToOne => "0..1-1",
        }
    }
}

/// Depth-first yUML class diagram generator. Referenced tables are expanded
/// inline the first time they are reached and named only afterwards.
pub struct BasicDslGenerator {
    format_table: TableFormatter,
    format_column: ColumnFormatter,
}

impl BasicDslGenerator {
    pub fn new(formatters: &Formatters) -> Self {
        Self {
            format_table: formatters.table.clone(),
            format_column: formatters.column.clone(),
        }
    }

    fn record(&self, table: &Table) -> String {
        let mut columns = Vec::new();
        let mut fk_columns = Vec::new();
        for column in table.columns() {
            if table.is_foreign_key_column(column.name()) {
                fk_columns.push(format!("FK {}", (self.format_column)(column)));
            } else {
                columns.push((self.format_column)(column));
            }
        }

        let mut out = format!("[{}|{}", (self.format_table)(table), columns.join(";"));
        if !fk_columns.is_empty() {
            out.push('|');
            out.push_str(&fk_columns.join(";"));
        }
        out.push(']');
        out
    }

    fn table_dsl(
        &self,
        schema: &Schema,
        table: &Table,
        written: &mut HashSet<String>,
        eol: &str,
    ) -> Result<String, DiagramError> {
        written.insert(table.name().to_string());

        let table_label = (self.format_table)(table);
        let mut out = self.record(table);

        for fk in table.foreign_keys() {
            let target =
                schema
                    .get(fk.foreign_table())
                    .ok_or_else(|| DiagramError::UnknownTable {
                        table: table.name().to_string(),
                        referenced: fk.foreign_table().to_string(),
                    })?;

            let related = if written.contains(target.name()) {
                format!("[{}]", (self.format_table)(target))
            } else {
                self.table_dsl(schema, target, written, "")?
            };

            out.push_str(&format!(
                "\n[{}]{}{}",
                table_label,
                Cardinality::of(table, fk).as_yuml(),
                related
            ));
        }

        out.push_str(eol);
        Ok(out)
    }
}

/// Collapses the multi-line text into the single line the service expects.
fn flatten(text: &str) -> String {
    text.trim().replace('\n', ", ").replace(",,", ",")
}

impl DslGenerator for BasicDslGenerator {
    fn generate(&self, schema: &Schema) -> Result<String, DiagramError> {
        let mut written = HashSet::new();
        let mut dsl = String::new();

        for table in schema {
            if written.contains(table.name()) {
                continue;
            }
            dsl.push_str(&self.table_dsl(schema, table, &mut written, "\n")?);
        }

        Ok(flatten(&dsl))
    }
}
