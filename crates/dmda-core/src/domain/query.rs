use crate::{Column, ValidationError};

/// Table read when no other table is configured.
pub const DEFAULT_TABLE: &str = "holy-diver-297719.data_science_salaries.curated";

/// Query descriptor handed to a [`DataSource`](crate::DataSource).
///
/// Built once at startup and owned by the build coordinator; there is no
/// process-wide query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpec {
    table: String,
    columns: Vec<Column>,
}

impl QuerySpec {
    /// Validates a fully qualified `project.dataset.table` name and a column
    /// projection.
    pub fn new(table: impl Into<String>, columns: Vec<Column>) -> Result<Self, ValidationError> {
        let table = table.into();
        let table = table.trim();
        if table.is_empty() {
            return Err(ValidationError::EmptyTable);
        }
        if let Some(ch) = table
            .chars()
            .find(|ch| !(ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.')))
        {
            return Err(ValidationError::InvalidTableChar {
                value: table.to_owned(),
                ch,
            });
        }
        if columns.is_empty() {
            return Err(ValidationError::EmptyProjection);
        }

        let mut unique = Vec::with_capacity(columns.len());
        for column in columns {
            if !unique.contains(&column) {
                unique.push(column);
            }
        }

        Ok(Self {
            table: table.to_owned(),
            columns: unique,
        })
    }

    /// Selects every known column from `table`.
    pub fn all_columns(table: impl Into<String>) -> Result<Self, ValidationError> {
        Self::new(table, Column::ALL.to_vec())
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Renders the descriptor as a standard SQL statement.
    pub fn to_sql(&self) -> String {
        let projection = self
            .columns
            .iter()
            .map(|column| column.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        format!("SELECT {projection} FROM `{}`", self.table)
    }
}

impl Default for QuerySpec {
    fn default() -> Self {
        Self {
            table: String::from(DEFAULT_TABLE),
            columns: Column::ALL.to_vec(),
        }
    }
}
