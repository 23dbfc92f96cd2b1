use crate::domain::model::{Column, InputRow, OutputRow, Table};
use crate::utils::error::{EtlError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_OUTPUT_COLUMN: &str = "short_url";

/// Which column holds the links: by position or by header name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnSelector {
    Index(usize),
    Name(String),
}

impl Default for ColumnSelector {
    fn default() -> Self {
        ColumnSelector::Index(0)
    }
}

impl fmt::Display for ColumnSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnSelector::Index(index) => write!(f, "#{}", index),
            ColumnSelector::Name(name) => write!(f, "{}", name),
        }
    }
}

impl From<&str> for ColumnSelector {
    /// 純數字視為索引，其他視為欄位名稱
    fn from(value: &str) -> Self {
        match value.trim().parse::<usize>() {
            Ok(index) => ColumnSelector::Index(index),
            Err(_) => ColumnSelector::Name(value.to_string()),
        }
    }
}

/// Reads the non-empty cells of one column, keeping their row positions.
pub fn extract_column(table: &Table, selector: &ColumnSelector) -> Result<Vec<InputRow>> {
    let column = match selector {
        ColumnSelector::Index(index) => table.column(*index),
        ColumnSelector::Name(name) => table.column_by_name(name),
    }
    .ok_or_else(|| EtlError::ColumnNotFound {
        column: selector.to_string(),
    })?;

    Ok(column
        .cells
        .iter()
        .enumerate()
        .filter_map(|(position, cell)| {
            let value = cell.trim();
            (!value.is_empty()).then(|| InputRow::new(position, value))
        })
        .collect())
}

/// Returns a copy of `table` with one extra column. Rows without an output, and rows whose
/// output is a failure, get an empty cell.
pub fn attach_column(table: &Table, column_name: &str, outputs: &[OutputRow]) -> Result<Table> {
    ensure_column_absent(table, column_name)?;

    let row_count = table.row_count();
    let mut cells = vec![String::new(); row_count];
    for output in outputs {
        let cell = cells
            .get_mut(output.position)
            .ok_or_else(|| EtlError::MalformedTable {
                message: format!(
                    "result for row {} is outside a table of {} rows",
                    output.position, row_count
                ),
            })?;
        if let Some(value) = &output.value {
            *cell = value.clone();
        }
    }

    let mut augmented = table.clone();
    augmented.push_column(Column::new(column_name, cells))?;
    Ok(augmented)
}

fn ensure_column_absent(table: &Table, column_name: &str) -> Result<()> {
    if table.column_by_name(column_name).is_some() {
        return Err(EtlError::ColumnAlreadyExists {
            name: column_name.to_string(),
        });
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableConfig {
    pub input_column: ColumnSelector,
    pub output_column_name: String,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            input_column: ColumnSelector::default(),
            output_column_name: DEFAULT_OUTPUT_COLUMN.to_string(),
        }
    }
}

/// Binds the column functions to one configured input column and output column name.
#[derive(Debug, Clone, Default)]
pub struct TableAdapter {
    config: TableConfig,
}

impl TableAdapter {
    pub fn new(config: TableConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    /// Rejects the table if `attach` would later fail on it, then returns the rows to shorten.
    pub fn prepare(&self, table: &Table) -> Result<Vec<InputRow>> {
        ensure_column_absent(table, &self.config.output_column_name)?;
        self.extract(table)
    }

    pub fn extract(&self, table: &Table) -> Result<Vec<InputRow>> {
        extract_column(table, &self.config.input_column)
    }

    pub fn attach(&self, table: &Table, outputs: &[OutputRow]) -> Result<Table> {
        attach_column(table, &self.config.output_column_name, outputs)
    }
}
