use crate::utils::error::{EtlError, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One non-empty cell of the input column together with its row position in the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputRow {
    pub position: usize,
    pub value: String,
}

impl InputRow {
    pub fn new(position: usize, value: impl Into<String>) -> Self {
        Self {
            position,
            value: value.into(),
        }
    }
}

/// Result for one processed row. `value` is `None` when shortening failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRow {
    pub position: usize,
    pub value: Option<String>,
}

impl OutputRow {
    pub fn new(position: usize, value: Option<String>) -> Self {
        Self { position, value }
    }

    pub fn is_success(&self) -> bool {
        self.value.is_some()
    }
}

/// 單一列轉換失敗的原因，不會中止整個批次
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShortenFailure {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("malformed response payload: {0}")]
    MalformedPayload(String),

    #[error("response did not contain a short URL")]
    MissingShortUrl,

    #[error("service error {code}: {message}")]
    Service { code: i64, message: String },
}

impl ShortenFailure {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ShortenFailure::Transport(_) | ShortenFailure::Timeout => true,
            ShortenFailure::Status(status) => *status == 429 || *status >= 500,
            // 6: too many requests per second, 10: internal server error
            ShortenFailure::Service { code, .. } => matches!(code, 6 | 10),
            ShortenFailure::MalformedPayload(_) | ShortenFailure::MissingShortUrl => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShortenResult {
    Success { short_url: String },
    Failure { reason: ShortenFailure },
}

impl ShortenResult {
    pub fn success(short_url: impl Into<String>) -> Self {
        ShortenResult::Success {
            short_url: short_url.into(),
        }
    }

    pub fn failure(reason: ShortenFailure) -> Self {
        ShortenResult::Failure { reason }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ShortenResult::Success { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub cells: Vec<String>,
}

impl Column {
    pub fn new(name: impl Into<String>, cells: Vec<String>) -> Self {
        Self {
            name: name.into(),
            cells,
        }
    }
}

/// Ordered named columns whose cells are aligned by row index. An empty string is an empty cell.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "RawTable")]
pub struct Table {
    columns: Vec<Column>,
}

// 反序列化也必須經過 Table::new 的長度檢查
#[derive(Deserialize)]
struct RawTable {
    columns: Vec<Column>,
}

impl TryFrom<RawTable> for Table {
    type Error = EtlError;

    fn try_from(raw: RawTable) -> Result<Self> {
        Table::new(raw.columns)
    }
}

impl Table {
    /// Builds a table, rejecting columns of unequal length.
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        if let Some(first) = columns.first() {
            let expected = first.cells.len();
            if let Some(ragged) = columns.iter().find(|c| c.cells.len() != expected) {
                return Err(EtlError::MalformedTable {
                    message: format!(
                        "column '{}' has {} rows, expected {}",
                        ragged.name,
                        ragged.cells.len(),
                        expected
                    ),
                });
            }
        }
        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    pub fn column_by_name(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map(|c| c.cells.len()).unwrap_or(0)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub(crate) fn push_column(&mut self, column: Column) -> Result<()> {
        if !self.columns.is_empty() && column.cells.len() != self.row_count() {
            return Err(EtlError::MalformedTable {
                message: format!(
                    "new column '{}' has {} rows, table has {}",
                    column.name,
                    column.cells.len(),
                    self.row_count()
                ),
            });
        }
        self.columns.push(column);
        Ok(())
    }

    /// Cells of one row across all columns, in column order.
    pub fn row(&self, index: usize) -> Option<Vec<&str>> {
        if index >= self.row_count() {
            return None;
        }
        self.columns
            .iter()
            .map(|c| c.cells.get(index).map(String::as_str))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_table_rejects_ragged_columns() {
        let result = Table::new(vec![
            Column::new("link", cells(&["a", "b"])),
            Column::new("note", cells(&["x"])),
        ]);

        assert!(matches!(result, Err(EtlError::MalformedTable { .. })));
    }

    #[test]
    fn test_table_row_access() {
        let table = Table::new(vec![
            Column::new("link", cells(&["http://a.com", ""])),
            Column::new("note", cells(&["first", "second"])),
        ])
        .unwrap();

        assert_eq!(table.row_count(), 2);
        assert_eq!(table.row(1).unwrap(), vec!["", "second"]);
        assert!(table.row(2).is_none());
        assert_eq!(table.column_names(), vec!["link", "note"]);
    }

    #[test]
    fn test_deserialize_checks_column_lengths() {
        let even = r#"{"columns":[{"name":"link","cells":["a",""]},{"name":"note","cells":["x","y"]}]}"#;
        let table: Table = serde_json::from_str(even).unwrap();
        assert_eq!(table.row(1).unwrap(), vec!["", "y"]);

        let ragged = r#"{"columns":[{"name":"link","cells":["a","b"]},{"name":"note","cells":["x"]}]}"#;
        let err = serde_json::from_str::<Table>(ragged).unwrap_err();
        assert!(err.to_string().contains("column 'note' has 1 rows, expected 2"));
    }

    #[test]
    fn test_retryable_failures() {
        assert!(ShortenFailure::Timeout.is_retryable());
        assert!(ShortenFailure::Status(503).is_retryable());
        assert!(ShortenFailure::Status(429).is_retryable());
        assert!(!ShortenFailure::Status(404).is_retryable());
        assert!(!ShortenFailure::MissingShortUrl.is_retryable());
        assert!(ShortenFailure::Service {
            code: 6,
            message: "Too many requests per second".to_string()
        }
        .is_retryable());
        assert!(!ShortenFailure::Service {
            code: 100,
            message: "One of the parameters specified was missing or invalid".to_string()
        }
        .is_retryable());
    }
}
