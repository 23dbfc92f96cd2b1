use crate::domain::model::OutputRow;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("API client error: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    // 輸入表格錯誤：在任何外部呼叫之前中止
    #[error("Input column not found: {column}")]
    ColumnNotFound { column: String },

    #[error("Malformed input table: {message}")]
    MalformedTable { message: String },

    #[error("Output column '{name}' already exists in the input table")]
    ColumnAlreadyExists { name: String },

    #[error("Batch cancelled after {} of {total} rows completed", .completed.len())]
    Cancelled {
        completed: Vec<OutputRow>,
        total: usize,
    },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Cancellation,
    Configuration,
    Network,
    Io,
    Processing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Medium,
    High,
    Critical,
}

impl EtlError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::ColumnNotFound { .. }
            | EtlError::MalformedTable { .. }
            | EtlError::ColumnAlreadyExists { .. }
            | EtlError::CsvError(_) => ErrorCategory::Input,
            EtlError::Cancelled { .. } => ErrorCategory::Cancellation,
            EtlError::ConfigError { .. }
            | EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. } => ErrorCategory::Configuration,
            EtlError::ApiError(_) => ErrorCategory::Network,
            EtlError::IoError(_) => ErrorCategory::Io,
            EtlError::SerializationError(_) | EtlError::ProcessingError { .. } => {
                ErrorCategory::Processing
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Cancellation => ErrorSeverity::Medium,
            ErrorCategory::Input | ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Network | ErrorCategory::Processing => ErrorSeverity::High,
            ErrorCategory::Io => ErrorSeverity::Critical,
        }
    }

    /// True for errors that reject the whole invocation before any row was shortened.
    pub fn is_input_failure(&self) -> bool {
        self.category() == ErrorCategory::Input
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            EtlError::ColumnNotFound { column } => {
                format!("The input file has no column '{}'", column)
            }
            EtlError::MalformedTable { message } => {
                format!("The input file could not be read as a table: {}", message)
            }
            EtlError::ColumnAlreadyExists { name } => {
                format!("The input file already contains a '{}' column", name)
            }
            EtlError::Cancelled { completed, total } => format!(
                "Processing stopped early: {} of {} links were handled",
                completed.len(),
                total
            ),
            EtlError::MissingConfigError { field } => {
                format!("Missing required setting '{}'", field)
            }
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Input => "Check that the file is a CSV with a header row and the expected link column",
            ErrorCategory::Cancellation => "Raise the deadline or lower the number of rows per run",
            ErrorCategory::Configuration => "Review the configuration file and environment variables",
            ErrorCategory::Network => "Check network connectivity and the shortener endpoint",
            ErrorCategory::Io => "Check file permissions and available disk space",
            ErrorCategory::Processing => "Re-run with --verbose and report the log output",
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
