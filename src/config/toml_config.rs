use crate::core::pipeline::{PipelineOptions, DEFAULT_CONCURRENCY, MAX_CONCURRENCY};
use crate::core::shortener::{ShortenerConfig, DEFAULT_API_BASE, DEFAULT_API_VERSION, DEFAULT_METHOD};
use crate::core::table::{ColumnSelector, TableConfig, DEFAULT_OUTPUT_COLUMN};
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const ENV_ACCESS_TOKEN: &str = "VK_ACCESS_TOKEN";
pub const ENV_OUTPUT_COLUMN: &str = "NEW_COL_NAME";
pub const ENV_OUTPUT_FILE: &str = "OUTPUT_FILE_NAME";
pub const DEFAULT_OUTPUT_FILE: &str = "shortened.csv";

/// Serializes tests that read or write the override variables above.
#[cfg(test)]
pub(crate) static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub shortener: ShortenerSection,
    pub pipeline: PipelineSection,
    pub table: TableSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShortenerSection {
    pub api_base: String,
    pub method: String,
    pub access_token: String,
    pub api_version: String,
    pub private: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for ShortenerSection {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            method: DEFAULT_METHOD.to_string(),
            access_token: String::new(),
            api_version: DEFAULT_API_VERSION.to_string(),
            private: "0".to_string(),
            timeout_seconds: 10,
            max_retries: 0,
            retry_delay_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    pub concurrency: usize,
    pub grace_period_seconds: u64,
    pub deadline_seconds: Option<u64>,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            grace_period_seconds: 5,
            deadline_seconds: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TableSection {
    pub input_column: ColumnSelector,
    pub output_column_name: String,
    pub output_file_name: String,
}

impl Default for TableSection {
    fn default() -> Self {
        Self {
            input_column: ColumnSelector::default(),
            output_column_name: DEFAULT_OUTPUT_COLUMN.to_string(),
            output_file_name: DEFAULT_OUTPUT_FILE.to_string(),
        }
    }
}

impl AppConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EtlError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| EtlError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Defaults plus the `VK_ACCESS_TOKEN`, `NEW_COL_NAME` and `OUTPUT_FILE_NAME` variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// 環境變數覆寫已設定的值
    pub fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var(ENV_ACCESS_TOKEN) {
            self.shortener.access_token = token;
        }
        if let Ok(column) = std::env::var(ENV_OUTPUT_COLUMN) {
            self.table.output_column_name = column;
        }
        if let Ok(file) = std::env::var(ENV_OUTPUT_FILE) {
            self.table.output_file_name = file;
        }
    }

    /// 替換環境變數 (例如 ${VK_ACCESS_TOKEN})；未設定的變數保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| EtlError::ConfigError {
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn shortener_config(&self) -> ShortenerConfig {
        let s = &self.shortener;
        ShortenerConfig {
            api_base: s.api_base.clone(),
            method: s.method.clone(),
            access_token: s.access_token.clone(),
            api_version: s.api_version.clone(),
            private: s.private.clone(),
            timeout: Duration::from_secs(s.timeout_seconds),
            max_retries: s.max_retries,
            retry_delay: Duration::from_millis(s.retry_delay_ms),
        }
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            concurrency: self.pipeline.concurrency,
            grace_period: Duration::from_secs(self.pipeline.grace_period_seconds),
            deadline: self.pipeline.deadline_seconds.map(Duration::from_secs),
        }
    }

    pub fn table_config(&self) -> TableConfig {
        TableConfig {
            input_column: self.table.input_column.clone(),
            output_column_name: self.table.output_column_name.clone(),
        }
    }

    pub fn output_file_name(&self) -> &str {
        &self.table.output_file_name
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_url("shortener.api_base", &self.shortener.api_base)?;
        validation::validate_non_empty_string("shortener.method", &self.shortener.method)?;
        validation::validate_non_empty_string("shortener.access_token", &self.shortener.access_token)?;
        if self.shortener.access_token.starts_with("${") {
            return Err(EtlError::ConfigValidationError {
                field: "shortener.access_token".to_string(),
                message: format!(
                    "unresolved environment variable {}",
                    self.shortener.access_token
                ),
            });
        }
        validation::validate_range("shortener.timeout_seconds", self.shortener.timeout_seconds, 1, 300)?;
        validation::validate_range("shortener.max_retries", self.shortener.max_retries, 0, 10)?;

        validation::validate_range("pipeline.concurrency", self.pipeline.concurrency, 1, MAX_CONCURRENCY)?;
        if let Some(deadline) = self.pipeline.deadline_seconds {
            validation::validate_range("pipeline.deadline_seconds", deadline, 1, 86_400)?;
        }

        validation::validate_non_empty_string("table.output_column_name", &self.table.output_column_name)?;
        validation::validate_file_name("table.output_file_name", &self.table.output_file_name)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_full_config() {
        let toml_content = r#"
[shortener]
api_base = "http://localhost:8080/method"
access_token = "secret"
timeout_seconds = 3
max_retries = 2
retry_delay_ms = 100

[pipeline]
concurrency = 8
deadline_seconds = 60

[table]
input_column = "links"
output_column_name = "short"
output_file_name = "result.csv"
"#;

        let config = AppConfig::from_toml_str(toml_content).unwrap();
        assert!(config.validate().is_ok());

        let shortener = config.shortener_config();
        assert_eq!(shortener.method_url(), "http://localhost:8080/method/utils.getShortLink/");
        assert_eq!(shortener.api_version, "5.131");
        assert_eq!(shortener.timeout, Duration::from_secs(3));
        assert_eq!(shortener.max_retries, 2);

        let options = config.pipeline_options();
        assert_eq!(options.concurrency, 8);
        assert_eq!(options.deadline, Some(Duration::from_secs(60)));

        let table = config.table_config();
        assert_eq!(table.input_column, ColumnSelector::Name("links".to_string()));
        assert_eq!(table.output_column_name, "short");
        assert_eq!(config.output_file_name(), "result.csv");
    }

    #[test]
    fn test_defaults_and_index_selector() {
        let config = AppConfig::from_toml_str(
            r#"
[shortener]
access_token = "secret"

[table]
input_column = 2
"#,
        )
        .unwrap();

        assert_eq!(config.table.input_column, ColumnSelector::Index(2));
        assert_eq!(config.table.output_column_name, "short_url");
        assert_eq!(config.pipeline.concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(config.shortener.max_retries, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("SHORT_LINK_ETL_TEST_TOKEN", "from-env");

        let config = AppConfig::from_toml_str(
            r#"
[shortener]
access_token = "${SHORT_LINK_ETL_TEST_TOKEN}"
"#,
        )
        .unwrap();
        assert_eq!(config.shortener.access_token, "from-env");

        std::env::remove_var("SHORT_LINK_ETL_TEST_TOKEN");
    }

    #[test]
    fn test_from_env_maps_override_variables() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        std::env::set_var(ENV_ACCESS_TOKEN, "env-token");
        std::env::set_var(ENV_OUTPUT_COLUMN, "vk_link");
        std::env::set_var(ENV_OUTPUT_FILE, "from_env.csv");

        let config = AppConfig::from_env();

        std::env::remove_var(ENV_ACCESS_TOKEN);
        std::env::remove_var(ENV_OUTPUT_COLUMN);
        std::env::remove_var(ENV_OUTPUT_FILE);

        assert_eq!(config.shortener.access_token, "env-token");
        assert_eq!(config.table.output_column_name, "vk_link");
        assert_eq!(config.output_file_name(), "from_env.csv");
        assert_eq!(config.table_config().output_column_name, "vk_link");
        assert_eq!(config.pipeline.concurrency, DEFAULT_CONCURRENCY);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_env_without_variables_keeps_defaults() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        std::env::remove_var(ENV_ACCESS_TOKEN);
        std::env::remove_var(ENV_OUTPUT_COLUMN);
        std::env::remove_var(ENV_OUTPUT_FILE);

        let config = AppConfig::from_env();

        assert!(config.shortener.access_token.is_empty());
        assert_eq!(config.table.output_column_name, DEFAULT_OUTPUT_COLUMN);
        assert_eq!(config.output_file_name(), DEFAULT_OUTPUT_FILE);
    }

    #[test]
    fn test_unresolved_token_fails_validation() {
        let config = AppConfig::from_toml_str(
            r#"
[shortener]
access_token = "${SHORT_LINK_ETL_SURELY_UNSET}"
"#,
        )
        .unwrap();

        assert!(matches!(
            config.validate(),
            Err(EtlError::ConfigValidationError { .. })
        ));
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();
        assert!(matches!(
            config.validate(),
            Err(EtlError::MissingConfigError { .. })
        ));

        config.shortener.access_token = "secret".to_string();
        config.pipeline.concurrency = 0;
        assert!(config.validate().is_err());

        config.pipeline.concurrency = 4;
        config.shortener.api_base = "invalid-url".to_string();
        assert!(config.validate().is_err());

        config.shortener.api_base = DEFAULT_API_BASE.to_string();
        config.table.output_file_name = "../escape.csv".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            AppConfig::from_toml_str("[pipeline\nconcurrency = 1"),
            Err(EtlError::ConfigValidationError { .. })
        ));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[shortener]\naccess_token = \"file-token\"\n")
            .unwrap();

        let config = AppConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.shortener.access_token, "file-token");
    }
}
