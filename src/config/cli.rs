use crate::config::toml_config::{AppConfig, ENV_ACCESS_TOKEN};
use crate::core::table::ColumnSelector;
use crate::utils::error::Result;
use crate::utils::validation::{self, Validate};
use clap::Parser;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Parser)]
#[command(name = "short-link-etl")]
#[command(about = "Append a column of shortened links to a CSV file")]
pub struct CliConfig {
    /// CSV file whose column holds the links
    #[arg(long)]
    pub input: PathBuf,

    #[arg(long, default_value = "./output")]
    pub output_dir: PathBuf,

    /// TOML configuration file; flags below override it
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long, env = ENV_ACCESS_TOKEN, hide_env_values = true)]
    pub access_token: Option<String>,

    /// Column index or header name of the links
    #[arg(long)]
    pub column: Option<String>,

    /// Name of the appended column
    #[arg(long)]
    pub column_name: Option<String>,

    #[arg(long)]
    pub output_file: Option<String>,

    #[arg(long)]
    pub concurrency: Option<usize>,

    #[arg(long)]
    pub max_retries: Option<u32>,

    #[arg(long)]
    pub timeout_seconds: Option<u64>,

    #[arg(long)]
    pub deadline_seconds: Option<u64>,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log process memory and CPU per phase")]
    pub monitor: bool,

    /// Emit logs as JSON lines instead of compact text
    #[arg(long)]
    pub json_logs: bool,

    /// Print the run report as JSON on success
    #[arg(long)]
    pub json_report: bool,
}

impl CliConfig {
    /// 合併設定：檔案 (或預設值) 為底，環境變數其次，命令列參數優先
    pub fn resolve(&self) -> Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let mut config = AppConfig::from_file(path)?;
                config.apply_env_overrides();
                config
            }
            None => AppConfig::from_env(),
        };

        if let Some(token) = &self.access_token {
            config.shortener.access_token = token.clone();
        }
        if let Some(column) = &self.column {
            config.table.input_column = ColumnSelector::from(column.as_str());
        }
        if let Some(name) = &self.column_name {
            config.table.output_column_name = name.clone();
        }
        if let Some(file) = &self.output_file {
            config.table.output_file_name = file.clone();
        }
        if let Some(concurrency) = self.concurrency {
            config.pipeline.concurrency = concurrency;
        }
        if let Some(retries) = self.max_retries {
            config.shortener.max_retries = retries;
        }
        if let Some(timeout) = self.timeout_seconds {
            config.shortener.timeout_seconds = timeout;
        }
        if let Some(deadline) = self.deadline_seconds {
            config.pipeline.deadline_seconds = Some(deadline);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn input_dir(&self) -> &Path {
        self.input.parent().unwrap_or_else(|| Path::new("."))
    }

    pub fn input_file_name(&self) -> String {
        self.input
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_file_extension("input", &self.input.to_string_lossy(), &["csv"])?;
        validation::validate_file_name("input", &self.input_file_name())
    }
}
