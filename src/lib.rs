pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use crate::config::CliConfig;

pub use crate::adapters::LocalStorage;
pub use crate::config::AppConfig;
pub use crate::core::{
    etl::{EtlEngine, EtlReport},
    pipeline::{BatchPipeline, BatchSummary, CancellationSignal, PipelineOptions},
    shortener::{ShortenerConfig, VkShortener},
    table::{attach_column, extract_column, ColumnSelector, TableAdapter, TableConfig},
    transformer::RowTransformer,
};
pub use crate::domain::model::{Column, InputRow, OutputRow, ShortenFailure, ShortenResult, Table};
pub use crate::domain::ports::{RowObserver, Shortener, Storage, TracingObserver};
pub use crate::utils::error::{EtlError, Result};
