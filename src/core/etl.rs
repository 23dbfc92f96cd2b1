use crate::adapters::csv_table::{read_table, write_table};
use crate::core::pipeline::{BatchPipeline, BatchSummary, CancellationSignal, PipelineOptions};
use crate::core::table::{TableAdapter, TableConfig};
use crate::core::transformer::RowTransformer;
use crate::domain::model::Table;
use crate::domain::ports::Storage;
use crate::utils::error::Result;
use crate::utils::monitor::RunMonitor;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Outcome of one completed invocation.
#[derive(Debug, Clone, Serialize)]
pub struct EtlReport {
    pub table_rows: usize,
    pub summary: BatchSummary,
    pub output_path: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl EtlReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// 讀取表格 → 擷取欄位 → 批次縮短 → 加上新欄位 → 寫回
pub struct EtlEngine<S: Storage> {
    storage: S,
    adapter: TableAdapter,
    pipeline: BatchPipeline,
    monitor_enabled: bool,
}

impl<S: Storage> EtlEngine<S> {
    pub fn new(
        storage: S,
        transformer: RowTransformer,
        table_config: TableConfig,
        options: PipelineOptions,
    ) -> Self {
        Self {
            storage,
            adapter: TableAdapter::new(table_config),
            pipeline: BatchPipeline::new(transformer, options),
            monitor_enabled: false,
        }
    }

    pub fn with_monitoring(mut self, enabled: bool) -> Self {
        self.monitor_enabled = enabled;
        self
    }

    /// In-memory entry point: the caller owns reading and writing the table.
    pub async fn process_table(
        &self,
        table: &Table,
        cancel: &CancellationSignal,
    ) -> Result<(Table, BatchSummary)> {
        let rows = self.adapter.prepare(table)?;
        tracing::info!(
            "Extracted {} links from {} rows",
            rows.len(),
            table.row_count()
        );

        let outputs = self.pipeline.run_with_cancellation(rows, cancel).await?;
        let summary = BatchSummary::from_outputs(&outputs);
        let augmented = self.adapter.attach(table, &outputs)?;

        Ok((augmented, summary))
    }

    pub async fn run(&self, input_path: &str, output_path: &str) -> Result<EtlReport> {
        self.run_with_cancellation(input_path, output_path, &CancellationSignal::new())
            .await
    }

    pub async fn run_with_cancellation(
        &self,
        input_path: &str,
        output_path: &str,
        cancel: &CancellationSignal,
    ) -> Result<EtlReport> {
        let started_at = Utc::now();
        let mut monitor = RunMonitor::new(self.monitor_enabled);
        tracing::info!("🚀 Starting link shortening for {}", input_path);

        let data = self.storage.read_file(input_path).await?;
        let table = read_table(&data)?;
        monitor.phase_done("load");

        let (augmented, summary) = self.process_table(&table, cancel).await?;
        monitor.phase_done("shorten");
        tracing::info!(
            "Shortened {} of {} links ({} failed)",
            summary.succeeded,
            summary.total,
            summary.failed
        );

        let bytes = write_table(&augmented)?;
        self.storage.write_file(output_path, &bytes).await?;
        monitor.phase_done("store");
        monitor.log_final_stats();
        tracing::info!("✅ Output saved to: {}", output_path);

        Ok(EtlReport {
            table_rows: augmented.row_count(),
            summary,
            output_path: output_path.to_string(),
            started_at,
            finished_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::table::ColumnSelector;
    use crate::domain::model::{ShortenFailure, ShortenResult};
    use crate::domain::ports::Shortener;
    use crate::utils::error::EtlError;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Clone)]
    struct MockStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl MockStorage {
        fn with_file(path: &str, data: &str) -> Self {
            let mut files = HashMap::new();
            files.insert(path.to_string(), data.as_bytes().to_vec());
            Self {
                files: Arc::new(Mutex::new(files)),
            }
        }

        async fn get_file(&self, path: &str) -> Option<String> {
            let files = self.files.lock().await;
            files
                .get(path)
                .map(|data| String::from_utf8_lossy(data).into_owned())
        }
    }

    impl Storage for MockStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned().ok_or_else(|| {
                EtlError::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("File not found: {}", path),
                ))
            })
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            let mut files = self.files.lock().await;
            files.insert(path.to_string(), data.to_vec());
            Ok(())
        }
    }

    struct MapShortener {
        answers: HashMap<&'static str, &'static str>,
        calls: AtomicUsize,
    }

    impl MapShortener {
        fn new(answers: &[(&'static str, &'static str)]) -> Arc<Self> {
            Arc::new(Self {
                answers: answers.iter().copied().collect(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait::async_trait]
    impl Shortener for MapShortener {
        async fn shorten(&self, url: &str) -> ShortenResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.answers.get(url) {
                Some(short) => ShortenResult::success(*short),
                None => ShortenResult::failure(ShortenFailure::Status(502)),
            }
        }
    }

    fn engine(storage: MockStorage, shortener: Arc<MapShortener>, config: TableConfig) -> EtlEngine<MockStorage> {
        EtlEngine::new(
            storage,
            RowTransformer::new(shortener),
            config,
            PipelineOptions::default(),
        )
    }

    #[tokio::test]
    async fn test_run_appends_column_with_failures_left_empty() {
        let storage = MockStorage::with_file(
            "in.csv",
            "link,owner\nhttp://a.com,ann\n,bob\nhttp://b.com,cat\n",
        );
        let shortener = MapShortener::new(&[("http://a.com", "short/a")]);
        let engine = engine(storage.clone(), shortener.clone(), TableConfig::default());

        let report = engine.run("in.csv", "out.csv").await.unwrap();

        assert_eq!(report.table_rows, 3);
        assert_eq!(
            report.summary,
            BatchSummary {
                total: 2,
                succeeded: 1,
                failed: 1
            }
        );
        assert_eq!(shortener.calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            storage.get_file("out.csv").await.unwrap(),
            "link,owner,short_url\nhttp://a.com,ann,short/a\n,bob,\nhttp://b.com,cat,\n"
        );
    }

    #[tokio::test]
    async fn test_report_serializes_to_json() {
        let storage = MockStorage::with_file("in.csv", "link\nhttp://a.com\n\nhttp://b.com\n");
        let shortener = MapShortener::new(&[("http://a.com", "short/a")]);
        let engine = engine(storage, shortener, TableConfig::default());

        let report = engine.run("in.csv", "out.csv").await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();

        assert_eq!(json["table_rows"], 3);
        assert_eq!(json["summary"]["total"], 2);
        assert_eq!(json["summary"]["succeeded"], 1);
        assert_eq!(json["output_path"], "out.csv");
        assert!(json["started_at"].is_string());
    }

    #[tokio::test]
    async fn test_missing_column_fails_before_any_call() {
        let storage = MockStorage::with_file("in.csv", "link\nhttp://a.com\n");
        let shortener = MapShortener::new(&[("http://a.com", "short/a")]);
        let config = TableConfig {
            input_column: ColumnSelector::Name("url".to_string()),
            ..TableConfig::default()
        };
        let engine = engine(storage.clone(), shortener.clone(), config);

        let result = engine.run("in.csv", "out.csv").await;

        assert!(matches!(result, Err(EtlError::ColumnNotFound { .. })));
        assert_eq!(shortener.calls.load(Ordering::SeqCst), 0);
        assert!(storage.get_file("out.csv").await.is_none());
    }

    #[tokio::test]
    async fn test_existing_output_column_fails_before_any_call() {
        let storage = MockStorage::with_file("in.csv", "link,short_url\nhttp://a.com,x\n");
        let shortener = MapShortener::new(&[]);
        let engine = engine(storage, shortener.clone(), TableConfig::default());

        let result = engine.run("in.csv", "out.csv").await;

        assert!(matches!(result, Err(EtlError::ColumnAlreadyExists { .. })));
        assert_eq!(shortener.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancelled_run_writes_nothing() {
        let storage = MockStorage::with_file("in.csv", "link\nhttp://a.com\n");
        let shortener = MapShortener::new(&[("http://a.com", "short/a")]);
        let engine = engine(storage.clone(), shortener, TableConfig::default());
        let cancel = CancellationSignal::new();
        cancel.cancel();

        let result = engine
            .run_with_cancellation("in.csv", "out.csv", &cancel)
            .await;

        assert!(matches!(result, Err(EtlError::Cancelled { total: 1, .. })));
        assert!(storage.get_file("out.csv").await.is_none());
    }
}
