use crate::core::transformer::RowTransformer;
use crate::domain::model::{InputRow, OutputRow};
use crate::utils::error::{EtlError, Result};
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};

pub const DEFAULT_CONCURRENCY: usize = 4;
pub const MAX_CONCURRENCY: usize = 64;

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Number of workers, i.e. the upper bound on in-flight shortener calls.
    pub concurrency: usize,
    /// How long in-flight calls may keep running after cancellation.
    pub grace_period: Duration,
    /// Overall time budget for one run.
    pub deadline: Option<Duration>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            grace_period: Duration::from_secs(5),
            deadline: None,
        }
    }
}

impl PipelineOptions {
    pub fn sequential() -> Self {
        Self {
            concurrency: 1,
            ..Self::default()
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }
}

/// 取消訊號，可跨 worker 複製共用
#[derive(Debug, Clone)]
pub struct CancellationSignal {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl CancellationSignal {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once `cancel` has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        // the sender lives as long as `self`, so this only returns once cancelled
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    async fn cancelled_then(&self, grace: Duration) {
        self.cancelled().await;
        tokio::time::sleep(grace).await;
    }

    #[cfg(test)]
    fn listeners(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Aborts the task when dropped, including when the owning future is dropped mid-run.
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl Default for CancellationSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn from_outputs(outputs: &[OutputRow]) -> Self {
        let succeeded = outputs.iter().filter(|o| o.is_success()).count();
        Self {
            total: outputs.len(),
            succeeded,
            failed: outputs.len() - succeeded,
        }
    }
}

/// Drives the row transformer over every row with a bounded worker pool.
///
/// Output `i` always belongs to input `i`: workers report `(index, row)` pairs and the
/// collector writes them into a buffer sized up front, so completion order never leaks
/// into the result.
pub struct BatchPipeline {
    transformer: RowTransformer,
    options: PipelineOptions,
}

impl BatchPipeline {
    pub fn new(transformer: RowTransformer, options: PipelineOptions) -> Self {
        Self {
            transformer,
            options,
        }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub async fn run(&self, rows: Vec<InputRow>) -> Result<Vec<OutputRow>> {
        self.run_with_cancellation(rows, &CancellationSignal::new())
            .await
    }

    pub async fn run_with_cancellation(
        &self,
        rows: Vec<InputRow>,
        cancel: &CancellationSignal,
    ) -> Result<Vec<OutputRow>> {
        let total = rows.len();
        if total == 0 {
            return Ok(Vec::new());
        }

        // 內部訊號：外部取消或超過期限都會觸發
        let signal = CancellationSignal::new();
        if cancel.is_cancelled() {
            signal.cancel();
        }
        let _watchdog = {
            let outer = cancel.clone();
            let inner = signal.clone();
            let deadline = self.options.deadline;
            AbortOnDrop(tokio::spawn(async move {
                match deadline {
                    Some(deadline) => {
                        tokio::select! {
                            _ = outer.cancelled() => {}
                            _ = tokio::time::sleep(deadline) => {
                                tracing::warn!("Batch deadline of {:?} reached", deadline);
                            }
                        }
                    }
                    None => outer.cancelled().await,
                }
                inner.cancel();
            }))
        };

        let workers = self.options.concurrency.clamp(1, total);
        tracing::info!("Processing {} rows with {} worker(s)", total, workers);

        let rows: Arc<[InputRow]> = rows.into();
        let cursor = Arc::new(AtomicUsize::new(0));
        let (tx, mut rx) = mpsc::channel::<(usize, OutputRow)>(workers);
        let mut pool = JoinSet::new();

        for worker in 0..workers {
            let rows = Arc::clone(&rows);
            let cursor = Arc::clone(&cursor);
            let tx = tx.clone();
            let transformer = self.transformer.clone();
            let signal = signal.clone();
            let grace = self.options.grace_period;

            pool.spawn(async move {
                loop {
                    if signal.is_cancelled() {
                        break;
                    }
                    let index = cursor.fetch_add(1, Ordering::SeqCst);
                    let Some(row) = rows.get(index) else {
                        break;
                    };

                    let output = tokio::select! {
                        biased;
                        output = transformer.transform(row) => output,
                        _ = signal.cancelled_then(grace) => {
                            tracing::debug!(worker, row = row.position, "Abandoning in-flight row");
                            break;
                        }
                    };

                    if tx.send((index, output)).await.is_err() {
                        break;
                    }
                }
            });
        }
        drop(tx);

        let mut slots: Vec<Option<OutputRow>> = vec![None; total];
        while let Some((index, output)) = rx.recv().await {
            slots[index] = Some(output);
        }

        let mut panicked = None;
        while let Some(joined) = pool.join_next().await {
            if let Err(e) = joined {
                panicked.get_or_insert(e);
            }
        }

        if let Some(e) = panicked {
            return Err(EtlError::ProcessingError {
                message: format!("row worker failed: {}", e),
            });
        }

        if slots.iter().all(Option::is_some) {
            return Ok(slots.into_iter().flatten().collect());
        }

        let completed: Vec<OutputRow> = slots.into_iter().flatten().collect();
        tracing::warn!(
            "Batch cancelled: {} of {} rows completed",
            completed.len(),
            total
        );
        Err(EtlError::Cancelled { completed, total })
    }
}
