use crate::domain::model::{InputRow, OutputRow, ShortenResult};
use crate::domain::ports::{RowObserver, Shortener, TracingObserver};
use std::sync::Arc;

/// Turns one input row into one output row. A failed call yields an empty value, never an error.
#[derive(Clone)]
pub struct RowTransformer {
    shortener: Arc<dyn Shortener>,
    observer: Arc<dyn RowObserver>,
}

impl RowTransformer {
    pub fn new(shortener: Arc<dyn Shortener>) -> Self {
        Self::with_observer(shortener, Arc::new(TracingObserver))
    }

    pub fn with_observer(shortener: Arc<dyn Shortener>, observer: Arc<dyn RowObserver>) -> Self {
        Self { shortener, observer }
    }

    pub async fn transform(&self, row: &InputRow) -> OutputRow {
        match self.shortener.shorten(&row.value).await {
            ShortenResult::Success { short_url } => {
                self.observer.on_success(row, &short_url);
                OutputRow::new(row.position, Some(short_url))
            }
            ShortenResult::Failure { reason } => {
                self.observer.on_failure(row, &reason);
                OutputRow::new(row.position, None)
            }
        }
    }
}
