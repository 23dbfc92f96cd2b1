use crate::domain::model::{InputRow, ShortenFailure, ShortenResult};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// A single outbound call to a link shortening service.
///
/// Implementations never return an error: every problem is folded into
/// [`ShortenResult::Failure`].
#[async_trait]
pub trait Shortener: Send + Sync {
    async fn shorten(&self, url: &str) -> ShortenResult;
}

/// Observability hook for per-row outcomes.
pub trait RowObserver: Send + Sync {
    fn on_failure(&self, row: &InputRow, reason: &ShortenFailure);

    fn on_success(&self, _row: &InputRow, _short_url: &str) {}
}

/// Default observer: one `warn` line per failed link.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl RowObserver for TracingObserver {
    fn on_failure(&self, row: &InputRow, reason: &ShortenFailure) {
        tracing::warn!(
            row = row.position,
            "Failed to shorten link: {} ({})",
            row.value,
            reason
        );
    }

    fn on_success(&self, row: &InputRow, short_url: &str) {
        tracing::debug!(row = row.position, "{} -> {}", row.value, short_url);
    }
}
