use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const QUIET_FILTER: &str = "short_link_etl=info";
const VERBOSE_FILTER: &str = "short_link_etl=debug,info";

fn default_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose { VERBOSE_FILTER } else { QUIET_FILTER })
    })
}

/// Compact human-readable output for terminal runs. `RUST_LOG` wins over `verbose`.
pub fn init_cli_logger(verbose: bool) {
    let _ = tracing_subscriber::registry()
        .with(default_filter(verbose))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .try_init();
}

/// One JSON object per event, for log collectors.
pub fn init_json_logger(verbose: bool) {
    let _ = tracing_subscriber::registry()
        .with(default_filter(verbose))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .json()
                .with_current_span(false),
        )
        .try_init();
}
