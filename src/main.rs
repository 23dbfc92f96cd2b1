use anyhow::Context;
use clap::Parser;
use short_link_etl::utils::error::ErrorSeverity;
use short_link_etl::utils::{logger, validation::Validate};
use short_link_etl::{
    CancellationSignal, CliConfig, EtlEngine, LocalStorage, RowTransformer, VkShortener,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    if cli.json_logs {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }
    tracing::info!("Starting short-link-etl");

    let config = match cli.validate().and_then(|_| cli.resolve()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("❌ Configuration validation failed: {}", e);
            tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(1);
        }
    };
    if cli.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    let shortener = VkShortener::new(config.shortener_config())
        .context("failed to build the shortener HTTP client")?;

    // 以輸入檔目錄為根；輸出路徑取絕對路徑，不受根目錄影響
    let storage = LocalStorage::new(cli.input_dir());
    let output_path = std::env::current_dir()
        .context("failed to resolve the working directory")?
        .join(&cli.output_dir)
        .join(config.output_file_name());

    let engine = EtlEngine::new(
        storage,
        RowTransformer::new(Arc::new(shortener)),
        config.table_config(),
        config.pipeline_options(),
    )
    .with_monitoring(cli.monitor);

    let cancel = CancellationSignal::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing in-flight requests");
            ctrl_c.cancel();
        }
    });

    let result = engine
        .run_with_cancellation(
            &cli.input_file_name(),
            &output_path.to_string_lossy(),
            &cancel,
        )
        .await;

    match result {
        Ok(report) if cli.json_report => {
            println!("{}", report.to_json()?);
        }
        Ok(report) => {
            println!("✅ Shortened {} of {} links", report.summary.succeeded, report.summary.total);
            println!("📁 Output saved to: {}", report.output_path);
        }
        Err(e) => {
            tracing::error!(
                "❌ Run failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());

            let exit_code = match e.severity() {
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            };
            std::process::exit(exit_code);
        }
    }

    Ok(())
}
