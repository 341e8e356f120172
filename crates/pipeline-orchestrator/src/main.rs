use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use market_data_adapter::provider::HttpChartProvider;
use market_data_adapter::MarketDataAdapter;
use nightscreen_core::{NightscreenError, SentimentSource};
use notification_service::{NoopNotifier, NotificationConfig, NotificationService};
use sentiment_provider::feed::NullNewsFeed;
use sentiment_provider::SentimentEngine;
use stock_scanner::Universe;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod config;
mod orchestrator;

use config::RunConfig;
use orchestrator::Orchestrator;

/// Builds the `tracing` subscriber the same way the rest of the fleet does:
/// pretty-printed to stderr by default, JSON when `RUST_LOG_FORMAT=json`,
/// and always duplicated to `logs/overnight_pipeline.log` (spec.md §6's
/// filesystem layout) via a non-blocking appender. The returned guard must
/// stay alive for the process lifetime or buffered lines are dropped.
fn init_tracing(log_dir: &std::path::Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir).context("creating log directory")?;
    let file_appender = tracing_appender::rolling::never(log_dir, "overnight_pipeline.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(non_blocking);

    if json_logging {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer.json())
            .with(file_layer.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    }

    Ok(guard)
}

fn env_path(key: &str, default: &str) -> PathBuf {
    std::env::var(key).map(PathBuf::from).unwrap_or_else(|_| PathBuf::from(default))
}

fn build_adapter() -> Arc<MarketDataAdapter> {
    let primary_base = std::env::var("PRIMARY_PROVIDER_BASE_URL")
        .unwrap_or_else(|_| "https://query1.finance.example.com/v8/finance".to_string());
    let fallback_base = std::env::var("FALLBACK_PROVIDER_BASE_URL")
        .unwrap_or_else(|_| "https://fallback.market-data.example.com/v1".to_string());

    let primary = Arc::new(HttpChartProvider::new(primary_base));
    let fallback = Arc::new(HttpChartProvider::new(fallback_base));
    Arc::new(MarketDataAdapter::new(primary, fallback))
}

fn build_sentiment() -> Arc<dyn SentimentSource> {
    Arc::new(SentimentEngine::new(Arc::new(NullNewsFeed)))
}

fn build_notifier() -> Arc<dyn notification_service::ExternalNotifier> {
    let config = NotificationConfig::from_env();
    if config.smtp_host.is_some() || config.discord_webhook_url.is_some() {
        Arc::new(NotificationService::new(&config))
    } else {
        Arc::new(NoopNotifier)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let log_dir = env_path("LOG_DIR", "logs");
    let _tracing_guard = init_tracing(&log_dir).context("initializing tracing")?;

    std::panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
        tracing::error!("PANIC: {info}");
    }));

    tracing::info!("starting overnight equity screening pipeline");

    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "run failed");
            match e.downcast_ref::<NightscreenError>() {
                Some(NightscreenError::ConfigError(_)) => 1,
                Some(NightscreenError::HardCapExceeded) => 3,
                _ => 70,
            }
        }
    };

    tracing::info!(exit_code, "overnight pipeline exiting");
    std::process::exit(exit_code);
}

async fn run() -> Result<i32> {
    let run_config_path = std::env::var("RUN_CONFIG_PATH").ok().map(PathBuf::from);
    let run_config = RunConfig::load(run_config_path.as_deref())
        .map_err(anyhow::Error::from)
        .context("loading run configuration")?;

    let sector_config_path = env_path("SECTOR_CONFIG_PATH", "config/sectors.json");
    let sector_raw = std::fs::read_to_string(&sector_config_path).map_err(|e| {
        anyhow::Error::from(NightscreenError::ConfigError(format!(
            "sector config {}: {e}",
            sector_config_path.display()
        )))
    })?;
    let universe = Universe::from_json(&sector_raw).map_err(anyhow::Error::from)?;

    let calendar_path = env_path("EVENT_CALENDAR_PATH", "config/event_calendar.csv");
    let calendar = match std::fs::File::open(&calendar_path) {
        Ok(file) => event_risk_guard::calendar::parse_calendar(file).map_err(anyhow::Error::from)?,
        Err(e) => {
            tracing::warn!(
                path = %calendar_path.display(),
                error = %e,
                "event calendar file not found, proceeding with an empty calendar"
            );
            Vec::new()
        }
    };

    let adapter = build_adapter();
    let sentiment = build_sentiment();
    let notifier = build_notifier();
    let lstm_dir = env_path("LSTM_MODEL_DIR", "models/lstm");

    let run_id = event_risk_guard::market_today();
    let reports_root = env_path("REPORTS_DIR", "reports");
    let run_dir = reports_root.join(run_id.format("%Y-%m-%d").to_string());
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("creating run directory {}", run_dir.display()))?;
    let state_path = run_dir.join("run_state.json");

    let orchestrator = Orchestrator::new(
        run_id,
        run_dir,
        run_config,
        adapter,
        sentiment,
        notifier,
        universe,
        calendar,
        lstm_dir,
    );

    let exit = orchestrator.run(&state_path).await.map_err(anyhow::Error::from)?;
    Ok(exit.code())
}
