// =============================================================================
// RSI & Divergence Scanner: Main Entry Point
// =============================================================================
//
// Loads the configuration, builds the data source, runs an initial scan in
// the background and serves the latest report over HTTP until Ctrl-C.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod binance;
mod error;
mod indicators;
mod market_data;
mod runtime_config;
mod scanner;
mod signals;
mod types;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::binance::{BinanceClient, BinanceSource, RateLimitTracker};
use crate::market_data::{AlphaVantageSource, CachedSource, DataSource, FileSource};
use crate::runtime_config::{DataSourceKind, RuntimeConfig};
use crate::scanner::{ScanPhase, Scanner};

const CONFIG_PATH: &str = "scanner_config.json";

/// Build the configured provider, wrapped in the response cache when enabled.
fn build_source(
    config: &RuntimeConfig,
) -> anyhow::Result<(Arc<dyn DataSource>, Option<Arc<RateLimitTracker>>)> {
    let mut tracker = None;
    let provider: Arc<dyn DataSource> = match config.data_source {
        DataSourceKind::AlphaVantage => {
            let key = std::env::var("ALPHA_VANTAGE_API_KEY")
                .context("ALPHA_VANTAGE_API_KEY must be set for the alpha_vantage source")?;
            Arc::new(AlphaVantageSource::new(key)?)
        }
        DataSourceKind::Binance => {
            let rate_limit = Arc::new(RateLimitTracker::new());
            tracker = Some(rate_limit.clone());
            let client = BinanceClient::new(rate_limit)?;
            Arc::new(BinanceSource::new(client, config.binance_kline_limit))
        }
        DataSourceKind::Files => Arc::new(FileSource::new(config.data_dir.clone())),
    };

    let source = if config.cache_ttl_secs > 0 {
        let ttl = Duration::from_secs(config.cache_ttl_secs);
        Arc::new(CachedSource::new(provider, ttl)) as Arc<dyn DataSource>
    } else {
        provider
    };
    Ok((source, tracker))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("RSI & divergence scanner starting up");

    let mut config = if std::path::Path::new(CONFIG_PATH).exists() {
        RuntimeConfig::load(CONFIG_PATH).unwrap_or_else(|e| {
            warn!(error = %e, path = CONFIG_PATH, "Failed to load config, using defaults");
            RuntimeConfig::default()
        })
    } else {
        let defaults = RuntimeConfig::default();
        if let Err(e) = defaults.save(CONFIG_PATH) {
            warn!(error = %e, path = CONFIG_PATH, "Failed to write default config");
        }
        defaults
    };
    config.apply_env_overrides();
    config.validate().context("invalid scanner configuration")?;

    info!(
        symbols = config.symbols.len(),
        timeframes = config.timeframes.len(),
        source = %config.data_source,
        period = config.analysis.oscillator_period,
        "Configuration loaded"
    );

    // ── 2. Data source & scanner ─────────────────────────────────────────
    let (source, rate_limit) = build_source(&config)?;
    let rescan_interval = config.rescan_interval_secs;
    let scanner = Arc::new(Scanner::new(config, source)?);

    let admin_token = api::auth::admin_token_from_env();
    if admin_token.is_none() {
        warn!(
            "{} is not set; POST /api/v1/rescan is disabled",
            api::auth::ADMIN_TOKEN_ENV
        );
    }
    let state = Arc::new(AppState::new(scanner, admin_token, rate_limit));

    // ── 3. Initial scan ──────────────────────────────────────────────────
    let scan_state = state.clone();
    tokio::spawn(async move {
        scan_state.run_scan(false).await;
    });

    // ── 4. Scheduled rescans ─────────────────────────────────────────────
    if rescan_interval > 0 {
        let rescan_state = state.clone();
        tokio::spawn(async move {
            let period = Duration::from_secs(rescan_interval);
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                interval.tick().await;
                if let ScanPhase::Running { completed, total } = rescan_state.scanner.state().phase() {
                    debug!(completed, total, "Previous scan still running, skipping scheduled rescan");
                    continue;
                }
                rescan_state.run_scan(true).await;
            }
        });
        info!(every_secs = rescan_interval, "Scheduled rescans enabled");
    }

    // ── 5. Start the API server ──────────────────────────────────────────
    let bind_addr =
        std::env::var("SCANNER_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3001".into());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind API server on {bind_addr}"))?;
    info!(addr = %bind_addr, "API server listening");

    let app = api::rest::router(state);
    let server = axum::serve(listener, app).with_graceful_shutdown(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
        }
        info!("Shutdown signal received");
    });

    server.await.context("API server failed")?;
    info!("Scanner stopped");
    Ok(())
}
