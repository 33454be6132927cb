// =============================================================================
// HoneyCoin Live Financial Model — Main Entry Point
// =============================================================================
//
// Serves the investor dashboard backend: a scenario/region projection engine
// fed by a periodically refreshed market signal (USD/KES, BTC spot, live
// users). The dashboard reads snapshots over REST/WebSocket.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod live_feed;
mod market_signal;
mod projection;
mod runtime_config;
mod scenario_table;
mod scheduler;
mod types;

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::live_feed::{HttpMarketFeed, SignalFetcher};
use crate::runtime_config::RuntimeConfig;
use crate::scheduler::RefreshScheduler;

const CONFIG_PATH: &str = "runtime_config.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("HoneyCoin Live Financial Model — starting up");

    let mut config = RuntimeConfig::load(CONFIG_PATH).unwrap_or_else(|e| {
        warn!(error = %format!("{e:#}"), "Failed to load config, using defaults");
        RuntimeConfig::default()
    });

    // Record store credentials only ever come from the environment.
    if let Ok(url) = std::env::var("HONEYCOIN_LIVE_USERS_URL") {
        config.live_users.base_url = url.trim().to_string();
    }
    if let Ok(key) = std::env::var("HONEYCOIN_LIVE_USERS_KEY") {
        config.live_users.api_key = key.trim().to_string();
    }
    if config.live_users.base_url.is_empty() {
        warn!("HONEYCOIN_LIVE_USERS_URL not set — live user count will use its fallback");
    }

    info!(
        scenario = %config.default_scenario,
        region = %config.default_region,
        currency = %config.local_currency,
        refresh_interval_ms = config.refresh_interval_ms,
        "Configuration ready"
    );

    // ── 2. Build shared state ────────────────────────────────────────────
    let feed = HttpMarketFeed::from_config(&config);
    let fetcher = SignalFetcher::new(feed, config.fallbacks, config.fetch_timeout());
    let period = config.refresh_interval();
    let state = Arc::new(AppState::new(config));

    // ── 3. Refresh scheduler ─────────────────────────────────────────────
    let refresh = RefreshScheduler::new(fetcher, state.clone(), period).start();

    // ── 4. Start the API server ──────────────────────────────────────────
    let api_state = state.clone();
    let bind_addr =
        std::env::var("HONEYCOIN_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3001".into());
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "API server listening");

    tokio::spawn(async move {
        let app = api::rest::router(api_state);
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "API server failed");
        }
    });

    info!("All subsystems running. Press Ctrl+C to stop.");

    // ── 5. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("Shutdown signal received — stopping gracefully");

    refresh.shutdown().await;

    if let Err(e) = state.runtime_config.read().save(CONFIG_PATH) {
        error!(error = %e, "Failed to save runtime config on shutdown");
    }

    info!("HoneyCoin Live Financial Model shut down complete.");
    Ok(())
}
