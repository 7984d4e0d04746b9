use anyhow::anyhow;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use crate::booter::Booter;
use crate::cli::Cli;
use crate::config::Config;
use crate::core::gemini::GeminiClient;
use crate::core::rate_limiter::{SessionLimiters, SystemClock};
use crate::governor_conf::get_governor_conf;
use crate::server::app_router;
use crate::server::types::AppState;

pub mod assets;
pub mod booter;
pub mod cli;
pub mod config;
pub mod core;
pub mod errors;
pub mod governor_conf;
pub mod server;
pub mod utils;

// Build app state from the resolved configuration
fn init_app_state(config: &Config) -> Result<AppState, anyhow::Error> {
    let provider = GeminiClient::new(config.gemini.clone())?;
    let limiters = SessionLimiters::new(config.rate_limit, Arc::new(SystemClock));

    Ok(AppState {
        provider: Arc::new(provider),
        limiters: Arc::new(limiters),
        max_image_bytes: config.max_image_bytes,
    })
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Initialize tracing for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Cli::parse().run_args();
    let config = Config::from_env()?.with_overrides(&args);

    tracing::info!(
        model = %config.gemini.model,
        quota = config.rate_limit.quota,
        window_secs = config.rate_limit.window.as_secs(),
        "starting vitalcare"
    );

    let state = Arc::new(init_app_state(&config)?);

    let flood_guard = Arc::new(
        get_governor_conf(config.flood_burst_per_minute)
            .ok_or_else(|| anyhow!("FLOOD_BURST_PER_MINUTE must be greater than zero"))?,
    );

    // governor keeps one entry per key; drop the stale ones periodically
    let limiter = flood_guard.limiter().clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            limiter.retain_recent();
        }
    });

    let router = app_router(state, Some(flood_guard), config.request_timeout);

    Booter::new(config.port).await?.start(router).await
}
