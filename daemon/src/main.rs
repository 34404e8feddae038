//! Ratekeeper Daemon Binary

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ratekeeper_daemon::{DaemonConfig, Ratekeeper};
use ratekeeper_fx::ExchangeRateApiClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .or_else(|_| std::env::var("LOG_LEVEL"))
                .unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting Ratekeeper");

    // Load configuration
    let config = DaemonConfig::from_env();

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(anyhow::anyhow!("Configuration error: {}", e));
    }

    let source = Arc::new(ExchangeRateApiClient::new(config.api.clone())?);
    let app = Ratekeeper::start(&config, source);

    info!(
        currencies = ?config.currencies.codes(),
        base_url = %config.api.base_url,
        "Ratekeeper running"
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    let health = app.shutdown().await;
    info!(health = %serde_json::to_string(&health)?, "Ratekeeper shutdown complete");

    Ok(())
}
