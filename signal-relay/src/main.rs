//! signal-relay binary entry point.
//!
//! Usage:
//! ```bash
//! signal-relay --config relay.toml
//! ```
//!
//! A missing config file starts the relay with defaults.

use anyhow::Context;
use peerlink_relay::config::Config;
use peerlink_relay::http;
use peerlink_relay::server::SignalRelay;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = get_config_path();
    let config = if config_path.exists() {
        Config::from_file(&config_path)
            .with_context(|| format!("loading {}", config_path.display()))?
    } else {
        tracing::info!(path = %config_path.display(), "no config file, using defaults");
        Config::default()
    };

    http::init_start_time();
    let relay = Arc::new(SignalRelay::new(config));

    // HTTP health/metrics endpoints
    if relay.config().http.metrics_enabled {
        let http_addr = relay.config().http.bind_address.clone();
        let router = http::build_router(Arc::clone(&relay));
        tokio::spawn(async move {
            let listener = match tokio::net::TcpListener::bind(&http_addr).await {
                Ok(listener) => listener,
                Err(e) => {
                    tracing::error!(address = %http_addr, error = %e, "http bind failed");
                    return;
                }
            };
            tracing::info!(address = %http_addr, "http endpoints listening");
            if let Err(e) = axum::serve(listener, router).await {
                tracing::error!(error = %e, "http server exited");
            }
        });
    }

    // WebSocket signaling listener
    let bind_address = relay.config().server.bind_address.clone();
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("binding {bind_address}"))?;

    relay.serve(listener).await?;
    Ok(())
}

fn get_config_path() -> PathBuf {
    std::env::args()
        .skip_while(|arg| arg != "--config")
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("relay.toml"))
}
