//! Buswatch server binary.
//!
//! Serves the vehicle ingest endpoint and the viewer endpoint from one
//! process sharing one in-memory position registry.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `buswatch-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Bind both listeners
//! 4. Serve until `Ctrl-C`

use std::sync::Arc;

use buswatch_core::BuswatchConfig;
use buswatch_server::{AppState, start_server};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Application entry point for the server.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or a listener cannot
/// be bound.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let config = BuswatchConfig::load()?;

    // 2. Initialize structured logging.
    //    `RUST_LOG` wins unless logging is switched off entirely.
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) if config.logging.enabled => filter,
        _ => EnvFilter::new(config.logging.filter_directive()),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!(
        host = config.server.host,
        ingest_port = config.server.ingest_port,
        viewer_port = config.server.viewer_port,
        broadcast_interval_ms = config.server.broadcast_interval_ms,
        "buswatch-server starting"
    );

    // 3-4. Bind and serve.
    let state = Arc::new(AppState::new(config.server.broadcast_interval()));
    if let Err(e) = start_server(&config.server, state).await {
        tracing::error!(error = %e, "Server exited with error");
        return Err(e.into());
    }

    info!("buswatch-server shutdown complete");
    Ok(())
}
