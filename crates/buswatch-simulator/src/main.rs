//! Buswatch simulator binary.
//!
//! Drives a fleet of simulated buses against the ingest endpoint over a
//! fixed pool of `WebSocket` connections.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `buswatch-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Load route files
//! 4. Open the connection pool
//! 5. Launch the fleet and run until `Ctrl-C` or until every bus stops

use buswatch_core::BuswatchConfig;
use buswatch_simulator::{ConnectionMultiplexer, Fleet, RouteDirectory, RouteSource};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Application entry point for the simulator.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, no route can be
/// loaded, or the connection pool cannot be opened.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let config = BuswatchConfig::load()?;
    config.simulator.validate()?;

    // 2. Initialize structured logging.
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) if config.logging.enabled => filter,
        _ => EnvFilter::new(config.logging.filter_directive()),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let sim = &config.simulator;
    info!(
        server_url = sim.server_url,
        routes_dir = sim.routes_dir,
        buses_per_route = sim.buses_per_route,
        websockets_number = sim.websockets_number,
        queue_capacity = sim.queue_capacity,
        max_active_buses = sim.max_active_buses,
        refresh_timeout_ms = sim.refresh_timeout_ms,
        "buswatch-simulator starting"
    );

    // 3. Load routes.
    let routes = RouteDirectory::new(&sim.routes_dir).load_routes()?;
    info!(routes = routes.len(), "Routes loaded");

    // 4. Open the connection pool.
    let multiplexer =
        ConnectionMultiplexer::connect(&sim.server_url, sim.websockets_number, sim.queue_capacity).await?;

    // 5. Drive the fleet.
    let mut fleet = Fleet::launch(sim, routes, multiplexer);
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!(error = %e, "Failed to listen for Ctrl-C");
            }
            info!("Shutdown signal received");
        }
        () = fleet.wait() => warn!("Every bus has stopped"),
    }

    let reports = fleet.shutdown().await;
    let sent: u64 = reports.iter().map(|r| r.sent).sum();
    let failed = reports.iter().filter(|r| r.failed).count();
    info!(sent, failed_connections = failed, "buswatch-simulator shutdown complete");
    Ok(())
}
