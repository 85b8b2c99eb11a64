//! Error types for the simulator.
//!
//! Only setup can fail with a [`SimulatorError`]: loading routes, reading
//! configuration, opening the connection pool. Once the fleet is running,
//! a lost connection ends the affected laps and is logged, never
//! propagated.

use buswatch_core::ConfigError;

/// Errors that can occur while setting up the simulated fleet.
#[derive(Debug, thiserror::Error)]
pub enum SimulatorError {
    /// Route files could not be read or parsed.
    #[error("route loading error: {0}")]
    Routes(String),

    /// An outbound connection could not be opened.
    #[error("failed to connect to {url}: {message}")]
    Connect {
        /// The ingest URL that was dialled.
        url: String,
        /// Description of the connection failure.
        message: String,
    },

    /// Configuration is invalid.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: ConfigError,
    },
}
