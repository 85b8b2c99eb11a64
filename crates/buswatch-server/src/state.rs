//! Shared application state for the ingest and viewer endpoints.

use std::time::Duration;

use buswatch_core::PositionRegistry;

/// Default period between two snapshots pushed to one viewer.
pub const DEFAULT_BROADCAST_INTERVAL: Duration = Duration::from_secs(1);

/// Shared state for both Axum applications.
///
/// Wrapped in [`Arc`](std::sync::Arc) and injected via Axum's `State`
/// extractor. Ingest sessions write into the registry, viewer sessions read
/// from it.
#[derive(Debug)]
pub struct AppState {
    /// Latest position of every bus ever reported.
    pub registry: PositionRegistry,
    /// Period between two snapshots sent to the same viewer.
    pub broadcast_interval: Duration,
}

impl AppState {
    /// Create a state with an empty registry.
    pub fn new(broadcast_interval: Duration) -> Self {
        Self {
            registry: PositionRegistry::new(),
            broadcast_interval,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(DEFAULT_BROADCAST_INTERVAL)
    }
}
