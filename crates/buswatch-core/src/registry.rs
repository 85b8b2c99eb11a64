//! Shared registry of last-known vehicle positions.
//!
//! Every ingest connection writes into the same [`PositionRegistry`] and
//! every viewer session reads from it. The map sits behind a
//! [`tokio::sync::RwLock`]: upserts take the write half briefly, snapshots
//! share the read half. A snapshot observes every upsert that released the
//! lock before the snapshot acquired it; there is no atomicity across
//! entries.
//!
//! Entries are never removed. A vehicle that disconnects keeps its last
//! position in every later snapshot.

use std::collections::BTreeMap;

use buswatch_types::{Bus, WindowBounds};
use tokio::sync::RwLock;

/// Keyed store of the latest [`Bus`] report per `bus_id`.
#[derive(Debug, Default)]
pub struct PositionRegistry {
    buses: RwLock<BTreeMap<String, Bus>>,
}

impl PositionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert the report, replacing any earlier report for the same bus.
    pub async fn upsert(&self, bus: Bus) {
        let mut buses = self.buses.write().await;
        buses.insert(bus.bus_id.clone(), bus);
    }

    /// Every stored bus whose position lies inside `bounds`, edges
    /// inclusive. Sorted by `bus_id`, though callers must not rely on it.
    pub async fn snapshot(&self, bounds: &WindowBounds) -> Vec<Bus> {
        let buses = self.buses.read().await;
        buses
            .values()
            .filter(|bus| bounds.contains_bus(bus))
            .cloned()
            .collect()
    }

    /// The stored report for one bus, if any.
    pub async fn get(&self, bus_id: &str) -> Option<Bus> {
        self.buses.read().await.get(bus_id).cloned()
    }

    /// Number of distinct buses ever reported.
    pub async fn len(&self) -> usize {
        self.buses.read().await.len()
    }

    /// Whether no bus has reported yet.
    pub async fn is_empty(&self) -> bool {
        self.buses.read().await.is_empty()
    }
}
