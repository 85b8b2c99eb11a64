//! A single simulated bus.
//!
//! An agent starts at a random point of its route, then walks the route
//! forever, wrapping from the last point back to the first. After every
//! step it pushes one telemetry report onto its connection queue and
//! sleeps for the refresh interval.

use std::sync::Arc;
use std::time::Duration;

use buswatch_types::{Bus, Route};
use rand::Rng;
use rand::distr::Alphanumeric;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::multiplexer::QueueHandle;

/// Random characters appended to every bus id.
const BUS_ID_SUFFIX_LEN: usize = 5;

/// Build a bus id: `{prefix}{route}-{5 random alphanumerics}`.
pub fn generate_bus_id(prefix: &str, route_name: &str, rng: &mut impl Rng) -> String {
    let suffix: String = (0..BUS_ID_SUFFIX_LEN)
        .map(|_| char::from(rng.sample(Alphanumeric)))
        .collect();
    format!("{prefix}{route_name}-{suffix}")
}

/// Why an agent stopped driving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LapEnd {
    /// The fleet is shutting down.
    Cancelled,
    /// The connection queue was closed under the agent.
    QueueClosed,
}

/// One simulated bus bound to one route.
#[derive(Debug, Clone)]
pub struct SimulatorAgent {
    bus_id: String,
    route: Arc<Route>,
    start: usize,
    interval: Duration,
}

impl SimulatorAgent {
    /// Create an agent that starts at `start` (wrapped to the route length).
    pub fn new(bus_id: impl Into<String>, route: Arc<Route>, start: usize, interval: Duration) -> Self {
        let start = start.checked_rem(route.len()).unwrap_or(0);
        Self {
            bus_id: bus_id.into(),
            route,
            start,
            interval,
        }
    }

    /// Create an agent with a fresh bus id and a random starting point.
    pub fn random(route: Arc<Route>, prefix: &str, interval: Duration, rng: &mut impl Rng) -> Self {
        let bus_id = generate_bus_id(prefix, route.name(), rng);
        let start = rng.random_range(0..route.len().max(1));
        Self::new(bus_id, route, start, interval)
    }

    /// The id this bus reports under.
    pub fn bus_id(&self) -> &str {
        &self.bus_id
    }

    /// Index of the first point this bus reports.
    pub const fn start(&self) -> usize {
        self.start
    }

    /// The endless sequence of reports this bus produces.
    pub fn telemetry(&self) -> impl Iterator<Item = Bus> + '_ {
        self.route
            .coordinates()
            .iter()
            .copied()
            .cycle()
            .skip(self.start)
            .map(|(lat, lng)| Bus {
                bus_id: self.bus_id.clone(),
                lat,
                lng,
                route: self.route.name().to_owned(),
            })
    }

    /// Drive the route until `cancel` fires or the queue closes.
    pub async fn run(self, queue: QueueHandle, cancel: CancellationToken) -> LapEnd {
        for bus in self.telemetry() {
            let message = match serde_json::to_string(&bus) {
                Ok(message) => message,
                Err(e) => {
                    warn!(bus_id = %self.bus_id, error = %e, "Failed to serialize telemetry");
                    continue;
                }
            };

            tokio::select! {
                biased;
                () = cancel.cancelled() => return LapEnd::Cancelled,
                pushed = queue.push(message) => {
                    if pushed.is_err() {
                        return LapEnd::QueueClosed;
                    }
                }
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => return LapEnd::Cancelled,
                () = tokio::time::sleep(self.interval) => {}
            }
        }

        // A route is never empty, so the cycle above only ends through a
        // return.
        LapEnd::Cancelled
    }
}
