//! Fleet orchestration: launching, gating and stopping every bus.
//!
//! Buses are spawned up front but must hold an admission permit before
//! they start driving, so at most `max_active_buses` run at once. The rest
//! wait for a permit, which frees up only when a running bus stops.

use std::sync::Arc;

use buswatch_core::config::SimulatorConfig;
use buswatch_types::Route;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::agent::{LapEnd, SimulatorAgent};
use crate::assignment::policy_for;
use crate::multiplexer::{ConnectionMultiplexer, QueueHandle, SenderReport};

/// Every simulated bus plus the connection pool they share.
#[derive(Debug)]
pub struct Fleet {
    agents: JoinSet<()>,
    multiplexer: ConnectionMultiplexer,
    cancel: CancellationToken,
    launched: usize,
}

impl Fleet {
    /// Launch `buses_per_route` buses on each route.
    ///
    /// When `routes_number` is set only the first that many routes are
    /// used. Each bus is bound to a connection by the configured
    /// assignment policy and keeps it for its whole lifetime.
    pub fn launch(config: &SimulatorConfig, routes: Vec<Route>, multiplexer: ConnectionMultiplexer) -> Self {
        let cancel = CancellationToken::new();
        let admission = Arc::new(Semaphore::new(config.max_active_buses));
        let policy = policy_for(config.assignment);
        let interval = config.refresh_timeout();
        let route_limit = if multiplexer.pool_size() == 0 {
            warn!("Connection pool is empty, no buses launched");
            0
        } else {
            config.routes_number.unwrap_or(usize::MAX)
        };

        let mut rng = rand::rng();
        let mut agents = JoinSet::new();

        for route in routes.into_iter().take(route_limit) {
            let route = Arc::new(route);
            for _ in 0..config.buses_per_route {
                let Some(queue) = multiplexer.assign(policy.as_ref()) else {
                    continue;
                };
                let agent = SimulatorAgent::random(Arc::clone(&route), &config.emulator_id, interval, &mut rng);
                agents.spawn(drive(agent, queue, Arc::clone(&admission), cancel.clone()));
            }
        }

        let launched = agents.len();
        info!(
            buses = launched,
            connections = multiplexer.pool_size(),
            max_active = config.max_active_buses,
            "Fleet launched"
        );

        Self {
            agents,
            multiplexer,
            cancel,
            launched,
        }
    }

    /// Number of buses launched.
    pub const fn launched(&self) -> usize {
        self.launched
    }

    /// Wait until every bus has stopped on its own, e.g. because every
    /// connection was lost.
    pub async fn wait(&mut self) {
        while let Some(joined) = self.agents.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "Bus task did not finish cleanly");
            }
        }
    }

    /// Stop every bus, flush every queue and close the pool.
    pub async fn shutdown(mut self) -> Vec<SenderReport> {
        info!(buses = self.launched, "Stopping fleet");
        self.cancel.cancel();
        self.wait().await;
        self.multiplexer.close().await
    }
}

/// Run one bus once it is admitted.
async fn drive(agent: SimulatorAgent, queue: QueueHandle, admission: Arc<Semaphore>, cancel: CancellationToken) {
    let permit = tokio::select! {
        biased;
        () = cancel.cancelled() => return,
        permit = admission.acquire_owned() => permit,
    };
    let Ok(_permit) = permit else { return };

    let bus_id = agent.bus_id().to_owned();
    let connection = queue.connection();
    debug!(%bus_id, connection, start = agent.start(), "Bus started");

    match agent.run(queue, cancel.clone()).await {
        LapEnd::QueueClosed if !cancel.is_cancelled() => {
            warn!(%bus_id, connection, "Connection lost, bus stopped");
        }
        end => debug!(%bus_id, ?end, "Bus stopped"),
    }
}
