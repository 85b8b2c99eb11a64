//! `WebSocket` handler for viewer sessions.
//!
//! Viewers connect to `GET /` on the viewer port. Once upgraded
//! (`Connecting` -> `Active`) a session runs two loops over one viewport:
//!
//! - the **listener** reads `newBounds` messages and replaces the viewport,
//!   answering invalid ones with an `Errors` frame;
//! - the **broadcaster** sends the buses inside the current viewport
//!   immediately and then once per broadcast period.
//!
//! Whichever loop sees the connection go away ends the session (`Closed`)
//! and the other loop is dropped with it.
//!
//! The viewport sits in a [`watch`] channel: the listener owns the only
//! sender and the broadcaster the only receiver, and each update replaces
//! all four edges at once, so the broadcaster never filters against a
//! half-written box.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use buswatch_core::{PositionRegistry, validate_bounds};
use buswatch_types::{ServerMessage, SessionId, WindowBounds};
use futures::{Sink, Stream, StreamExt};
use tokio::sync::{Mutex, watch};
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::session::{Inbound, SessionEnd, next_payload, send_message};
use crate::state::AppState;

/// Shortest broadcast period a session will run with.
const MIN_BROADCAST_INTERVAL: Duration = Duration::from_millis(1);

/// Upgrade an HTTP request to a `WebSocket` connection and start a viewer
/// session.
///
/// # Route
///
/// `GET /` on the viewer listener
pub async fn ws_viewer(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_viewer(socket, state))
}

async fn handle_viewer(socket: WebSocket, state: Arc<AppState>) {
    let session_id = SessionId::new();
    debug!(%session_id, "Viewer connected");

    let (outbound, inbound) = socket.split();
    let end = run_viewer_session(
        inbound,
        outbound,
        &state.registry,
        state.broadcast_interval,
        session_id,
    )
    .await;

    debug!(%session_id, ?end, "Viewer disconnected");
}

/// Run one viewer session until either loop observes the connection end.
///
/// The viewport starts as [`WindowBounds::degenerate`], so broadcasts are
/// empty until the viewer reports its first valid bounds.
pub async fn run_viewer_session<St, Si, E>(
    inbound: St,
    outbound: Si,
    registry: &PositionRegistry,
    period: Duration,
    session_id: SessionId,
) -> SessionEnd
where
    St: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
    Si: Sink<Message> + Unpin,
    Si::Error: Display,
{
    let (bounds_tx, bounds_rx) = watch::channel(WindowBounds::degenerate());
    let outbound = Mutex::new(outbound);

    tokio::select! {
        end = listen(inbound, &outbound, bounds_tx, session_id) => end,
        end = broadcast(&outbound, bounds_rx, registry, period) => end,
    }
}

/// Listener loop: sole writer of the viewport.
async fn listen<St, Si, E>(
    mut inbound: St,
    outbound: &Mutex<Si>,
    bounds: watch::Sender<WindowBounds>,
    session_id: SessionId,
) -> SessionEnd
where
    St: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
    Si: Sink<Message> + Unpin,
    Si::Error: Display,
{
    loop {
        let payload = match next_payload(&mut inbound).await {
            Inbound::Payload(payload) => payload,
            Inbound::Closed(end) => return end,
        };

        match validate_bounds(&payload) {
            Ok(update) => {
                debug!(
                    %session_id,
                    south_lat = update.south_lat,
                    north_lat = update.north_lat,
                    west_lng = update.west_lng,
                    east_lng = update.east_lng,
                    "Viewport updated"
                );
                bounds.send_replace(update);
            }
            Err(errors) => {
                debug!(%session_id, %errors, "Bounds update rejected");
                let reply = ServerMessage::Errors {
                    errors: errors.into_messages(),
                };
                let mut sink = outbound.lock().await;
                if let Err(end) = send_message(&mut *sink, &reply).await {
                    return end;
                }
            }
        }
    }
}

/// Broadcaster loop: sole reader of the viewport.
async fn broadcast<Si>(
    outbound: &Mutex<Si>,
    bounds: watch::Receiver<WindowBounds>,
    registry: &PositionRegistry,
    period: Duration,
) -> SessionEnd
where
    Si: Sink<Message> + Unpin,
    Si::Error: Display,
{
    let mut ticker = tokio::time::interval(period.max(MIN_BROADCAST_INTERVAL));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let current = *bounds.borrow();
        let buses = registry.snapshot(&current).await;
        let message = ServerMessage::Buses { buses };

        let mut sink = outbound.lock().await;
        if let Err(end) = send_message(&mut *sink, &message).await {
            return end;
        }
    }
}
