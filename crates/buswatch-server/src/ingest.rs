//! `WebSocket` handler for vehicle telemetry ingest.
//!
//! Vehicles connect to `GET /` on the ingest port and send one JSON
//! position report per frame. Valid reports are upserted into the shared
//! registry. Invalid ones are answered with an `Errors` frame on the same
//! connection and otherwise ignored; the connection stays open.

use std::fmt::Display;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use buswatch_core::{PositionRegistry, validate_telemetry};
use buswatch_types::{ServerMessage, SessionId};
use futures::{Sink, Stream, StreamExt};
use tracing::{debug, trace};

use crate::session::{Inbound, SessionEnd, next_payload, send_message};
use crate::state::AppState;

/// Upgrade an HTTP request to a `WebSocket` connection and start
/// accepting telemetry.
///
/// # Route
///
/// `GET /` on the ingest listener
pub async fn ws_ingest(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_ingest(socket, state))
}

async fn handle_ingest(socket: WebSocket, state: Arc<AppState>) {
    let session_id = SessionId::new();
    debug!(%session_id, "Vehicle connected");

    let (outbound, inbound) = socket.split();
    let end = run_ingest_session(inbound, outbound, &state.registry, session_id).await;

    debug!(%session_id, ?end, "Vehicle disconnected");
}

/// Read telemetry frames until the connection ends.
///
/// Returns the reason the session stopped. Closure is the normal outcome
/// and is never an error for the caller.
pub async fn run_ingest_session<St, Si, E>(
    mut inbound: St,
    mut outbound: Si,
    registry: &PositionRegistry,
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

        match validate_telemetry(&payload) {
            Ok(bus) => {
                trace!(%session_id, bus_id = %bus.bus_id, lat = bus.lat, lng = bus.lng, "Telemetry accepted");
                registry.upsert(bus).await;
            }
            Err(errors) => {
                debug!(%session_id, %errors, "Telemetry rejected");
                let reply = ServerMessage::Errors {
                    errors: errors.into_messages(),
                };
                if let Err(end) = send_message(&mut outbound, &reply).await {
                    return end;
                }
            }
        }
    }
}
