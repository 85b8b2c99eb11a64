//! Plumbing shared by ingest and viewer sessions.
//!
//! Sessions are written against a generic `Stream` of inbound frames and a
//! `Sink` of outbound frames rather than a concrete
//! [`WebSocket`](axum::extract::ws::WebSocket), so the same loop serves a
//! split socket in production and in-memory channels in tests.

use std::fmt::Display;

use axum::extract::ws::Message;
use buswatch_types::ServerMessage;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tracing::{debug, warn};

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The client sent a close frame or the stream ended.
    ClientClosed,
    /// Reading from the connection failed.
    ReceiveFailed,
    /// Writing to the connection failed.
    SendFailed,
}

/// Outcome of waiting for the next data frame.
pub(crate) enum Inbound {
    /// A text or binary payload to validate.
    Payload(Vec<u8>),
    /// The connection is gone.
    Closed(SessionEnd),
}

/// Wait for the next text or binary frame, skipping control frames.
///
/// Ping replies are produced by the `WebSocket` layer itself while it is
/// being read.
pub(crate) async fn next_payload<St, E>(inbound: &mut St) -> Inbound
where
    St: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    loop {
        match inbound.next().await {
            None | Some(Ok(Message::Close(_))) => return Inbound::Closed(SessionEnd::ClientClosed),
            Some(Err(e)) => {
                debug!(error = %e, "WebSocket receive failed");
                return Inbound::Closed(SessionEnd::ReceiveFailed);
            }
            Some(Ok(Message::Text(text))) => return Inbound::Payload(text.as_str().as_bytes().to_vec()),
            Some(Ok(Message::Binary(bytes))) => return Inbound::Payload(bytes.to_vec()),
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
        }
    }
}

/// Serialize `message` and write it as one text frame.
///
/// A serialization failure is logged and treated as delivered; only a
/// transport failure is reported back.
pub(crate) async fn send_message<Si>(outbound: &mut Si, message: &ServerMessage) -> Result<(), SessionEnd>
where
    Si: Sink<Message> + Unpin,
    Si::Error: Display,
{
    let json = match serde_json::to_string(message) {
        Ok(json) => json,
        Err(e) => {
            warn!("Failed to serialize server message: {e}");
            return Ok(());
        }
    };
    outbound.send(Message::Text(json.into())).await.map_err(|e| {
        debug!(error = %e, "WebSocket send failed");
        SessionEnd::SendFailed
    })
}
