//! JSON envelopes exchanged over the `WebSocket` endpoints.
//!
//! Every envelope carries a `msgType` discriminator. Vehicle telemetry is
//! the one exception: it is a bare [`Bus`] object.

use serde::{Deserialize, Serialize};

use crate::structs::{Bus, WindowBounds};

/// Messages the server pushes to connected clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "msgType")]
pub enum ServerMessage {
    /// Viewport-filtered snapshot sent to a viewer every broadcast period.
    Buses {
        /// Every known bus inside the viewer's current bounds.
        buses: Vec<Bus>,
    },
    /// Validation failures for the message the client just sent.
    Errors {
        /// Human-readable problems, in detection order.
        errors: Vec<String>,
    },
}

/// Messages a viewer sends to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "msgType")]
pub enum ViewerMessage {
    /// The viewer's map moved; replace its viewport.
    #[serde(rename = "newBounds")]
    NewBounds {
        /// The new viewport.
        data: WindowBounds,
    },
}
