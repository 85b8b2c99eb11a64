//! Shared type definitions for the Buswatch telemetry system.
//!
//! This crate is the single source of truth for the types that cross a
//! process or task boundary: the vehicle position report, the viewer's
//! viewport, route polylines, and the JSON envelopes exchanged over the
//! ingest and viewer `WebSocket` endpoints.
//!
//! # Modules
//!
//! - [`ids`] -- Connection id used as a logging correlation key
//! - [`structs`] -- Domain structs (buses, viewport bounds, routes)
//! - [`messages`] -- Wire envelopes keyed by `msgType`

pub mod ids;
pub mod messages;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use ids::SessionId;
pub use messages::{ServerMessage, ViewerMessage};
pub use structs::{Bus, Route, RouteError, WindowBounds};
