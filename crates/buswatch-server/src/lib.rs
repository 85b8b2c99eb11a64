//! Ingest and viewer `WebSocket` server for Buswatch.
//!
//! Two listeners run side by side:
//!
//! - **Ingest endpoint** (default port 8080) accepts vehicle connections.
//!   Every text frame is validated as a telemetry report and upserted into
//!   the shared [`PositionRegistry`]; invalid frames get an `Errors` reply.
//! - **Viewer endpoint** (default port 8000) runs one [`viewer`] session per
//!   connection: a listener that accepts `newBounds` updates and a
//!   broadcaster that pushes the buses inside those bounds every period.
//!
//! # Architecture
//!
//! All sessions share one [`AppState`] holding the registry. Nothing else
//! is shared: each viewer's viewport lives inside its own session, and a
//! failing connection only ends its own session.
//!
//! [`PositionRegistry`]: buswatch_core::PositionRegistry

pub mod ingest;
pub mod router;
pub mod server;
pub mod session;
pub mod state;
pub mod viewer;

// Re-export primary types for convenience.
pub use router::{build_ingest_router, build_viewer_router};
pub use server::{Listeners, ServerError, serve, start_server};
pub use session::SessionEnd;
pub use state::AppState;
