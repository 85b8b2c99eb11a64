//! Axum router construction for the ingest and viewer endpoints.
//!
//! Each endpoint gets its own [`Router`] because each is served on its own
//! port. Both upgrade `GET /` to a `WebSocket`.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::ingest;
use crate::state::AppState;
use crate::viewer;

/// Build the router vehicles connect to.
///
/// - `GET /` -- `WebSocket` telemetry ingest
pub fn build_ingest_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(ingest::ws_ingest))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Build the router viewers connect to.
///
/// - `GET /` -- `WebSocket` viewer session
///
/// CORS allows any origin so a map page served from elsewhere can open the
/// socket during development.
pub fn build_viewer_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(viewer::ws_viewer))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
