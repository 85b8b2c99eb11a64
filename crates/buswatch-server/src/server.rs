//! Server lifecycle management.
//!
//! [`Listeners::bind`] opens both TCP listeners up front so a bad address
//! or a busy port fails before anything is served. [`serve`] then runs the
//! two Axum applications side by side until the [`CancellationToken`] is
//! cancelled; [`start_server`] wires that token to `Ctrl-C`.
//!
//! Once bound, a failing connection never stops a listener: every session
//! handles its own errors.

use std::net::SocketAddr;
use std::sync::Arc;

use buswatch_core::config::ServerConfig;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::router::{build_ingest_router, build_viewer_router};
use crate::state::AppState;

/// The two bound, not yet serving, TCP listeners.
#[derive(Debug)]
pub struct Listeners {
    ingest: TcpListener,
    viewer: TcpListener,
}

impl Listeners {
    /// Bind the ingest and viewer ports from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address does not parse or a
    /// port cannot be bound.
    pub async fn bind(config: &ServerConfig) -> Result<Self, ServerError> {
        let ingest = bind_one(&config.host, config.ingest_port).await?;
        let viewer = bind_one(&config.host, config.viewer_port).await?;
        Ok(Self { ingest, viewer })
    }

    /// Address the ingest listener is bound to (useful with port 0).
    pub fn ingest_addr(&self) -> Result<SocketAddr, ServerError> {
        self.ingest
            .local_addr()
            .map_err(|e| ServerError::Bind(format!("ingest local address: {e}")))
    }

    /// Address the viewer listener is bound to (useful with port 0).
    pub fn viewer_addr(&self) -> Result<SocketAddr, ServerError> {
        self.viewer
            .local_addr()
            .map_err(|e| ServerError::Bind(format!("viewer local address: {e}")))
    }
}

async fn bind_one(host: &str, port: u16) -> Result<TcpListener, ServerError> {
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .map_err(|e| ServerError::Bind(format!("invalid address: {e}")))?;

    TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Bind(format!("bind failed on {addr}: {e}")))
}

/// Serve both endpoints until `shutdown` is cancelled.
///
/// # Errors
///
/// Returns [`ServerError::Serve`] if either listener hits a fatal I/O
/// error. The other listener is shut down as well.
pub async fn serve(
    listeners: Listeners,
    state: Arc<AppState>,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    let ingest_addr = listeners.ingest_addr()?;
    let viewer_addr = listeners.viewer_addr()?;

    let ingest = axum::serve(listeners.ingest, build_ingest_router(Arc::clone(&state)))
        .with_graceful_shutdown(shutdown.clone().cancelled_owned());
    let viewer = axum::serve(listeners.viewer, build_viewer_router(state))
        .with_graceful_shutdown(shutdown.clone().cancelled_owned());

    info!(%ingest_addr, %viewer_addr, "Buswatch server listening");

    let result = tokio::try_join!(
        async {
            ingest
                .await
                .map_err(|e| ServerError::Serve(format!("ingest: {e}")))
        },
        async {
            viewer
                .await
                .map_err(|e| ServerError::Serve(format!("viewer: {e}")))
        },
    );
    if result.is_err() {
        shutdown.cancel();
    }
    result.map(|_| ())
}

/// Bind both endpoints from `config` and serve them until `Ctrl-C`.
///
/// # Errors
///
/// Returns an error if binding or serving fails.
pub async fn start_server(config: &ServerConfig, state: Arc<AppState>) -> Result<(), ServerError> {
    let listeners = Listeners::bind(config).await?;

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            return;
        }
        info!("Ctrl-C received, shutting down");
        signal.cancel();
    });

    serve(listeners, state, shutdown).await
}

/// Errors that can occur when starting or running the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to the network address.
    #[error("bind error: {0}")]
    Bind(String),

    /// The server encountered a fatal error while serving.
    #[error("serve error: {0}")]
    Serve(String),
}
