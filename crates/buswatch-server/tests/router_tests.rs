//! Routing tests for the ingest and viewer routers.
//!
//! Tests use Axum's `Router` directly via `tower::ServiceExt` without
//! starting a TCP server. Requests that are not `WebSocket` upgrades must
//! be refused without touching the registry.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use buswatch_server::{AppState, build_ingest_router, build_viewer_router};
use tower::ServiceExt;

fn test_state() -> Arc<AppState> {
    Arc::new(AppState::default())
}

#[tokio::test]
async fn test_plain_get_is_not_upgraded() {
    let state = test_state();
    let router = build_ingest_router(Arc::clone(&state));

    let response = router
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert!(response.status().is_client_error());
    assert!(state.registry.is_empty().await);
}

#[tokio::test]
async fn test_viewer_rejects_post() {
    let router = build_viewer_router(test_state());

    let response = router
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_unknown_path_is_not_found() {
    let router = build_ingest_router(test_state());

    let response = router
        .oneshot(Request::get("/buses").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_viewer_answers_cors_preflight() {
    let router = build_viewer_router(test_state());

    let response = router
        .oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/")
                .header("origin", "http://localhost:3000")
                .header("access-control-request-method", "GET")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.status().is_success());
    let allow_origin = response
        .headers()
        .get("access-control-allow-origin")
        .unwrap()
        .to_str()
        .unwrap();
    assert_eq!(allow_origin, "*");
}
