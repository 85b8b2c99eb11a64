//! End-to-end tests for the ingest and viewer endpoints.
//!
//! Each test binds both listeners on ephemeral ports, serves them on a
//! background task, and talks to them with a `tokio-tungstenite` client,
//! exactly as a vehicle or a browser would.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use buswatch_core::config::ServerConfig;
use buswatch_server::{AppState, Listeners, serve};
use buswatch_types::{Bus, ServerMessage, ViewerMessage, WindowBounds};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

struct TestServer {
    state: Arc<AppState>,
    ingest: SocketAddr,
    viewer: SocketAddr,
    shutdown: CancellationToken,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn start_test_server() -> TestServer {
    let config = ServerConfig {
        host: String::from("127.0.0.1"),
        ingest_port: 0,
        viewer_port: 0,
        broadcast_interval_ms: 25,
    };
    let listeners = Listeners::bind(&config).await.unwrap();
    let ingest = listeners.ingest_addr().unwrap();
    let viewer = listeners.viewer_addr().unwrap();

    let state = Arc::new(AppState::new(config.broadcast_interval()));
    let shutdown = CancellationToken::new();
    tokio::spawn(serve(listeners, Arc::clone(&state), shutdown.clone()));

    TestServer {
        state,
        ingest,
        viewer,
        shutdown,
    }
}

async fn connect(addr: SocketAddr) -> Client {
    let (ws, _) = connect_async(format!("ws://{addr}/")).await.unwrap();
    ws
}

async fn send_json(ws: &mut Client, value: &impl serde::Serialize) {
    let json = serde_json::to_string(value).unwrap();
    ws.send(Message::Text(json.into())).await.unwrap();
}

async fn send_raw(ws: &mut Client, raw: &str) {
    ws.send(Message::Text(raw.to_owned().into())).await.unwrap();
}

fn bounds_update(south: f64, north: f64, west: f64, east: f64) -> ViewerMessage {
    ViewerMessage::NewBounds {
        data: WindowBounds::new(south, north, west, east),
    }
}

/// Read server messages until one satisfies `wanted`, failing after
/// [`WAIT`].
async fn wait_for(ws: &mut Client, wanted: impl Fn(&ServerMessage) -> bool) -> ServerMessage {
    let search = async {
        while let Some(frame) = ws.next().await {
            let frame = frame.unwrap();
            let Ok(text) = frame.to_text() else { continue };
            let Ok(message) = serde_json::from_str::<ServerMessage>(text) else {
                continue;
            };
            if wanted(&message) {
                return message;
            }
        }
        panic!("connection closed before the expected message arrived");
    };
    tokio::time::timeout(WAIT, search)
        .await
        .expect("timed out waiting for server message")
}

fn lists_bus(message: &ServerMessage, id: &str) -> bool {
    matches!(message, ServerMessage::Buses { buses } if buses.iter().any(|b| b.bus_id == id))
}

fn is_buses_without(message: &ServerMessage, id: &str) -> bool {
    matches!(message, ServerMessage::Buses { .. }) && !lists_bus(message, id)
}

#[tokio::test]
async fn viewer_sees_bus_only_inside_its_bounds() {
    let server = start_test_server().await;
    let mut vehicle = connect(server.ingest).await;
    let mut viewer = connect(server.viewer).await;

    send_raw(
        &mut vehicle,
        r#"{"busId":"A1","lat":55.75,"lng":37.60,"route":"1"}"#,
    )
    .await;
    send_json(&mut viewer, &bounds_update(55.70, 55.80, 37.50, 37.70)).await;

    let seen = wait_for(&mut viewer, |m| lists_bus(m, "A1")).await;
    let ServerMessage::Buses { buses } = seen else {
        panic!("expected a Buses message");
    };
    let a1 = buses.iter().find(|b| b.bus_id == "A1").unwrap();
    assert_eq!(a1.route, "1");

    send_json(&mut viewer, &bounds_update(10.0, 11.0, 10.0, 11.0)).await;
    wait_for(&mut viewer, |m| is_buses_without(m, "A1")).await;
}

#[tokio::test]
async fn latest_position_wins() {
    let server = start_test_server().await;
    let mut vehicle = connect(server.ingest).await;
    let mut viewer = connect(server.viewer).await;
    send_json(&mut viewer, &bounds_update(-90.0, 90.0, -180.0, 180.0)).await;

    let first = Bus {
        bus_id: String::from("B7"),
        lat: 1.0,
        lng: 2.0,
        route: String::from("7"),
    };
    let second = Bus {
        lat: 3.0,
        lng: 4.0,
        ..first.clone()
    };
    send_json(&mut vehicle, &first).await;
    send_json(&mut vehicle, &second).await;

    let moved = wait_for(&mut viewer, |m| {
        matches!(m, ServerMessage::Buses { buses }
            if buses.iter().any(|b| b.bus_id == "B7" && (b.lat - 3.0).abs() < f64::EPSILON))
    })
    .await;
    let ServerMessage::Buses { buses } = moved else {
        panic!("expected a Buses message");
    };
    assert_eq!(buses.iter().filter(|b| b.bus_id == "B7").count(), 1);
    assert_eq!(server.state.registry.len().await, 1);
}

#[tokio::test]
async fn malformed_telemetry_gets_errors_and_connection_survives() {
    let server = start_test_server().await;
    let mut vehicle = connect(server.ingest).await;

    send_raw(&mut vehicle, "qwe").await;
    let reply = wait_for(&mut vehicle, |m| matches!(m, ServerMessage::Errors { .. })).await;
    assert_eq!(
        reply,
        ServerMessage::Errors {
            errors: vec![String::from("invalid JSON")]
        }
    );

    send_raw(
        &mut vehicle,
        r#"{"busId":"123","lat":"qwe","lng":"qwe","route":"123"}"#,
    )
    .await;
    let reply = wait_for(&mut vehicle, |m| matches!(m, ServerMessage::Errors { .. })).await;
    assert_eq!(
        reply,
        ServerMessage::Errors {
            errors: vec![
                String::from("lat must be a number"),
                String::from("lng must be a number"),
            ]
        }
    );
    assert!(server.state.registry.is_empty().await);

    // The same connection still accepts valid telemetry.
    send_raw(
        &mut vehicle,
        r#"{"busId":"C3","lat":5.0,"lng":6.0,"route":"3"}"#,
    )
    .await;
    let stored = tokio::time::timeout(WAIT, async {
        loop {
            if server.state.registry.get("C3").await.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(stored.is_ok());
}

#[tokio::test]
async fn malformed_bounds_get_errors_and_viewport_is_kept() {
    let server = start_test_server().await;
    let mut vehicle = connect(server.ingest).await;
    let mut viewer = connect(server.viewer).await;

    send_raw(
        &mut vehicle,
        r#"{"busId":"A1","lat":55.75,"lng":37.60,"route":"1"}"#,
    )
    .await;
    send_json(&mut viewer, &bounds_update(55.70, 55.80, 37.50, 37.70)).await;
    wait_for(&mut viewer, |m| lists_bus(m, "A1")).await;

    send_raw(
        &mut viewer,
        r#"{"msgType":"newBounds","data":{"north_lat":"qweqwe","west_lng":37.5,"east_lng":37.6}}"#,
    )
    .await;
    let reply = wait_for(&mut viewer, |m| matches!(m, ServerMessage::Errors { .. })).await;
    assert_eq!(
        reply,
        ServerMessage::Errors {
            errors: vec![
                String::from("data.south_lat is required"),
                String::from("data.north_lat must be a number"),
            ]
        }
    );

    let next = wait_for(&mut viewer, |m| matches!(m, ServerMessage::Buses { .. })).await;
    assert!(lists_bus(&next, "A1"));
}

#[tokio::test]
async fn closing_one_viewer_leaves_others_running() {
    let server = start_test_server().await;
    let mut vehicle = connect(server.ingest).await;
    let mut stays = connect(server.viewer).await;
    let mut leaves = connect(server.viewer).await;

    send_raw(
        &mut vehicle,
        r#"{"busId":"D4","lat":0.5,"lng":0.5,"route":"4"}"#,
    )
    .await;
    send_json(&mut stays, &bounds_update(0.0, 1.0, 0.0, 1.0)).await;
    send_json(&mut leaves, &bounds_update(0.0, 1.0, 0.0, 1.0)).await;
    wait_for(&mut leaves, |m| lists_bus(m, "D4")).await;

    leaves.close(None).await.unwrap();
    drop(leaves);

    wait_for(&mut stays, |m| lists_bus(m, "D4")).await;
    wait_for(&mut stays, |m| lists_bus(m, "D4")).await;
}

#[tokio::test]
async fn disconnected_bus_stays_in_snapshots() {
    let server = start_test_server().await;
    let mut vehicle = connect(server.ingest).await;
    send_raw(
        &mut vehicle,
        r#"{"busId":"E5","lat":0.5,"lng":0.5,"route":"5"}"#,
    )
    .await;
    vehicle.close(None).await.unwrap();
    drop(vehicle);

    let mut viewer = connect(server.viewer).await;
    send_json(&mut viewer, &bounds_update(0.0, 1.0, 0.0, 1.0)).await;
    wait_for(&mut viewer, |m| lists_bus(m, "E5")).await;
}
