//! End-to-end: HTTP ingestion through storage to live WebSocket viewers

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use telemetry_hub::api::{build_router, ApiConfig, AppState};
use telemetry_hub::clock::FixedClock;
use telemetry_hub::storage::{StorageConfig, StorageEngine};
use telemetry_hub::websocket::{ConnectionHub, HubConfig};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct Server {
    base: String,
    ws_url: String,
    storage: Arc<StorageEngine>,
    hub: Arc<ConnectionHub>,
    client: reqwest::Client,
    _dir: TempDir,
}

async fn start_server() -> Server {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(
        StorageEngine::new(StorageConfig::new(dir.path()))
            .await
            .unwrap(),
    );
    let hub = Arc::new(ConnectionHub::new(HubConfig::default()));
    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 30, 0).unwrap(),
    ));

    let state = AppState::with_parts(
        Arc::clone(&storage),
        Arc::clone(&hub),
        clock,
        ApiConfig::new("127.0.0.1", 0),
    );
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    Server {
        base: format!("http://{}", addr),
        ws_url: format!("ws://{}/ws", addr),
        storage,
        hub,
        client: reqwest::Client::new(),
        _dir: dir,
    }
}

async fn next_json(socket: &mut Socket) -> Value {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("socket closed")
            .unwrap();
        if let Message::Text(text) = message {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn assert_silent(socket: &mut Socket) {
    let next = tokio::time::timeout(Duration::from_millis(200), socket.next()).await;
    assert!(next.is_err(), "unexpected frame: {:?}", next);
}

/// Connect and consume the acknowledgement
async fn subscribe(server: &Server) -> Socket {
    let (mut socket, _) = connect_async(&server.ws_url).await.unwrap();
    assert_eq!(
        next_json(&mut socket).await,
        json!({"type": "connection_response", "status": "connected"})
    );
    socket
}

async fn post(server: &Server, body: Value) -> reqwest::Response {
    server
        .client
        .post(format!("{}/api/telemetry", server.base))
        .json(&body)
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_batch_reaches_connected_subscriber_once() {
    let server = start_server().await;
    let mut early = subscribe(&server).await;

    let response = post(
        &server,
        json!({"timestamp": "2024-01-01T00:00:00Z", "signals": {"sine_wave": 5.5}}),
    )
    .await;
    assert_eq!(response.status(), 200);
    assert_eq!(response.json::<Value>().await.unwrap(), json!({"status": "success"}));

    assert_eq!(
        next_json(&mut early).await,
        json!({
            "type": "telemetry_update",
            "timestamp": "2024-01-01T00:00:00Z",
            "signals": {"sine_wave": 5.5}
        })
    );
    assert_silent(&mut early).await;

    // A late subscriber gets nothing replayed but can read the batch back
    let mut late = subscribe(&server).await;
    assert_silent(&mut late).await;

    let history: Value = server
        .client
        .get(format!("{}/api/telemetry?hours=1", server.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(
        history,
        json!({"sine_wave": [{"timestamp": "2024-01-01T00:00:00Z", "value": 5.5}]})
    );
}

#[tokio::test]
async fn test_rejected_batch_is_not_broadcast() {
    let server = start_server().await;
    let mut socket = subscribe(&server).await;

    let response = post(
        &server,
        json!({"timestamp": "2024-01-01T00:00:00Z", "signals": {}}),
    )
    .await;
    assert_eq!(response.status(), 400);

    assert_silent(&mut socket).await;
    assert_eq!(server.storage.point_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_concurrent_disjoint_batches_all_persist() {
    let server = Arc::new(start_server().await);
    let mut socket = subscribe(&server).await;

    let writers: Vec<_> = (0..16)
        .map(|i| {
            let server = Arc::clone(&server);
            tokio::spawn(async move {
                let mut signals = serde_json::Map::new();
                signals.insert(format!("producer_{:02}", i), json!(i as f64));
                let body = json!({"timestamp": "2024-01-01T00:10:00Z", "signals": signals});
                post(&server, body).await.status()
            })
        })
        .collect();

    for writer in writers {
        assert_eq!(writer.await.unwrap(), 200);
    }

    assert_eq!(server.storage.point_count().await.unwrap(), 16);

    let names: Vec<String> = server
        .client
        .get(format!("{}/api/signals", server.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let expected: Vec<String> = (0..16).map(|i| format!("producer_{:02}", i)).collect();
    assert_eq!(names, expected);

    let mut seen = Vec::new();
    for _ in 0..16 {
        let update = next_json(&mut socket).await;
        assert_eq!(update["type"], "telemetry_update");
        let signals = update["signals"].as_object().unwrap();
        assert_eq!(signals.len(), 1);
        seen.extend(signals.keys().cloned());
    }
    seen.sort();
    assert_eq!(seen, expected);
}

#[tokio::test]
async fn test_ping_and_bad_input() {
    let server = start_server().await;
    let mut socket = subscribe(&server).await;

    socket
        .send(Message::Text(r#"{"type":"ping"}"#.to_string()))
        .await
        .unwrap();
    assert_eq!(next_json(&mut socket).await, json!({"type": "pong"}));

    socket
        .send(Message::Text("hello?".to_string()))
        .await
        .unwrap();
    assert_eq!(next_json(&mut socket).await["type"], "error");

    // Still subscribed after the bad frame
    socket
        .send(Message::Text(r#"{"type":"ping"}"#.to_string()))
        .await
        .unwrap();
    assert_eq!(next_json(&mut socket).await, json!({"type": "pong"}));
}

#[tokio::test]
async fn test_closed_socket_is_unregistered() {
    let server = start_server().await;
    let mut socket = subscribe(&server).await;
    assert_eq!(server.hub.connection_count().await, 1);

    socket.close(None).await.unwrap();
    drop(socket);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while server.hub.connection_count().await > 0 {
        assert!(tokio::time::Instant::now() < deadline, "subscriber never removed");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
