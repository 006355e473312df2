//! ---
//! twin_section: "15-testing-qa-runbook"
//! twin_subsection: "module"
//! twin_type: "source"
//! twin_scope: "code"
//! twin_description: "End-to-end HTTP and WebSocket coverage for the transport."
//! twin_version: "v0.1.0"
//! twin_owner: "tbd"
//! ---
use std::sync::Arc;

use arm_twin_common::config::{HealthConfig, SimulationConfig};
use arm_twin_metrics::{new_registry, SharedRegistry, TwinMetrics};
use arm_twin_net::{TwinServerBuilder, TwinServerHandle};
use arm_twin_sim::{EventBroadcaster, FaultChannel, TwinEngine};
use futures_util::{SinkExt, StreamExt};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start(metrics: Option<TwinMetrics>) -> (Arc<TwinEngine>, TwinServerHandle) {
    start_with_buffer(metrics, 256).await
}

async fn start_with_buffer(
    metrics: Option<TwinMetrics>,
    event_buffer: usize,
) -> (Arc<TwinEngine>, TwinServerHandle) {
    let simulation = SimulationConfig {
        random_seed: Some(99),
        ..SimulationConfig::default()
    };
    let engine = Arc::new(TwinEngine::new(
        &simulation,
        HealthConfig::default(),
        EventBroadcaster::new(event_buffer),
        metrics,
    ));
    let handle = TwinServerBuilder::new("127.0.0.1:0".parse().unwrap(), engine.clone())
        .spawn()
        .await
        .unwrap();
    (engine, handle)
}

async fn connect(handle: &TwinServerHandle) -> Socket {
    let url = format!("ws://{}/ws", handle.local_addr());
    let (socket, _response) = connect_async(&url).await.unwrap();
    socket
}

/// Next text frame decoded as JSON, skipping control frames.
async fn next_json(socket: &mut Socket) -> Value {
    loop {
        let message = timeout(Duration::from_secs(2), socket.next())
            .await
            .expect("timed out waiting for websocket frame")
            .unwrap()
            .unwrap();
        if let WsMessage::Text(text) = message {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn next_event(socket: &mut Socket, name: &str) -> Value {
    loop {
        let value = next_json(socket).await;
        if value["event"] == name {
            return value["data"].clone();
        }
    }
}

async fn send(socket: &mut Socket, value: Value) {
    socket.send(WsMessage::Text(value.to_string())).await.unwrap();
}

fn gauge(registry: &SharedRegistry, name: &str) -> f64 {
    registry
        .gather()
        .iter()
        .find(|family| family.get_name() == name)
        .map(|family| family.get_metric()[0].get_gauge().get_value())
        .unwrap_or_default()
}

#[tokio::test]
async fn subscriber_receives_initial_snapshot_first() {
    let (engine, handle) = start(None).await;
    engine.toggle_fault(FaultChannel::CommDelay);

    let mut socket = connect(&handle).await;
    let first = next_json(&mut socket).await;
    assert_eq!(first["event"], "initialData");
    let data = &first["data"];
    assert_eq!(data["frames"].as_array().unwrap().len(), 20);
    assert_eq!(data["faults"]["commDelay"], "Warning");
    assert_eq!(data["faults"]["overheating"], "OK");
    assert_eq!(data["isShutdown"], false);
    assert_eq!(data["logs"][0]["severity"], "HIGH");
    assert_eq!(data["logs"][0]["message"], "Communication Delay - Warning");
    assert!(data["frames"][0]["anomaly_score"].is_number());

    drop(socket);
    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn toggle_command_broadcasts_to_every_subscriber() {
    let (_engine, handle) = start(None).await;
    let mut commander = connect(&handle).await;
    let mut observer = connect(&handle).await;
    next_event(&mut commander, "initialData").await;
    next_event(&mut observer, "initialData").await;

    send(
        &mut commander,
        json!({"command": "toggleFault", "fault": "overheating"}),
    )
    .await;

    for socket in [&mut commander, &mut observer] {
        let logs = next_event(socket, "logUpdate").await;
        assert_eq!(logs[0]["severity"], "HIGH");
        assert_eq!(logs[0]["message"], "Motor Overheating - Warning");
        let faults = next_event(socket, "faultUpdate").await;
        assert_eq!(faults["overheating"], "Warning");
    }

    drop(commander);
    drop(observer);
    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn shutdown_and_restart_commands_round_trip() {
    let (engine, handle) = start(None).await;
    let mut socket = connect(&handle).await;
    next_event(&mut socket, "initialData").await;

    send(&mut socket, json!({"command": "shutdownSystem"})).await;
    let logs = next_event(&mut socket, "logUpdate").await;
    assert_eq!(logs[0]["message"], "System manually shutdown");
    let reason = next_event(&mut socket, "shutdown").await;
    assert!(reason.as_str().unwrap().contains("manually"));
    assert!(engine.is_shutdown());

    send(&mut socket, json!({"command": "restartSystem"})).await;
    let reset = next_event(&mut socket, "systemReset").await;
    assert_eq!(reset["isShutdown"], false);
    assert_eq!(reset["frames"].as_array().unwrap().len(), 20);
    assert!(!engine.is_shutdown());

    drop(socket);
    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn malformed_commands_are_answered_privately() {
    let (engine, handle) = start(None).await;
    let mut offender = connect(&handle).await;
    let mut bystander = connect(&handle).await;
    next_event(&mut offender, "initialData").await;
    next_event(&mut bystander, "initialData").await;

    send(&mut offender, json!({"command": "toggleFault", "fault": "laserMisalignment"})).await;
    let reply = next_json(&mut offender).await;
    assert_eq!(reply, json!({"event": "error", "data": "invalid command"}));

    offender.send(WsMessage::Text("not json".into())).await.unwrap();
    let reply = next_json(&mut offender).await;
    assert_eq!(reply["event"], "error");

    assert!(engine.logs().is_empty());
    assert!(timeout(Duration::from_millis(100), bystander.next())
        .await
        .is_err());

    drop(offender);
    drop(bystander);
    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn rest_log_lifecycle() {
    let (engine, handle) = start(None).await;
    let client = Client::new();
    let base = format!("http://{}", handle.local_addr());
    let mut socket = connect(&handle).await;
    next_event(&mut socket, "initialData").await;

    let created = client
        .post(format!("{base}/logs"))
        .json(&json!({"severity": "INFO", "message": "x"}))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::CREATED);
    let entry: Value = created.json().await.unwrap();
    assert_eq!(entry["message"], "x");
    let broadcast = next_event(&mut socket, "logUpdate").await;
    assert_eq!(broadcast.as_array().unwrap().len(), 1);

    let rejected = client
        .post(format!("{base}/api/logs"))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);
    let unknown = client
        .post(format!("{base}/api/logs"))
        .json(&json!({"severity": "LOW", "message": "x"}))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);
    assert_eq!(engine.logs().len(), 1);

    let listed: Vec<Value> = client
        .get(format!("{base}/api/logs"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);

    let cleared = client.delete(format!("{base}/logs")).send().await.unwrap();
    assert_eq!(cleared.status(), StatusCode::OK);
    let logs = engine.logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].message, "Logs cleared");

    drop(socket);
    drop(client);
    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn state_endpoint_mirrors_initial_snapshot() {
    let (engine, handle) = start(None).await;
    engine.tick();
    let state: Value = reqwest::get(format!("http://{}/api/state", handle.local_addr()))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(state["frames"].as_array().unwrap().len(), 20);
    assert_eq!(state["isShutdown"], false);
    assert_eq!(state["faults"].as_object().unwrap().len(), 6);
    assert!(state["health"].as_f64().unwrap() <= 100.0);
    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn subscriber_gauge_tracks_connections() {
    let registry = new_registry();
    let metrics = TwinMetrics::new(registry.clone()).unwrap();
    let (_engine, handle) = start(Some(metrics)).await;

    let mut socket = connect(&handle).await;
    next_event(&mut socket, "initialData").await;
    assert_eq!(gauge(&registry, "arm_twin_subscribers"), 1.0);

    socket.close(None).await.unwrap();
    drop(socket);
    let mut remaining = 1.0;
    for _ in 0..50 {
        remaining = gauge(&registry, "arm_twin_subscribers");
        if remaining == 0.0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(remaining, 0.0);
    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn lagging_subscriber_is_resynced_with_a_snapshot() {
    let (engine, handle) = start_with_buffer(None, 4).await;
    let mut socket = connect(&handle).await;
    next_event(&mut socket, "initialData").await;

    // The test runtime is single threaded, so the connection task cannot
    // drain its queue until this burst is over.
    for _ in 0..20 {
        engine.tick();
    }
    engine.toggle_fault(FaultChannel::EncoderLoss);

    let snapshot = next_event(&mut socket, "initialData").await;
    assert_eq!(snapshot["faults"]["encoderLoss"], "Warning");
    assert_eq!(snapshot["frames"].as_array().unwrap().len(), 20);
    assert_eq!(snapshot["logs"][0]["message"], "Encoder Signal Loss - Warning");

    engine.toggle_fault(FaultChannel::EncoderLoss);
    let faults = next_event(&mut socket, "faultUpdate").await;
    assert_eq!(faults["encoderLoss"], "Critical");

    drop(socket);
    handle.shutdown().await.unwrap();
}
