//! ---
//! twin_section: "05-networking-external-interfaces"
//! twin_subsection: "module"
//! twin_type: "source"
//! twin_scope: "code"
//! twin_description: "WebSocket event stream and command intake."
//! twin_version: "v0.1.0"
//! twin_owner: "tbd"
//! ---
use std::sync::Arc;

use arm_twin_sim::{ClientCommand, TwinEngine, TwinEvent};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::routing::get;
use axum::Router;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Reply sent to a single client whose command could not be parsed.
pub const INVALID_COMMAND_REPLY: &str = r#"{"event":"error","data":"invalid command"}"#;

/// Routes serving the subscriber stream at `/ws`.
pub fn router() -> Router<Arc<TwinEngine>> {
    Router::new().route("/ws", get(upgrade_handler))
}

async fn upgrade_handler(
    ws: WebSocketUpgrade,
    State(engine): State<Arc<TwinEngine>>,
) -> axum::response::Response {
    ws.on_upgrade(|socket| client_loop(socket, engine))
}

async fn client_loop(mut socket: WebSocket, engine: Arc<TwinEngine>) {
    let (snapshot, mut subscription) = engine.subscribe();
    if let Some(metrics) = engine.metrics() {
        metrics.subscriber_connected();
    }
    info!(
        subscribers = engine.broadcaster().subscriber_count(),
        "subscriber connected"
    );

    if send_event(&mut socket, &TwinEvent::InitialData(snapshot))
        .await
        .is_ok()
    {
        serve_client(&mut socket, &mut subscription, &engine).await;
    }

    if let Some(metrics) = engine.metrics() {
        metrics.subscriber_disconnected();
    }
    info!("subscriber disconnected");
}

async fn serve_client(
    socket: &mut WebSocket,
    subscription: &mut broadcast::Receiver<TwinEvent>,
    engine: &TwinEngine,
) {
    loop {
        tokio::select! {
            event = subscription.recv() => {
                let event = match event {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "subscriber lagged behind; resending snapshot");
                        let (snapshot, fresh) = engine.subscribe();
                        *subscription = fresh;
                        TwinEvent::InitialData(snapshot)
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                if send_event(socket, &event).await.is_err() {
                    break;
                }
            }
            message = socket.recv() => {
                let Some(Ok(message)) = message else {
                    break;
                };

                match message {
                    Message::Text(text) => match serde_json::from_str::<ClientCommand>(&text) {
                        Ok(command) => {
                            debug!(?command, "client command received");
                            engine.handle_command(command);
                        }
                        Err(err) => {
                            warn!(error = %err, "invalid websocket command payload");
                            if reply_invalid(socket).await.is_err() {
                                break;
                            }
                        }
                    },
                    Message::Binary(_) => {
                        warn!("binary websocket frame rejected");
                        if reply_invalid(socket).await.is_err() {
                            break;
                        }
                    }
                    Message::Ping(payload) => {
                        if socket.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Message::Pong(_) => {}
                    Message::Close(_) => break,
                }
            }
        }
    }
}

async fn send_event(socket: &mut WebSocket, event: &TwinEvent) -> Result<(), axum::Error> {
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(err) => {
            warn!(event = event.name(), error = %err, "failed to serialise event");
            return Ok(());
        }
    };
    socket.send(Message::Text(text)).await
}

async fn reply_invalid(socket: &mut WebSocket) -> Result<(), axum::Error> {
    socket
        .send(Message::Text(INVALID_COMMAND_REPLY.to_owned()))
        .await
}
