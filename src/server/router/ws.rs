use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use remixpilot_event_bus::EventBus;
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::server::ServeState;

pub(crate) fn router() -> Router<ServeState> {
    Router::new().route("/ws", get(websocket_handler))
}

async fn websocket_handler(
    State(state): State<ServeState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Forwards every run event to the client until either side goes away.
async fn handle_socket(socket: WebSocket, state: ServeState) {
    let mut events = state.bus.subscribe();
    let (mut sender, mut receiver) = socket.split();

    let welcome = json!({
        "type": "connected",
        "data": {
            "sessionId": Uuid::new_v4().to_string(),
            "serverVersion": env!("CARGO_PKG_VERSION"),
            "running": state.controller.is_running(),
        },
        "timestamp": Utc::now().to_rfc3339(),
    });
    if sender.send(Message::Text(welcome.to_string())).await.is_err() {
        return;
    }
    debug!(target: "ws", "observer connected");

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    let frame = event.to_wire().to_string();
                    if sender.send(Message::Text(frame)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(target: "ws", skipped, "observer fell behind; events dropped");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Ping(payload))) => {
                    if sender.send(Message::Pong(payload)).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!(target: "ws", ?frame, "observer closed the socket");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    debug!(target: "ws", ?err, "websocket error");
                    break;
                }
                None => break,
            },
        }
    }
    debug!(target: "ws", "observer disconnected");
}
