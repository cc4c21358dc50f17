//! WebSocket Handler
//!
//! Handles WebSocket upgrade requests and manages the connection lifecycle.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;

use super::hub::{ConnectionHub, Subscription};
use super::messages::{ClientMessage, ServerMessage};
use crate::api::AppState;

/// WebSocket upgrade handler
///
/// This is the entry point for WebSocket connections.
/// It upgrades the HTTP connection to WebSocket and starts message handling.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    let hub = Arc::clone(&state.ws_hub);
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

/// Handle an established WebSocket connection
async fn handle_socket(socket: WebSocket, hub: Arc<ConnectionHub>) {
    let (mut sender, mut receiver) = socket.split();

    let Subscription { id, mut frames } = match hub.register().await {
        Ok(subscription) => subscription,
        Err(e) => {
            tracing::warn!(error = %e, "Rejected WebSocket connection");
            if let Some(text) = encode(&ServerMessage::error(e.to_string())) {
                let _ = sender.send(Message::Text(text)).await;
            }
            let _ = sender.close().await;
            return;
        }
    };

    // The acknowledgement goes out before anything queued for this subscriber
    let ack_sent = match encode(&ServerMessage::connected()) {
        Some(text) => sender.send(Message::Text(text)).await.is_ok(),
        None => false,
    };
    if !ack_sent {
        tracing::debug!(subscriber_id = %id, "Failed to send connection acknowledgement");
        hub.unregister(&id).await;
        return;
    }

    let conn_id_for_send = id.clone();

    // Task to forward queued frames to the socket; ends when the hub drops
    // the subscriber or the socket stops accepting writes
    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = frames.recv().await {
            if sender.send(Message::Text(frame.to_string())).await.is_err() {
                tracing::debug!(
                    subscriber_id = %conn_id_for_send,
                    "WebSocket send failed, closing connection"
                );
                break;
            }
        }
    });

    let hub_for_recv = Arc::clone(&hub);
    let conn_id_for_recv = id.clone();

    // Task to receive messages from WebSocket and handle them
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(msg) => {
                    if !handle_ws_message(&hub_for_recv, &conn_id_for_recv, msg).await {
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!(
                        subscriber_id = %conn_id_for_recv,
                        error = %e,
                        "WebSocket receive error"
                    );
                    break;
                }
            }
        }
    });

    // Wait for either task to complete
    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
        }
        _ = &mut recv_task => {
            send_task.abort();
        }
    }

    hub.unregister(&id).await;
}

/// Handle a received WebSocket message
///
/// Returns false if the connection should be closed.
async fn handle_ws_message(hub: &ConnectionHub, subscriber_id: &str, message: Message) -> bool {
    match message {
        Message::Text(text) => {
            match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::Ping) => {
                    let _ = hub.send_to(subscriber_id, &ServerMessage::Pong).await;
                }
                Err(e) => {
                    tracing::debug!(
                        subscriber_id = %subscriber_id,
                        error = %e,
                        "Invalid client message"
                    );
                    // Keep the connection open
                    let reply = ServerMessage::error(format!("Invalid message format: {}", e));
                    let _ = hub.send_to(subscriber_id, &reply).await;
                }
            }
            true
        }
        Message::Binary(_) => {
            let reply = ServerMessage::error("Binary messages not supported");
            let _ = hub.send_to(subscriber_id, &reply).await;
            true
        }
        // Axum answers pings itself
        Message::Ping(_) | Message::Pong(_) => true,
        Message::Close(_) => {
            tracing::debug!(subscriber_id = %subscriber_id, "Client requested close");
            false
        }
    }
}

fn encode(message: &ServerMessage) -> Option<String> {
    match serde_json::to_string(message) {
        Ok(text) => Some(text),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize message");
            None
        }
    }
}
