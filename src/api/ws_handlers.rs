//! WebSocket handler for the real-time notification channel
//!
//! Each connection is one channel handle in the presence registry. Opening
//! the socket registers the channel and triggers the queued-notification
//! sweep; closing it (or failing a ping) unregisters the channel.

use super::handlers::TrackerState;
use crate::notify::ChannelHandle;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::time::{interval, Duration};
use tracing::{debug, warn};
use uuid::Uuid;

/// Query parameters for the notification channel
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// The user this channel belongs to
    pub user_id: Uuid,
}

/// WebSocket upgrade handler for `/ws/notifications`
pub async fn ws_notifications(
    ws: WebSocketUpgrade,
    State(state): State<TrackerState>,
    Query(query): Query<WsQuery>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state, query.user_id))
}

/// Handle an individual notification channel
async fn handle_ws(socket: WebSocket, state: TrackerState, user_id: Uuid) {
    let (handle, mut push_rx) = ChannelHandle::new();
    let channel_id = handle.id;

    // Registering makes the user present and kicks off the catch-up sweep
    // for anything queued while they were offline
    state.delivery.on_channel_open(user_id, handle).await;

    debug!(user = %user_id, channel = %channel_id, "notification channel opened");

    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Ping interval (30s)
    let mut ping_interval = interval(Duration::from_secs(30));
    // Skip the first immediate tick
    ping_interval.tick().await;

    loop {
        tokio::select! {
            // Forward pushed notifications to the client
            pushed = push_rx.recv() => {
                match pushed {
                    Some(notification) => {
                        match serde_json::to_string(&notification) {
                            Ok(json) => {
                                if ws_sender.send(Message::Text(json.into())).await.is_err() {
                                    debug!("WebSocket send failed, client disconnected");
                                    break;
                                }
                            }
                            Err(e) => {
                                warn!("Failed to serialize notification: {}", e);
                            }
                        }
                    }
                    None => {
                        debug!("push channel closed, shutting down WebSocket");
                        break;
                    }
                }
            }

            // Send periodic pings to detect dead clients
            _ = ping_interval.tick() => {
                if ws_sender.send(Message::Ping(vec![].into())).await.is_err() {
                    debug!("Ping failed, client disconnected");
                    break;
                }
            }

            // Handle incoming messages from the client (Pong, Close)
            msg = ws_receiver.next() => {
                match msg {
                    Some(Ok(Message::Pong(_))) => {
                        // Client is alive
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("WebSocket client disconnected");
                        break;
                    }
                    Some(Err(e)) => {
                        debug!("WebSocket error: {}", e);
                        break;
                    }
                    _ => {
                        // Ignore text/binary messages from clients
                    }
                }
            }
        }
    }

    state.delivery.on_channel_close(user_id, channel_id);
    debug!(user = %user_id, channel = %channel_id, "notification channel closed");
}
