//! WebSocket handler for real-time state updates.
//!
//! The engine listener only does a non-blocking `broadcast::send`; each
//! connected client drains its own receiver, so a slow client lags (and
//! skips events) without ever holding up the engine.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use reabridge_core::{ControlEngine, ReaperState, Subscription};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::AppState;

/// Event type carrying a full state snapshot.
pub const STATE_EVENT: &str = "state";

/// WebSocket event sent to clients.
#[derive(Debug, Clone, Serialize)]
pub struct WebSocketEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub timestamp: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl WebSocketEvent {
    pub fn state(state: &ReaperState) -> Self {
        Self {
            event_type: STATE_EVENT.to_string(),
            timestamp: state.timestamp,
            data: serde_json::to_value(state).ok(),
        }
    }
}

/// Register an engine listener that republishes every changed snapshot.
pub(crate) fn forward_state_changes(
    engine: &ControlEngine,
    tx: broadcast::Sender<WebSocketEvent>,
) -> Subscription {
    engine.on_state_change(move |state| {
        // No receivers just means no client is connected.
        let _ = tx.send(WebSocketEvent::state(state));
    })
}

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle a WebSocket connection.
///
/// The client receives the current snapshot, then every change. Anything the
/// client sends is ignored; the connection ends when it closes.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (sender, mut receiver) = socket.split();

    // Subscribe before reading the snapshot so no change falls in between.
    let rx = state.ws_tx.subscribe();
    let initial = WebSocketEvent::state(&state.engine.get_state());
    let send_task = tokio::spawn(relay_events(sender, initial, rx));

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }

    send_task.abort();
}

/// Write `initial`, then each broadcast event, until the channel closes or
/// the client goes away. A lagging client skips the events it missed.
async fn relay_events<S>(
    mut sender: S,
    initial: WebSocketEvent,
    mut rx: broadcast::Receiver<WebSocketEvent>,
) where
    S: futures::Sink<Message> + Unpin,
{
    if send_event(&mut sender, &initial).await.is_err() {
        return;
    }
    loop {
        match rx.recv().await {
            Ok(event) => {
                if send_event(&mut sender, &event).await.is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                log::debug!("WebSocket client lagged, skipped {} events", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn send_event<S>(sender: &mut S, event: &WebSocketEvent) -> Result<(), S::Error>
where
    S: futures::Sink<Message> + Unpin,
{
    let msg = serde_json::to_string(event).unwrap_or_default();
    sender.send(Message::Text(msg)).await
}
