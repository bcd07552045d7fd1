//! WebSocket connection handling.

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use inkshare_core::{ClientMessage, outbox};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::routes::AppState;

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle a WebSocket connection for its whole lifetime.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let id = Uuid::new_v4();
    info!("New connection: {}", id);

    let (mut sender, mut receiver) = socket.split();
    let (outbox_tx, mut outbox_rx) = outbox(state.outbox_capacity);

    if state.hub.connect(id, outbox_tx).await.is_err() {
        warn!("Hub unavailable, dropping connection {}", id);
        return;
    }

    // Writer: drains this connection's outbox so the hub never waits on the socket.
    let mut writer = tokio::spawn(async move {
        while let Some(msg) = outbox_rx.recv().await {
            let json = match msg.to_json() {
                Ok(json) => json,
                Err(e) => {
                    warn!("Failed to encode {}: {}", msg.kind(), e);
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
        let _ = sender.close().await;
    });

    loop {
        tokio::select! {
            frame = receiver.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => match ClientMessage::from_json(text.as_str()) {
                        Ok(msg) => {
                            if state.hub.inbound(id, msg).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!("Invalid message from {}: {}", id, e),
                    },
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // Ignore binary, ping/pong
                    Some(Err(e)) => {
                        warn!("WebSocket error for {}: {}", id, e);
                        break;
                    }
                }
            }
            _ = &mut writer => {
                debug!("Writer for {} finished", id);
                break;
            }
        }
    }

    let _ = state.hub.disconnect(id).await;
    writer.abort();
    info!("Connection closed: {}", id);
}
