//! HTTP routes.

use std::path::Path;

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use inkshare_core::CoordinatorStats;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::hub::HubHandle;
use crate::ws::ws_handler;

/// Shared application state
#[derive(Debug, Clone)]
pub struct AppState {
    pub hub: HubHandle,
    /// Per-connection outbox length
    pub outbox_capacity: usize,
}

/// Build the application router.
///
/// With a static directory the client is served from `/`, otherwise `/`
/// returns a short banner.
pub fn router(state: AppState, static_dir: Option<&Path>) -> Router {
    let router = Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .route("/stats", get(stats));

    let router = match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router.route("/", get(index)),
    };

    router
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Index page
async fn index() -> &'static str {
    "InkShare Sync Server - Connect via WebSocket at /ws"
}

/// Health check
async fn health() -> &'static str {
    "ok"
}

/// Document and roster counters
async fn stats(State(state): State<AppState>) -> Result<Json<CoordinatorStats>, StatusCode> {
    state
        .hub
        .stats()
        .await
        .map(Json)
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{SinkExt, StreamExt};
    use inkshare_core::{ClientMessage, Point, ServerMessage, Stroke};
    use std::net::SocketAddr;
    use std::time::Duration;
    use tokio::net::{TcpListener, TcpStream};
    use tokio::time::timeout;
    use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite};

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    async fn spawn_server() -> SocketAddr {
        let state = AppState {
            hub: HubHandle::spawn(64),
            outbox_capacity: 64,
        };
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state, None)).await.unwrap();
        });
        addr
    }

    async fn connect(addr: SocketAddr) -> Client {
        let (ws, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
        ws
    }

    async fn next_message(ws: &mut Client) -> ServerMessage {
        loop {
            let frame = timeout(Duration::from_secs(5), ws.next())
                .await
                .expect("timed out waiting for frame")
                .expect("stream ended")
                .expect("websocket error");
            if let tungstenite::Message::Text(text) = frame {
                return ServerMessage::from_json(text.as_str()).unwrap();
            }
        }
    }

    async fn send(ws: &mut Client, msg: &ClientMessage) {
        ws.send(tungstenite::Message::text(msg.to_json().unwrap()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_two_clients_draw_and_undo() {
        let addr = spawn_server().await;

        let mut a = connect(addr).await;
        assert_eq!(next_message(&mut a).await.kind(), "init_state");
        assert_eq!(next_message(&mut a).await.kind(), "user_list");

        let mut b = connect(addr).await;
        assert_eq!(next_message(&mut b).await.kind(), "init_state");
        assert_eq!(next_message(&mut b).await.kind(), "user_list");
        assert_eq!(next_message(&mut a).await.kind(), "user_list");
        assert_eq!(next_message(&mut a).await.kind(), "user_joined");

        let start = Point::new(1.0, 1.0, "#000000", 3.0);
        send(&mut a, &ClientMessage::StartStroke(start.clone())).await;
        send(
            &mut a,
            &ClientMessage::EndStroke {
                stroke: Stroke::from_points(vec![start, Point::new(2.0, 2.0, "#000000", 3.0)]),
            },
        )
        .await;

        assert_eq!(next_message(&mut b).await.kind(), "remote_stroke_start");
        match next_message(&mut b).await {
            ServerMessage::RemoteStrokeEnd { id, stroke, .. } => {
                assert_eq!(id, 0);
                assert_eq!(stroke.len(), 2);
            }
            other => panic!("unexpected {}", other.kind()),
        }

        // Malformed frames are dropped without closing the connection.
        b.send(tungstenite::Message::text(r#"{"type":"bogus"}"#.to_string()))
            .await
            .unwrap();
        send(&mut b, &ClientMessage::Undo).await;
        for ws in [&mut a, &mut b] {
            match next_message(ws).await {
                ServerMessage::RemoteUndo { operations } => assert!(operations.is_empty()),
                other => panic!("unexpected {}", other.kind()),
            }
        }
    }

    #[tokio::test]
    async fn test_close_announces_departure() {
        let addr = spawn_server().await;
        let mut a = connect(addr).await;
        next_message(&mut a).await;
        next_message(&mut a).await;

        let mut b = connect(addr).await;
        next_message(&mut a).await;
        let b_id = match next_message(&mut a).await {
            ServerMessage::UserJoined { user_id, .. } => user_id,
            other => panic!("unexpected {}", other.kind()),
        };

        b.close(None).await.unwrap();

        match next_message(&mut a).await {
            ServerMessage::UserList { users } => assert!(users.iter().all(|u| u.id != b_id)),
            other => panic!("unexpected {}", other.kind()),
        }
        match next_message(&mut a).await {
            ServerMessage::UserLeft { user_id } => assert_eq!(user_id, b_id),
            other => panic!("unexpected {}", other.kind()),
        }
    }
}
