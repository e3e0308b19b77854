//! HTTP and WebSocket routes.
//!
//! - `GET /ws`: subscribe to push notifications (`ping` text frames get `pong`)
//! - `GET /health`: liveness probe
//! - `GET /api/connections`: current subscriber count
//! - `GET /api/snapshot`: one freshly assembled snapshot

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use clawscope_core::hub::ConnectionState;
use clawscope_core::{
    BroadcastHub, CloseReason, SnapshotAssembler, SnapshotSource, TelemetrySnapshot,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Frames queued per connection before sends start waiting
const OUTBOUND_QUEUE: usize = 32;

#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<BroadcastHub>,
    pub assembler: Arc<SnapshotAssembler>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(|| async { "ok" }))
        .route("/api/connections", get(connections))
        .route("/api/snapshot", get(snapshot))
        .with_state(state)
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state.hub, socket))
}

async fn connections(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "connections": state.hub.connection_count() }))
}

async fn snapshot(
    State(state): State<AppState>,
) -> Result<Json<TelemetrySnapshot>, StatusCode> {
    let assembler = Arc::clone(&state.assembler);
    match tokio::task::spawn_blocking(move || assembler.assemble()).await {
        Ok(snapshot) => Ok(Json(snapshot)),
        Err(e) => {
            tracing::warn!(error = %e, "Snapshot request failed");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

async fn handle_socket(hub: Arc<BroadcastHub>, socket: WebSocket) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<String>(OUTBOUND_QUEUE);
    let write_timeout = hub.send_timeout();
    let write_task = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            match tokio::time::timeout(write_timeout, ws_sender.send(Message::Text(text))).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::debug!(error = %e, "WebSocket write failed");
                    return;
                }
                Err(_) => {
                    tracing::debug!("WebSocket write timed out");
                    return;
                }
            }
        }
        let _ = ws_sender.close().await;
    });

    let Some(subscriber) = hub.register(tx).await else {
        write_task.abort();
        return;
    };

    // Dashboards rarely send anything, so a drop by the hub must end the
    // connection without waiting for the next inbound frame
    let dropped_by_hub = loop {
        tokio::select! {
            frame = ws_receiver.next() => match frame {
                Some(Ok(Message::Text(text))) if text.trim() == "ping" => {
                    subscriber
                        .send("pong".to_string(), hub.send_timeout())
                        .await;
                }
                Some(Ok(Message::Close(_))) | None => break false,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(conn_id = subscriber.id(), error = %e, "WebSocket read error");
                    break false;
                }
            },
            () = subscriber.closed() => break true,
        }
    };

    let reason = match subscriber.state() {
        ConnectionState::Closing(reason) => reason,
        _ => CloseReason::ByClient,
    };
    hub.unregister(subscriber.id(), reason);
    drop(subscriber);
    if dropped_by_hub {
        tracing::debug!(reason = reason.as_str(), "Closing socket dropped by hub");
        write_task.abort();
    } else {
        let _ = write_task.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clawscope_core::Config;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn spawn_server() -> (std::net::SocketAddr, Arc<BroadcastHub>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("openclaw.json"),
            r#"{"agents":{"list":[{"id":"main","name":"Coordinator"}]}}"#,
        )
        .unwrap();
        let mut config = Config::default();
        config.openclaw.root = dir.path().to_path_buf();

        let assembler = Arc::new(SnapshotAssembler::new(&config));
        let hub = BroadcastHub::new(assembler.clone(), &config.hub);
        let app = router(AppState {
            hub: Arc::clone(&hub),
            assembler,
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (addr, hub, dir)
    }

    async fn get(addr: std::net::SocketAddr, path: &str) -> String {
        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_health_route() {
        let (addr, _hub, _dir) = spawn_server().await;
        let response = get(addr, "/health").await;
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.ends_with("ok"));
    }

    #[tokio::test]
    async fn test_connections_route() {
        let (addr, _hub, _dir) = spawn_server().await;
        let response = get(addr, "/api/connections").await;
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains(r#"{"connections":0}"#));
    }

    #[tokio::test]
    async fn test_snapshot_route() {
        let (addr, _hub, _dir) = spawn_server().await;
        let response = get(addr, "/api/snapshot").await;
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains(r#""mainAgentId":"main""#));
    }

    #[tokio::test]
    async fn test_socket_closes_when_hub_drops_subscriber() {
        let (addr, hub, _dir) = spawn_server().await;
        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        let request = "GET /ws HTTP/1.1\r\n\
            Host: localhost\r\n\
            Connection: Upgrade\r\n\
            Upgrade: websocket\r\n\
            Sec-WebSocket-Version: 13\r\n\
            Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\r\n";
        stream.write_all(request.as_bytes()).await.unwrap();

        let mut buf = [0u8; 1024];
        let n = stream.read(&mut buf).await.unwrap();
        assert!(String::from_utf8_lossy(&buf[..n]).starts_with("HTTP/1.1 101"));

        let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(5);
        while hub.connection_count() == 0 {
            assert!(tokio::time::Instant::now() < deadline, "subscriber never registered");
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        // The client stays silent; the server must still hang up
        hub.shutdown();
        let mut rest = Vec::new();
        tokio::time::timeout(std::time::Duration::from_secs(2), stream.read_to_end(&mut rest))
            .await
            .expect("server should close the socket")
            .unwrap();
    }
}
