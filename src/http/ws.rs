//! `GET /ws`: claims a pending session and bridges it to the upgraded
//! WebSocket connection.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::bridge::{Registry, Session, WsSink, WsSinkError};

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    id: String,
}

pub async fn upgrade(
    Query(query): Query<WsQuery>,
    State(registry): State<Arc<Registry>>,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let peer = resolve_peer(&headers, connect_info);

    let Some(session) = registry.pop(&query.id) else {
        warn!("ws attach for unknown session id {}", query.id);
        return ws.on_upgrade(|mut socket| async move {
            let _ = socket
                .send(Message::Close(Some(CloseFrame {
                    code: 4404,
                    reason: "Invalid worker id".into(),
                })))
                .await;
        });
    };

    info!("ws attach for session {} from {}", query.id, peer);

    ws.on_upgrade(move |socket| bridge(session, socket))
}

/// Prefers `X-Real-Ip`/`X-Real-Port` (set by a reverse proxy in front of the
/// gateway), falling back to the socket's own peer address.
fn resolve_peer(headers: &HeaderMap, connect_info: Option<ConnectInfo<SocketAddr>>) -> String {
    let ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let port = headers
        .get("x-real-port")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    match (ip, port) {
        (Some(ip), Some(port)) => format!("{}:{}", ip, port),
        _ => connect_info
            .map(|ConnectInfo(addr)| addr.to_string())
            .unwrap_or_else(|| "unknown".to_string()),
    }
}

async fn bridge(mut session: Session, socket: WebSocket) {
    let (ws_tx, mut ws_rx) = socket.split();
    session.attach(Box::new(AxumWsSink { tx: ws_tx }));

    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let pump = tokio::spawn(session.run(inbound_rx));

    while let Some(Ok(msg)) = ws_rx.next().await {
        match msg {
            Message::Binary(data) => {
                if inbound_tx.send(data).is_err() {
                    break;
                }
            }
            Message::Text(text) => {
                if inbound_tx.send(text.into_bytes()).is_err() {
                    break;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    // Dropping the sender signals EOF to the pump task's select loop, which
    // closes the session the same way a read returning zero bytes would.
    drop(inbound_tx);
    let _ = pump.await;
}

struct AxumWsSink {
    tx: futures_util::stream::SplitSink<WebSocket, Message>,
}

#[async_trait::async_trait]
impl WsSink for AxumWsSink {
    async fn write_message(&mut self, data: Vec<u8>) -> Result<(), WsSinkError> {
        self.tx.send(Message::Binary(data)).await.map_err(|_| WsSinkError)
    }

    async fn close(&mut self) {
        let _ = self.tx.send(Message::Close(None)).await;
    }
}
