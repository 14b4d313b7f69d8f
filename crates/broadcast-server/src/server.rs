use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;

use crate::envelope::Envelope;

const BROADCAST_CAPACITY: usize = 2048;

/// WebSocket fan-out server. All subscriber-socket work happens on tasks owned
/// by the server's event loop; producers only ever touch the broadcast sender.
#[derive(Clone)]
pub struct BroadcastServer {
    tx: broadcast::Sender<String>,
    client_count: Arc<AtomicUsize>,
}

impl Default for BroadcastServer {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastServer {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            tx,
            client_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Sender side used by the notification bridge consumer.
    pub fn broadcast_sender(&self) -> broadcast::Sender<String> {
        self.tx.clone()
    }

    pub fn client_count(&self) -> usize {
        self.client_count.load(Ordering::Relaxed)
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/ws", get(ws_handler))
            .with_state(self.clone())
    }

    /// Bind and serve until the shutdown future resolves.
    pub async fn serve(
        self,
        addr: SocketAddr,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> std::io::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("broadcast server listening on ws://{addr}/ws");
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
    }
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(server): State<BroadcastServer>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, server))
}

async fn handle_socket(socket: WebSocket, server: BroadcastServer) {
    let count = server.client_count.fetch_add(1, Ordering::Relaxed) + 1;
    tracing::info!("subscriber connected ({count} total)");

    let (mut sender, mut receiver) = socket.split();
    let mut rx = server.tx.subscribe();

    let welcome = Envelope::welcome(count);
    if let Ok(json) = serde_json::to_string(&welcome) {
        if sender.send(Message::Text(json)).await.is_err() {
            server.client_count.fetch_sub(1, Ordering::Relaxed);
            return;
        }
    }

    // Fan broadcast messages out to this client. A send failure only drops
    // this client; other subscribers are untouched.
    let send_task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(json) => {
                    if sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("slow subscriber skipped {skipped} messages");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // Read side: we only care about the close frame; pings are answered by
    // the protocol layer.
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    let remaining = server.client_count.fetch_sub(1, Ordering::Relaxed) - 1;
    tracing::info!("subscriber disconnected ({remaining} remaining)");
}
