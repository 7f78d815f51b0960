//! Websocket broadcast hub.
//!
//! The hub keeps the set of live subscribers. Each websocket accepted by the
//! axum route gets an outbound channel; a writer task drains it into the
//! socket, and the connection is dropped from the set once the socket closes.
//!
//! Broadcasting serializes the message once and pushes the text into every
//! channel that is still open. A failed send is skipped, never retried, and
//! never fails the broadcast as a whole.

use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// Identifier handed out to each subscriber on connect.
pub type ConnectionId = u64;

#[derive(Debug, Default)]
struct HubInner {
    next_id: AtomicU64,
    subscribers: Mutex<HashMap<ConnectionId, mpsc::UnboundedSender<String>>>,
}

/// Shared, cloneable handle on the live subscriber set.
#[derive(Debug, Clone, Default)]
pub struct BroadcastHub {
    inner: Arc<HubInner>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn subscribers(&self) -> MutexGuard<'_, HashMap<ConnectionId, mpsc::UnboundedSender<String>>> {
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a subscriber and return its id plus the receiving end of its channel.
    pub fn connect(&self) -> (ConnectionId, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (self.register(tx), rx)
    }

    fn register(&self, tx: mpsc::UnboundedSender<String>) -> ConnectionId {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers().insert(id, tx);
        id
    }

    /// Remove a subscriber. Unknown ids are ignored.
    pub fn disconnect(&self, id: ConnectionId) {
        self.subscribers().remove(&id);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers().len()
    }

    /// Serialize `message` and send it to every open subscriber.
    ///
    /// Returns how many subscribers the message was handed to. Subscribers
    /// whose channel has closed are skipped and pruned from the set.
    pub fn broadcast<T: Serialize>(&self, message: &T) -> Result<usize, serde_json::Error> {
        let text = serde_json::to_string(message)?;

        let mut subscribers = self.subscribers();
        let mut delivered = 0;
        subscribers.retain(|id, tx| {
            if tx.is_closed() {
                debug!(id, "Pruning closed subscriber");
                return false;
            }
            match tx.send(text.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(_) => {
                    debug!(id, "Send to subscriber failed; skipping");
                    false
                }
            }
        });

        debug!(delivered, "Broadcast message");
        Ok(delivered)
    }
}

/// Router exposing the websocket endpoint at `/`.
pub fn router(hub: BroadcastHub) -> Router {
    Router::new().route("/", get(ws_handler)).with_state(hub)
}

/// Serve the websocket endpoint until `shutdown` is cancelled.
#[instrument(level = "info", skip_all)]
pub async fn serve(
    listener: TcpListener,
    hub: BroadcastHub,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "WebSocket server listening");
    }
    axum::serve(listener, router(hub))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

async fn ws_handler(ws: WebSocketUpgrade, State(hub): State<BroadcastHub>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

async fn handle_socket(socket: WebSocket, hub: BroadcastHub) {
    let (id, mut outbound) = hub.connect();
    info!(id, subscribers = hub.subscriber_count(), "New client connected");

    let (mut sink, mut stream) = socket.split();

    let mut writer = tokio::spawn(async move {
        while let Some(text) = outbound.recv().await {
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    // Clients only listen; inbound frames are read to notice the close.
    let mut reader = tokio::spawn(async move {
        while let Some(Ok(frame)) = stream.next().await {
            if matches!(frame, Message::Close(_)) {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => writer.abort(),
    }

    hub.disconnect(id);
    info!(id, subscribers = hub.subscriber_count(), "Client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FeedMessage, Item, Rank};

    fn message() -> FeedMessage {
        FeedMessage::NewArticles(vec![Item {
            rank: Rank::Position(1),
            title: "hello".to_string(),
            link: "https://example.com/".to_string(),
            site: "example.com".to_string(),
            score: "1 point".to_string(),
            author: "dan".to_string(),
            posted_relative: "1 minute ago".to_string(),
        }])
    }

    #[test]
    fn test_broadcast_skips_closed_connection() {
        let hub = BroadcastHub::new();
        let (_a, mut rx_a) = hub.connect();
        let (_b, mut rx_b) = hub.connect();
        let (_c, mut rx_c) = hub.connect();
        let (_closed, rx_closed) = hub.connect();
        drop(rx_closed);
        assert_eq!(hub.subscriber_count(), 4);

        let delivered = hub.broadcast(&message()).unwrap();
        assert_eq!(delivered, 3);

        for rx in [&mut rx_a, &mut rx_b, &mut rx_c] {
            let text = rx.try_recv().unwrap();
            let decoded: FeedMessage = serde_json::from_str(&text).unwrap();
            assert_eq!(decoded, message());
        }
        assert_eq!(hub.subscriber_count(), 3);
    }

    #[test]
    fn test_disconnect_removes_subscriber() {
        let hub = BroadcastHub::new();
        let (a, _rx_a) = hub.connect();
        let (_b, mut rx_b) = hub.connect();

        hub.disconnect(a);
        hub.disconnect(a);
        assert_eq!(hub.subscriber_count(), 1);

        assert_eq!(hub.broadcast(&message()).unwrap(), 1);
        assert!(rx_b.try_recv().is_ok());
    }

    #[test]
    fn test_broadcast_with_no_subscribers() {
        let hub = BroadcastHub::new();
        assert_eq!(hub.broadcast(&message()).unwrap(), 0);
    }

    #[test]
    fn test_connection_ids_are_unique() {
        let hub = BroadcastHub::new();
        let (a, _ra) = hub.connect();
        let (b, _rb) = hub.connect();
        assert_ne!(a, b);
    }

    #[test]
    fn test_clones_share_the_live_set() {
        let hub = BroadcastHub::new();
        let other = hub.clone();
        let (_id, _rx) = other.connect();
        assert_eq!(hub.subscriber_count(), 1);
    }

    async fn wait_for_count(hub: &BroadcastHub, expected: usize) {
        for _ in 0..200 {
            if hub.subscriber_count() == expected {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("subscriber count stuck at {}, wanted {expected}", hub.subscriber_count());
    }

    #[tokio::test]
    async fn test_socket_lifecycle_over_route() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpStream;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hub = BroadcastHub::new();
        let shutdown = CancellationToken::new();
        let server = tokio::spawn(serve(listener, hub.clone(), shutdown.clone()));

        let mut client = TcpStream::connect(addr).await.unwrap();
        let request = format!(
            "GET / HTTP/1.1\r\n\
             Host: {addr}\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
             Sec-WebSocket-Version: 13\r\n\r\n"
        );
        client.write_all(request.as_bytes()).await.unwrap();

        let mut response = Vec::new();
        let mut buf = [0u8; 1];
        while !response.ends_with(b"\r\n\r\n") {
            let n = client.read(&mut buf).await.unwrap();
            assert_ne!(n, 0, "connection closed during handshake");
            response.push(buf[0]);
        }
        let response = String::from_utf8(response).unwrap();
        assert!(response.starts_with("HTTP/1.1 101"), "{response}");

        wait_for_count(&hub, 1).await;
        assert_eq!(hub.broadcast(&FeedMessage::NewArticles(vec![])).unwrap(), 1);

        let mut header = [0u8; 2];
        client.read_exact(&mut header).await.unwrap();
        // FIN + text opcode, unmasked, short length.
        assert_eq!(header[0], 0x81);
        let len = usize::from(header[1]);
        assert!(len < 126);
        let mut payload = vec![0u8; len];
        client.read_exact(&mut payload).await.unwrap();
        let msg: FeedMessage = serde_json::from_slice(&payload).unwrap();
        assert_eq!(msg, FeedMessage::NewArticles(vec![]));

        drop(client);
        wait_for_count(&hub, 0).await;

        shutdown.cancel();
        server.await.unwrap().unwrap();
    }
}
