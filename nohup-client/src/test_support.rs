//! In-process agent backend for tests

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

const WAIT: Duration = Duration::from_secs(5);

/// Accepts WebSocket connections on a local port
pub struct MockBackend {
    port: u16,
    peers: mpsc::UnboundedReceiver<MockPeer>,
}

/// One accepted backend-side socket
pub struct MockPeer {
    /// Request URI including the query string
    pub uri: String,
    ws: WebSocketStream<TcpStream>,
}

impl MockBackend {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, peers) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let mut uri = String::new();
                let callback = |request: &Request, response: Response| {
                    uri = request.uri().to_string();
                    Ok::<Response, ErrorResponse>(response)
                };
                let Ok(ws) = tokio_tungstenite::accept_hdr_async(stream, callback).await else {
                    continue;
                };
                if tx.send(MockPeer { uri, ws }).is_err() {
                    break;
                }
            }
        });

        Self { port, peers }
    }

    /// A ws:// URL nothing listens on
    pub async fn unused_url() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        format!("ws://127.0.0.1:{}/ws", port)
    }

    pub fn url(&self) -> String {
        format!("ws://127.0.0.1:{}/ws", self.port)
    }

    /// Wait for the next client connection
    pub async fn accept(&mut self) -> MockPeer {
        tokio::time::timeout(WAIT, self.peers.recv())
            .await
            .expect("timed out waiting for client connection")
            .expect("listener stopped")
    }

    /// Next connection if one arrives within `window`
    pub async fn try_accept(&mut self, window: Duration) -> Option<MockPeer> {
        tokio::time::timeout(window, self.peers.recv())
            .await
            .ok()
            .flatten()
    }
}

impl MockPeer {
    pub async fn send_json(&mut self, value: Value) {
        self.ws
            .send(Message::Text(value.to_string().into()))
            .await
            .unwrap();
    }

    pub async fn send_raw(&mut self, text: &str) {
        self.ws.send(Message::Text(text.to_string().into())).await.unwrap();
    }

    /// Next text frame parsed as JSON
    pub async fn recv_json(&mut self) -> Value {
        loop {
            let message = tokio::time::timeout(WAIT, self.ws.next())
                .await
                .expect("timed out waiting for client frame")
                .expect("client disconnected")
                .unwrap();
            if let Message::Text(text) = message {
                return serde_json::from_str(&text.to_string()).unwrap();
            }
        }
    }

    /// Next text frame if one arrives within `window`
    pub async fn try_recv_json(&mut self, window: Duration) -> Option<Value> {
        loop {
            match tokio::time::timeout(window, self.ws.next()).await {
                Ok(Some(Ok(Message::Text(text)))) => {
                    return serde_json::from_str(&text.to_string()).ok()
                }
                Ok(Some(Ok(_))) => continue,
                _ => return None,
            }
        }
    }

    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }
}
