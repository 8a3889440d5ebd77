//! WebSocket client for the agent backend

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use url::Url;

use nohup_protocol::SESSION_QUERY_PARAM;

use crate::gateway::FrameSink;
use crate::registry::SessionId;

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    /// Waiting out the backoff before the next connect attempt
    Reconnecting,
}

/// Notifications from the connection task
///
/// Every event carries the generation of the connection that produced it.
/// Events whose generation no longer matches [`Connection::generation`]
/// come from a connection that has since been replaced and must be ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened { generation: u64 },
    Frame { generation: u64, text: String },
    Closed { generation: u64, reason: String },
    Failed { generation: u64, error: String },
}

impl TransportEvent {
    pub fn generation(&self) -> u64 {
        match self {
            Self::Opened { generation }
            | Self::Frame { generation, .. }
            | Self::Closed { generation, .. }
            | Self::Failed { generation, .. } => *generation,
        }
    }
}

/// Client connection to the agent backend
pub struct Connection {
    /// Backend endpoint, without the session parameter
    endpoint: Url,
    connect_timeout: Duration,
    state: ConnectionState,
    /// Bumped on every connect and close
    generation: u64,
    /// Session the live connection belongs to
    session: Option<SessionId>,
    /// Outgoing text frames for the live connection
    outgoing: Option<mpsc::UnboundedSender<String>>,
    cancel: Option<CancellationToken>,
    task_handle: Option<JoinHandle<()>>,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl Connection {
    /// Create a new connection (not yet connected)
    pub fn new(
        endpoint: Url,
        connect_timeout: Duration,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Self {
        Self {
            endpoint,
            connect_timeout,
            state: ConnectionState::Disconnected,
            generation: 0,
            session: None,
            outgoing: None,
            cancel: None,
            task_handle: None,
            events,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    /// Endpoint URL carrying the session id
    pub fn session_url(&self, session: SessionId) -> Url {
        let mut url = self.endpoint.clone();
        let retained: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| key != SESSION_QUERY_PARAM)
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        url.query_pairs_mut()
            .clear()
            .extend_pairs(retained)
            .append_pair(SESSION_QUERY_PARAM, &session.to_string());
        url
    }

    /// Start connecting for `session`
    ///
    /// No-op when a connection for the same session is already open or in
    /// progress. Returns whether a new attempt was started.
    pub fn connect(&mut self, session: SessionId) -> bool {
        let active = matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::Open
        );
        if active && self.session == Some(session) {
            tracing::debug!(%session, state = ?self.state, "Connect skipped, already active");
            return false;
        }
        if active {
            self.close();
        }

        self.generation += 1;
        self.state = ConnectionState::Connecting;
        self.session = Some(session);

        let url = self.session_url(session);
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        tracing::info!(%url, generation = self.generation, "Connecting to agent backend");
        let handle = tokio::spawn(Self::connection_task(
            url,
            self.connect_timeout,
            self.generation,
            outgoing_rx,
            self.events.clone(),
            cancel.clone(),
        ));

        self.outgoing = Some(outgoing_tx);
        self.cancel = Some(cancel);
        self.task_handle = Some(handle);
        true
    }

    /// Record that the connection of `generation` finished its handshake
    ///
    /// Returns false for stale generations.
    pub fn mark_open(&mut self, generation: u64) -> bool {
        if generation != self.generation || self.state != ConnectionState::Connecting {
            return false;
        }
        self.state = ConnectionState::Open;
        true
    }

    /// Tear down the current connection
    ///
    /// Takes effect immediately: the generation moves on, so anything the old
    /// socket still delivers is stale. The close handshake finishes in the
    /// background.
    pub fn close(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        self.outgoing = None;
        // Detached; the task exits on cancellation.
        self.task_handle = None;
        self.session = None;
        self.generation += 1;
        self.state = ConnectionState::Disconnected;
    }

    /// Mark that a reconnect is scheduled
    pub fn set_reconnecting(&mut self) {
        if self.state == ConnectionState::Disconnected {
            self.state = ConnectionState::Reconnecting;
        }
    }

    /// Queue a text frame on the open connection
    pub fn send_text(&self, text: String) -> bool {
        if self.state != ConnectionState::Open {
            return false;
        }
        match &self.outgoing {
            Some(tx) => tx.send(text).is_ok(),
            None => false,
        }
    }

    /// Background task that owns the socket
    async fn connection_task(
        url: Url,
        connect_timeout: Duration,
        generation: u64,
        mut outgoing: mpsc::UnboundedReceiver<String>,
        events: mpsc::UnboundedSender<TransportEvent>,
        cancel: CancellationToken,
    ) {
        let connected = tokio::select! {
            _ = cancel.cancelled() => return,
            result = tokio::time::timeout(connect_timeout, tokio_tungstenite::connect_async(url.as_str())) => result,
        };

        let stream = match connected {
            Ok(Ok((stream, _response))) => stream,
            Ok(Err(e)) => {
                tracing::warn!(generation, "Failed to connect: {}", e);
                let _ = events.send(TransportEvent::Failed {
                    generation,
                    error: e.to_string(),
                });
                return;
            }
            Err(_) => {
                tracing::warn!(generation, timeout = ?connect_timeout, "Connect timed out");
                let _ = events.send(TransportEvent::Failed {
                    generation,
                    error: format!("connection timed out after {:?}", connect_timeout),
                });
                return;
            }
        };

        if events.send(TransportEvent::Opened { generation }).is_err() {
            return;
        }
        tracing::info!(generation, "Connected to agent backend");

        let (mut writer, mut reader) = stream.split();
        let reason = loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    if let Err(e) = writer.send(Message::Close(None)).await {
                        tracing::debug!(generation, "Close frame not sent: {}", e);
                    }
                    return;
                }

                Some(text) = outgoing.recv() => {
                    if let Err(e) = writer.send(Message::Text(text.into())).await {
                        tracing::error!(generation, "Failed to send frame: {}", e);
                        break format!("send failed: {}", e);
                    }
                }

                message = reader.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            let text = text.to_string();
                            tracing::trace!(generation, bytes = text.len(), "Received frame");
                            if events.send(TransportEvent::Frame { generation, text }).is_err() {
                                tracing::debug!("Event channel closed, receiver dropped");
                                return;
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            break match frame {
                                Some(frame) if !frame.reason.is_empty() => {
                                    format!("closed by server: {}", frame.reason)
                                }
                                _ => "closed by server".to_string(),
                            };
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            tracing::error!(generation, "Failed to receive frame: {}", e);
                            break e.to_string();
                        }
                        None => break "connection ended".to_string(),
                    }
                }
            }
        };

        tracing::info!(generation, %reason, "Agent backend connection closed");
        let _ = events.send(TransportEvent::Closed { generation, reason });
    }
}

impl FrameSink for Connection {
    fn send_frame(&self, text: String) -> bool {
        self.send_text(text)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
    }
}
