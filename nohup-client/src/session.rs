//! Session orchestration
//!
//! [`SessionCore`] is a single-task actor. It owns the session registry, the
//! backend connection, the frame handler and the reconnect timer, and is
//! driven by one `select!` loop over UI intents, transport events, finished
//! tool calls, the reconnect deadline and the pending-expiry tick. Nothing
//! else touches that state, so there are no locks.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use url::Url;

use nohup_protocol::ToolCall;
use nohup_utils::Result;

use crate::config::ClientConfig;
use crate::connection::{Connection, Effect, FrameHandler, TransportEvent};
use crate::events::{Intent, UiEvent, UiSink};
use crate::executor::{ActionExecutor, ActionResult, Decision};
use crate::gateway::{ControlFrame, OutboundGateway};
use crate::pending::ApprovalPolicy;
use crate::registry::{SessionId, SessionRegistry};

/// How often undecided tool calls are checked for expiry
const EXPIRY_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Result text for a tool call that expired before the user decided
pub const EXPIRED_MESSAGE: &str = "Tool call expired without a user decision.";

/// Settings for [`SessionCore`]
#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub endpoint: Url,
    pub connect_timeout: Duration,
    pub reconnect_delay: Duration,
    pub pending_timeout: Option<Duration>,
    pub policy: ApprovalPolicy,
    /// Resume this session instead of starting a fresh one
    pub session: Option<SessionId>,
}

impl CoreConfig {
    pub fn from_client_config(config: &ClientConfig) -> Result<Self> {
        Ok(Self {
            endpoint: config.endpoint()?,
            connect_timeout: config.connect_timeout(),
            reconnect_delay: config.reconnect_delay(),
            pending_timeout: config.pending_timeout(),
            policy: config.approval_policy(),
            session: None,
        })
    }
}

/// A finished tool call on its way back into the actor
#[derive(Debug)]
struct ActionCompletion {
    session: SessionId,
    call: ToolCall,
    result: ActionResult,
    auto_approved: bool,
}

/// The session orchestrator
pub struct SessionCore {
    registry: SessionRegistry,
    connection: Connection,
    transport_rx: mpsc::UnboundedReceiver<TransportEvent>,
    handler: FrameHandler,
    executor: Arc<ActionExecutor>,
    completion_tx: mpsc::UnboundedSender<ActionCompletion>,
    completion_rx: mpsc::UnboundedReceiver<ActionCompletion>,
    gateway: OutboundGateway,
    ui: UiSink,
    reconnect_delay: Duration,
    /// Deadline of the single scheduled reconnect, if any
    reconnect_at: Option<Instant>,
    pending_timeout: Option<Duration>,
}

impl SessionCore {
    pub fn new(config: CoreConfig, executor: ActionExecutor, ui: UiSink) -> Self {
        let (transport_tx, transport_rx) = mpsc::unbounded_channel();
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();

        let registry = match config.session {
            Some(session) => SessionRegistry::with_session(session),
            None => SessionRegistry::new(),
        };

        Self {
            registry,
            connection: Connection::new(config.endpoint, config.connect_timeout, transport_tx),
            transport_rx,
            handler: FrameHandler::new(config.policy),
            executor: Arc::new(executor),
            completion_tx,
            completion_rx,
            gateway: OutboundGateway::new(ui.clone()),
            ui,
            reconnect_delay: config.reconnect_delay,
            reconnect_at: None,
            pending_timeout: config.pending_timeout,
        }
    }

    pub fn current_session(&self) -> SessionId {
        self.registry.current()
    }

    /// Run until a `shutdown` intent arrives or the intent channel closes
    pub async fn run(mut self, mut intents: mpsc::UnboundedReceiver<Intent>) {
        self.ui.emit(UiEvent::SessionStarted {
            session_id: self.registry.current().to_string(),
        });
        self.connect();

        let mut sweep = tokio::time::interval(EXPIRY_SWEEP_INTERVAL);
        sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            let reconnect_at = self.reconnect_at;
            let reconnect = async move {
                match reconnect_at {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                intent = intents.recv() => match intent {
                    Some(intent) => {
                        if !self.handle_intent(intent) {
                            break;
                        }
                    }
                    None => {
                        tracing::info!("Intent channel closed");
                        break;
                    }
                },

                Some(event) = self.transport_rx.recv() => self.handle_transport(event),

                Some(completion) = self.completion_rx.recv() => self.handle_completion(completion),

                _ = reconnect => {
                    tracing::info!("Reconnect backoff elapsed");
                    self.reconnect_at = None;
                    self.connect();
                }

                _ = sweep.tick(), if self.pending_timeout.is_some() => self.expire_pending(),
            }
        }

        self.close(true, "shutting down");
        tracing::info!("Session core stopped");
    }

    /// Apply one UI intent; returns false when the core should stop
    pub fn handle_intent(&mut self, intent: Intent) -> bool {
        match intent {
            Intent::SendText {
                text,
                screenshot_data_url,
                context_text,
            } => {
                self.gateway.send_user_text(
                    &self.connection,
                    text,
                    screenshot_data_url,
                    context_text,
                );
            }
            Intent::Approve { id } => self.resolve(&id, Decision::Approved),
            Intent::Deny { id } => self.resolve(&id, Decision::Denied),
            Intent::AnswerQuestion { request_id, answer } => {
                if self.handler.take_question(&request_id) {
                    self.gateway
                        .send_user_answer(&self.connection, &request_id, answer);
                } else {
                    tracing::warn!(%request_id, "Answer for unknown agent question");
                    self.ui
                        .toast("That question is no longer waiting for an answer.");
                }
            }
            Intent::NewSession => {
                self.start_new_session();
            }
            Intent::SelectModel { model_name } => {
                self.gateway
                    .send_control(&self.connection, ControlFrame::SetModel { model_name });
            }
            Intent::SubmitAudio { audio_data, format } => {
                self.gateway.send_control(
                    &self.connection,
                    ControlFrame::AudioInput { audio_data, format },
                );
            }
            Intent::SetApiKeys { keys } => {
                self.gateway
                    .send_control(&self.connection, ControlFrame::SetApiKeys { keys });
            }
            Intent::Stop => {
                self.gateway.send_control(&self.connection, ControlFrame::Stop);
            }
            Intent::Shutdown => return false,
        }
        true
    }

    /// Drop the current conversation and connect under a fresh session id
    pub fn start_new_session(&mut self) -> SessionId {
        self.close(true, "new session");
        let session = self.registry.start_new();
        self.ui.emit(UiEvent::SessionStarted {
            session_id: session.to_string(),
        });
        self.connect();
        session
    }

    /// Close the connection
    ///
    /// Per-connection state is discarded either way. Only an unintentional
    /// close schedules a reconnect.
    pub fn close(&mut self, intentional: bool, reason: &str) {
        self.connection.close();
        let effects = self.handler.reset();
        self.apply(effects);

        let reconnect_in_ms = if intentional {
            self.reconnect_at = None;
            None
        } else {
            Some(self.schedule_reconnect())
        };
        self.ui.emit(UiEvent::Disconnected {
            reason: reason.to_string(),
            reconnect_in_ms,
        });
    }

    fn connect(&mut self) {
        self.reconnect_at = None;
        let session = self.registry.current();
        if self.connection.connect(session) {
            self.ui.status("Connecting to agent backend...");
        }
    }

    /// Arm the reconnect timer unless it is already armed
    fn schedule_reconnect(&mut self) -> u64 {
        let delay_ms = u64::try_from(self.reconnect_delay.as_millis()).unwrap_or(u64::MAX);
        if self.reconnect_at.is_none() {
            self.reconnect_at = Some(Instant::now() + self.reconnect_delay);
            self.connection.set_reconnecting();
            tracing::info!(delay = ?self.reconnect_delay, "Reconnect scheduled");
        }
        delay_ms
    }

    fn handle_transport(&mut self, event: TransportEvent) {
        if event.generation() != self.connection.generation() {
            tracing::debug!(
                generation = event.generation(),
                current = self.connection.generation(),
                "Ignoring event from superseded connection"
            );
            return;
        }

        match event {
            TransportEvent::Opened { generation } => {
                if !self.connection.mark_open(generation) {
                    return;
                }
                let effects = self.handler.reset();
                self.apply(effects);
                self.ui.emit(UiEvent::Connected {
                    session_id: self.registry.current().to_string(),
                });
            }
            TransportEvent::Frame { text, .. } => {
                let effects = self.handler.handle_text(&text);
                self.apply(effects);
            }
            TransportEvent::Closed { reason, .. } => {
                self.ui.status(format!("Connection lost: {}", reason));
                self.close(false, &reason);
            }
            TransportEvent::Failed { error, .. } => {
                self.ui
                    .status(format!("Could not connect to agent backend: {}", error));
                self.close(false, &error);
            }
        }
    }

    fn resolve(&mut self, id: &str, decision: Decision) {
        match self.handler.resolve(id, decision) {
            Some(effect) => self.apply(vec![effect]),
            None => {
                tracing::warn!(id, ?decision, "Decision for unknown tool call");
                self.ui.toast(format!("No pending action with id {}", id));
            }
        }
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Ui(event) => self.ui.emit(event),
                Effect::Execute {
                    call,
                    decision,
                    auto_approved,
                } => self.spawn_action(call, decision, auto_approved),
            }
        }
    }

    fn spawn_action(&self, call: ToolCall, decision: Decision, auto_approved: bool) {
        let executor = Arc::clone(&self.executor);
        let completions = self.completion_tx.clone();
        let session = self.registry.current();

        tokio::spawn(async move {
            let result = executor.execute(&call, decision).await;
            let completion = ActionCompletion {
                session,
                call,
                result,
                auto_approved,
            };
            if completions.send(completion).is_err() {
                tracing::debug!("Session core gone, dropping tool result");
            }
        });
    }

    fn handle_completion(&mut self, completion: ActionCompletion) {
        let ActionCompletion {
            session,
            call,
            result,
            auto_approved,
        } = completion;

        // Results follow the session, not the socket. The backend resumes a
        // conversation by chat_id, so a result that lands after a reconnect
        // under the same session goes out on the new connection.
        if session != self.registry.current() {
            tracing::info!(
                id = %call.id,
                %session,
                "Dropping tool result for superseded session"
            );
            return;
        }

        self.gateway
            .send_action_result(&self.connection, &call.id, result.content());
        self.ui.emit(UiEvent::ActionOutput {
            id: call.id,
            tool: call.function.name,
            success: result.is_success(),
            content: result.content().to_string(),
            auto_approved,
        });
    }

    fn expire_pending(&mut self) {
        let Some(max_age) = self.pending_timeout else {
            return;
        };
        for call in self.handler.expire_pending(max_age, Instant::now()) {
            tracing::info!(id = %call.id, tool = %call.name(), "Pending tool call expired");
            self.gateway.send_action_result(
                &self.connection,
                &call.id,
                &format!("Error: {}", EXPIRED_MESSAGE),
            );
            self.ui.emit(UiEvent::ActionExpired {
                id: call.id,
                tool: call.function.name,
            });
        }
    }
}
