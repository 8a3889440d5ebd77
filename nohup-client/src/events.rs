//! UI-facing surface of the session core
//!
//! [`Intent`]s come in from the window layer, [`UiEvent`]s go back out. Both
//! are plain serde-tagged JSON so the desk bridge can pass them over stdio
//! unchanged.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use nohup_protocol::StepUpdate;

/// Severity of a backend notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// Events the UI renders
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum UiEvent {
    /// A new session became current
    SessionStarted { session_id: String },
    /// The backend connection for the session is open
    Connected { session_id: String },
    /// The backend connection went away
    Disconnected {
        reason: String,
        /// Set when an automatic reconnect is scheduled
        #[serde(skip_serializing_if = "Option::is_none")]
        reconnect_in_ms: Option<u64>,
    },

    StreamStarted,
    StreamAppend { content: String },
    /// The stream ended; `text` is everything appended since it started
    StreamFinished { text: String },

    /// A tool call is waiting for approve/deny
    ActionRequested {
        id: String,
        tool: String,
        arguments: String,
    },
    /// Outcome of an executed or denied tool call
    ActionOutput {
        id: String,
        tool: String,
        success: bool,
        content: String,
        auto_approved: bool,
    },
    /// A pending tool call sat too long without a decision
    ActionExpired { id: String, tool: String },

    /// Free-text question; the reply is sent as a normal message
    AskUser { question: String },
    Terminated { reason: String },
    /// Question from a server-side tool, answered via `answer_question`
    AgentQuestion { request_id: String, question: String },
    StepUpdate(StepUpdate),
    CostUpdate { total_cost: f64 },
    Transcription { text: String },
    /// Whole assistant message delivered outside the streaming protocol
    AssistantMessage { content: String },

    /// Error, warning or info frame from the backend
    Notice { level: NoticeLevel, message: String },
    /// Connection progress and other advisory state
    Status { message: String },
    /// Short-lived local failure notification
    Toast { message: String },
}

/// Requests from the UI
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum Intent {
    SendText {
        text: String,
        #[serde(default)]
        screenshot_data_url: Option<String>,
        #[serde(default)]
        context_text: Option<String>,
    },
    Approve { id: String },
    Deny { id: String },
    AnswerQuestion { request_id: String, answer: String },
    NewSession,
    SelectModel { model_name: String },
    SubmitAudio {
        audio_data: String,
        #[serde(default = "default_audio_format")]
        format: String,
    },
    SetApiKeys { keys: BTreeMap<String, String> },
    Stop,
    Shutdown,
}

fn default_audio_format() -> String {
    "webm".into()
}

/// Clonable, non-blocking sender of UI events
///
/// A UI that went away is not an error for the core; events are dropped.
#[derive(Debug, Clone)]
pub struct UiSink {
    tx: mpsc::UnboundedSender<UiEvent>,
}

impl UiSink {
    pub fn new(tx: mpsc::UnboundedSender<UiEvent>) -> Self {
        Self { tx }
    }

    /// Create a sink together with its receiving end
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<UiEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn emit(&self, event: UiEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("UI receiver dropped, discarding event");
        }
    }

    pub fn toast(&self, message: impl Into<String>) {
        self.emit(UiEvent::Toast {
            message: message.into(),
        });
    }

    pub fn status(&self, message: impl Into<String>) {
        self.emit(UiEvent::Status {
            message: message.into(),
        });
    }
}
