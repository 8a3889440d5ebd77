//! Backend frame types
//!
//! Every frame is a JSON object with a `type` discriminator. Inbound frames
//! flow from the agent backend to the client, outbound frames the other way.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::tools::ToolCall;

// ==================== Inbound ====================

/// Frames received from the agent backend
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundFrame {
    /// Incremental piece of a streamed assistant response
    Chunk { content: String },

    /// End of the current streamed response
    End {},

    /// Backend error, aborts any active stream
    Error {
        #[serde(default)]
        content: String,
    },

    /// Backend warning, aborts any active stream
    Warning {
        #[serde(default)]
        content: String,
    },

    /// Informational acknowledgement (stop received, keys stored, ...)
    Info {
        #[serde(default)]
        content: String,
    },

    /// The agent wants the client to run one or more local tools
    ToolCallRequest { tool_calls: Vec<ToolCall> },

    /// The agent asks a free-text question; the reply is a normal user message
    AskUserRequest {
        #[serde(default)]
        question: String,
    },

    /// The agent ended the task
    TerminateRequest {
        #[serde(default = "default_terminate_reason")]
        reason: String,
    },

    /// A server-side tool is blocked on a user answer keyed by `request_id`
    AgentQuestion { question: String, request_id: String },

    /// Progress from a long-running server-side tool
    AgentStepUpdate {
        #[serde(default)]
        data: StepUpdate,
    },

    /// Running total cost of the session
    CostUpdate { total_cost: f64 },

    /// Speech-to-text result for an earlier `audio_input`
    TranscriptionResult { text: String },

    /// Any frame whose `type` is missing or not listed above
    ///
    /// Never produced by serde directly; [`crate::codec::decode_inbound`]
    /// builds it so unknown frames still carry their fallback payload.
    #[serde(skip_deserializing)]
    Unrecognized {
        frame_type: Option<String>,
        response: Option<String>,
    },
}

fn default_terminate_reason() -> String {
    "Task finished.".into()
}

impl InboundFrame {
    /// Wire names of every recognized inbound frame type
    pub const KNOWN_TYPES: &'static [&'static str] = &[
        "chunk",
        "end",
        "error",
        "warning",
        "info",
        "tool_call_request",
        "ask_user_request",
        "terminate_request",
        "agent_question",
        "agent_step_update",
        "cost_update",
        "transcription_result",
    ];

    /// Check whether a wire type name is recognized
    pub fn is_known_type(frame_type: &str) -> bool {
        Self::KNOWN_TYPES.contains(&frame_type)
    }

    /// Short name for logging
    pub fn type_name(&self) -> &str {
        match self {
            Self::Chunk { .. } => "chunk",
            Self::End {} => "end",
            Self::Error { .. } => "error",
            Self::Warning { .. } => "warning",
            Self::Info { .. } => "info",
            Self::ToolCallRequest { .. } => "tool_call_request",
            Self::AskUserRequest { .. } => "ask_user_request",
            Self::TerminateRequest { .. } => "terminate_request",
            Self::AgentQuestion { .. } => "agent_question",
            Self::AgentStepUpdate { .. } => "agent_step_update",
            Self::CostUpdate { .. } => "cost_update",
            Self::TranscriptionResult { .. } => "transcription_result",
            Self::Unrecognized { frame_type, .. } => frame_type.as_deref().unwrap_or("<missing>"),
        }
    }
}

/// Payload of `agent_step_update`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StepUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thoughts: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

// ==================== Outbound ====================

/// Frames sent to the agent backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    /// User text, optionally with a screenshot and selected context
    UserMessage {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        screenshot_data_url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        context_text: Option<String>,
    },

    /// Results of locally executed (or denied) tool calls
    ToolResult { results: Vec<ToolResultEntry> },

    /// Answer to an `agent_question`
    UserResponse { request_id: String, answer: String },

    /// Switch the backend model
    SetLlmModel { model_name: String },

    /// Base64 audio for transcription
    AudioInput { audio_data: String, format: String },

    /// Provider API keys for this session
    SetApiKeys { keys: BTreeMap<String, String> },

    /// Ask the backend to stop the current turn
    Stop {},
}

impl OutboundFrame {
    /// Short name for logging
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::UserMessage { .. } => "user_message",
            Self::ToolResult { .. } => "tool_result",
            Self::UserResponse { .. } => "user_response",
            Self::SetLlmModel { .. } => "set_llm_model",
            Self::AudioInput { .. } => "audio_input",
            Self::SetApiKeys { .. } => "set_api_keys",
            Self::Stop {} => "stop",
        }
    }
}

/// One entry of `tool_result.results`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResultEntry {
    pub tool_call_id: String,
    pub content: String,
}
