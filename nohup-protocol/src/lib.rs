//! nohup-protocol: frame definitions for the agent backend connection
//!
//! This crate defines the JSON frames exchanged with the agent backend over
//! its WebSocket endpoint, the tool call payloads carried inside them, and
//! the text codec used by the client.

pub mod codec;
pub mod frames;
pub mod tools;

pub use codec::{decode_inbound, encode_outbound, CodecError};
pub use frames::{InboundFrame, OutboundFrame, StepUpdate, ToolResultEntry};
pub use tools::{
    EditFileArgs, FunctionCall, PasteArgs, ReadFileArgs, RunCommandArgs, ToolCall, ToolKind,
};

/// Query parameter carrying the session id on the backend endpoint
pub const SESSION_QUERY_PARAM: &str = "chat_id";
