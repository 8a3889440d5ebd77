//! Tool call definitions
//!
//! A tool call is a backend-requested local operation. Its arguments travel
//! as a JSON-encoded string inside the frame, so they need a second parse
//! step, which is deferred until execution.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Tool name for shell command execution
pub const RUN_BASH_COMMAND: &str = "run_bash_command";
/// Tool name for reading a file
pub const READ_FILE: &str = "read_file";
/// Tool name for first-occurrence replacement in a file
pub const EDIT_FILE: &str = "edit_file";
/// Tool name for clipboard paste at the cursor
pub const PASTE_AT_CURSOR: &str = "paste_at_cursor";

/// A single tool call as sent in `tool_call_request.tool_calls`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    /// Backend-assigned identifier, echoed back as `tool_call_id`
    pub id: String,
    /// Always "function" today
    #[serde(rename = "type", default = "default_call_type")]
    pub call_type: String,
    /// The function to invoke
    pub function: FunctionCall,
}

fn default_call_type() -> String {
    "function".into()
}

/// Function name plus JSON-encoded arguments
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

impl ToolCall {
    /// Build a function tool call
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            call_type: default_call_type(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }

    /// The tool name
    pub fn name(&self) -> &str {
        &self.function.name
    }

    /// Classified tool kind
    pub fn kind(&self) -> ToolKind {
        ToolKind::from_name(&self.function.name)
    }

    /// Parse the JSON-encoded argument string into `T`
    ///
    /// An empty argument string is treated as `{}`.
    pub fn parse_arguments<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        let raw = self.function.arguments.trim();
        if raw.is_empty() {
            serde_json::from_str("{}")
        } else {
            serde_json::from_str(raw)
        }
    }
}

/// Locally executable tool kinds
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ToolKind {
    RunBashCommand,
    ReadFile,
    EditFile,
    PasteAtCursor,
    /// Anything the client does not know how to execute
    Other(String),
}

impl ToolKind {
    pub fn from_name(name: &str) -> Self {
        match name {
            RUN_BASH_COMMAND => Self::RunBashCommand,
            READ_FILE => Self::ReadFile,
            EDIT_FILE => Self::EditFile,
            PASTE_AT_CURSOR => Self::PasteAtCursor,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::RunBashCommand => RUN_BASH_COMMAND,
            Self::ReadFile => READ_FILE,
            Self::EditFile => EDIT_FILE,
            Self::PasteAtCursor => PASTE_AT_CURSOR,
            Self::Other(name) => name,
        }
    }
}

// ==================== Argument Payloads ====================

/// Arguments of `run_bash_command`
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RunCommandArgs {
    pub command: String,
}

/// Arguments of `read_file`
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ReadFileArgs {
    pub file_path: String,
}

/// Arguments of `edit_file`
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct EditFileArgs {
    pub file_path: String,
    pub string_to_replace: String,
    pub new_string: String,
}

/// Arguments of `paste_at_cursor`
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PasteArgs {
    pub content_to_paste: String,
}
