//! Local execution of agent tool calls
//!
//! Every executed or denied call produces exactly one [`ActionResult`]. No
//! error escapes [`ActionExecutor::execute`]: failures become result text the
//! agent can read.

mod automation;
mod command;
mod files;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use nohup_protocol::{
    EditFileArgs, PasteArgs, ReadFileArgs, RunCommandArgs, ToolCall, ToolKind,
};
use nohup_utils::NohupError;
use serde::de::DeserializeOwned;

pub use automation::{Automation, SystemAutomation};

/// Result text sent back when the user denies a call
///
/// The agent recognizes the `User denied execution` substring and moves on
/// instead of retrying.
pub const DENIED_MESSAGE: &str = "User denied execution.";

/// Suffix appended to truncated output
pub const TRUNCATION_MARKER: &str = "... (truncated)";

/// User decision on a tool call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approved,
    Denied,
}

/// Outcome of one tool call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionResult {
    Success(String),
    Failure(String),
}

impl ActionResult {
    /// Failure result with the conventional `Error:` prefix
    pub fn failure(message: impl std::fmt::Display) -> Self {
        Self::Failure(format!("Error: {}", message))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Text reported to the agent
    pub fn content(&self) -> &str {
        match self {
            Self::Success(text) | Self::Failure(text) => text,
        }
    }
}

/// Executor settings
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Directory commands run in and relative paths resolve against
    pub working_dir: PathBuf,
    /// Shell used as `<shell> -c <command>`
    pub shell: PathBuf,
    pub command_timeout: Duration,
    /// Character limit for command output
    pub command_output_limit: usize,
    /// Character limit for read_file content
    pub file_read_limit: usize,
    /// Pause between setting the clipboard and the paste keystroke
    pub paste_delay: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            working_dir: PathBuf::from("."),
            shell: PathBuf::from("/bin/sh"),
            command_timeout: Duration::from_secs(15),
            command_output_limit: 1000,
            file_read_limit: 2000,
            paste_delay: Duration::from_millis(150),
        }
    }
}

/// Runs tool calls against the local machine
pub struct ActionExecutor {
    config: ExecutorConfig,
    automation: Arc<dyn Automation>,
}

impl ActionExecutor {
    pub fn new(config: ExecutorConfig, automation: Arc<dyn Automation>) -> Self {
        Self { config, automation }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Execute (or refuse) one tool call
    pub async fn execute(&self, call: &ToolCall, decision: Decision) -> ActionResult {
        if decision == Decision::Denied {
            tracing::info!(id = %call.id, tool = %call.name(), "Tool call denied by user");
            return ActionResult::Success(DENIED_MESSAGE.to_string());
        }

        tracing::info!(id = %call.id, tool = %call.name(), "Executing tool call");
        let outcome = match call.kind() {
            ToolKind::RunBashCommand => match parse_args::<RunCommandArgs>(call) {
                Ok(args) => command::run(&self.config, &args.command).await,
                Err(e) => Err(e),
            },
            ToolKind::ReadFile => match parse_args::<ReadFileArgs>(call) {
                Ok(args) => files::read(&self.config, &args.file_path).await,
                Err(e) => Err(e),
            },
            ToolKind::EditFile => match parse_args::<EditFileArgs>(call) {
                Ok(args) => files::edit(&self.config, &args).await,
                Err(e) => Err(e),
            },
            ToolKind::PasteAtCursor => match parse_args::<PasteArgs>(call) {
                Ok(args) => {
                    automation::paste(
                        Arc::clone(&self.automation),
                        args.content_to_paste,
                        self.config.paste_delay,
                    )
                    .await
                }
                Err(e) => Err(e),
            },
            ToolKind::Other(name) => {
                tracing::warn!(id = %call.id, tool = %name, "Unknown tool requested");
                return ActionResult::failure(format!("Unknown tool '{}'", name));
            }
        };

        match outcome {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(id = %call.id, tool = %call.name(), error = %e, "Tool call failed");
                ActionResult::failure(e)
            }
        }
    }
}

fn parse_args<T: DeserializeOwned>(call: &ToolCall) -> nohup_utils::Result<T> {
    call.parse_arguments()
        .map_err(|e| NohupError::InvalidArguments {
            tool: call.name().to_string(),
            message: e.to_string(),
        })
}

/// Cap `text` at `limit` characters, marking the cut
///
/// Counts chars, not bytes, so multi-byte text never splits mid-codepoint.
pub fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}{}", &text[..cut], TRUNCATION_MARKER),
        None => text.to_string(),
    }
}
