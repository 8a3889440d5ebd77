//! Desktop automation for `paste_at_cursor`
//!
//! The paste is two steps: put the text on the system clipboard, wait a
//! moment so the clipboard owner has published it, then synthesize the
//! platform paste keystroke into whatever window has focus.

use std::process::Command;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use nohup_utils::{NohupError, Result};

use super::ActionResult;

/// Desktop side effects needed by the paste tool
pub trait Automation: Send + Sync {
    /// Replace the clipboard contents with `text`
    fn set_clipboard(&self, text: &str) -> Result<()>;

    /// Send the platform paste shortcut to the focused window
    fn simulate_paste(&self) -> Result<()>;
}

/// Clipboard via `arboard`, keystroke via the platform's scripting tool
///
/// The clipboard handle is kept for the process lifetime: on X11 the
/// contents vanish when their owner is dropped.
#[derive(Default)]
pub struct SystemAutomation {
    clipboard: Mutex<Option<arboard::Clipboard>>,
}

impl SystemAutomation {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Automation for SystemAutomation {
    fn set_clipboard(&self, text: &str) -> Result<()> {
        let mut guard = self
            .clipboard
            .lock()
            .map_err(|_| NohupError::automation("clipboard lock poisoned"))?;

        if guard.is_none() {
            let clipboard = arboard::Clipboard::new()
                .map_err(|e| NohupError::automation(format!("clipboard unavailable: {}", e)))?;
            *guard = Some(clipboard);
        }

        match guard.as_mut() {
            Some(clipboard) => clipboard
                .set_text(text.to_string())
                .map_err(|e| NohupError::automation(format!("failed to set clipboard: {}", e))),
            None => Err(NohupError::internal("clipboard handle missing")),
        }
    }

    fn simulate_paste(&self) -> Result<()> {
        let mut command = paste_keystroke_command()?;
        let output = command
            .output()
            .map_err(|e| NohupError::automation(format!("failed to send paste keystroke: {}", e)))?;

        if output.status.success() {
            Ok(())
        } else {
            Err(NohupError::automation(format!(
                "paste keystroke exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }
}

#[cfg(target_os = "macos")]
fn paste_keystroke_command() -> Result<Command> {
    let mut command = Command::new("osascript");
    command
        .arg("-e")
        .arg(r#"tell application "System Events" to keystroke "v" using command down"#);
    Ok(command)
}

#[cfg(all(unix, not(target_os = "macos")))]
fn paste_keystroke_command() -> Result<Command> {
    let mut command = Command::new("xdotool");
    command.args(["key", "--clearmodifiers", "ctrl+v"]);
    Ok(command)
}

#[cfg(not(unix))]
fn paste_keystroke_command() -> Result<Command> {
    Err(NohupError::automation(
        "paste keystroke is not supported on this platform",
    ))
}

/// Clipboard, delay, keystroke
pub(super) async fn paste(
    automation: Arc<dyn Automation>,
    text: String,
    delay: Duration,
) -> Result<ActionResult> {
    let length = text.chars().count();

    let clipboard = Arc::clone(&automation);
    tokio::task::spawn_blocking(move || clipboard.set_clipboard(&text))
        .await
        .map_err(|e| NohupError::internal(format!("clipboard task failed: {}", e)))??;

    tokio::time::sleep(delay).await;

    tokio::task::spawn_blocking(move || automation.simulate_paste())
        .await
        .map_err(|e| NohupError::internal(format!("paste task failed: {}", e)))??;

    tracing::debug!(chars = length, "Pasted text at cursor");
    Ok(ActionResult::Success(format!(
        "Pasted {} characters at the cursor.",
        length
    )))
}
