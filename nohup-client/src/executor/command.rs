//! `run_bash_command`
//!
//! The command runs in its own process group so a timeout can take down
//! everything it spawned, not just the shell.

use std::io;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

use nohup_utils::{NohupError, Result};

use super::{truncate_chars, ActionResult, ExecutorConfig, TRUNCATION_MARKER};

/// How long to wait for pipes to drain once the child has exited
const IO_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

const READ_CHUNK_SIZE: usize = 8192;

/// Worst-case UTF-8 width, so the byte cap never cuts below the char limit
const MAX_BYTES_PER_CHAR: usize = 4;

/// Raw output of a finished or killed command
#[derive(Debug)]
pub(super) struct CommandOutput {
    pub status: Option<ExitStatus>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    /// Some output was discarded past the capture cap
    pub truncated: bool,
}

/// Run `command` and turn its output into a tool result
pub(super) async fn run(config: &ExecutorConfig, command: &str) -> Result<ActionResult> {
    let output = execute(config, command).await?;
    if output.timed_out {
        return Err(NohupError::CommandTimeout {
            timeout: config.command_timeout,
        });
    }

    let mut combined = output.stdout;
    if !output.stderr.trim().is_empty() {
        if !combined.is_empty() && !combined.ends_with('\n') {
            combined.push('\n');
        }
        combined.push_str("[stderr]\n");
        combined.push_str(&output.stderr);
    }
    let mut combined = truncate_chars(&combined, config.command_output_limit);
    if output.truncated && !combined.ends_with(TRUNCATION_MARKER) {
        combined.push_str(TRUNCATION_MARKER);
    }

    match output.status {
        Some(status) if status.success() => {
            if combined.trim().is_empty() {
                Ok(ActionResult::Success(
                    "Command completed with no output.".to_string(),
                ))
            } else {
                Ok(ActionResult::Success(combined))
            }
        }
        Some(status) => Ok(ActionResult::failure(format!(
            "Command failed ({})\n{}",
            describe_status(status),
            combined
        ))),
        None => Ok(ActionResult::failure(format!(
            "Command produced no exit status\n{}",
            combined
        ))),
    }
}

pub(super) async fn execute(config: &ExecutorConfig, command: &str) -> Result<CommandOutput> {
    let mut cmd = Command::new(&config.shell);
    cmd.arg("-c")
        .arg(command)
        .current_dir(&config.working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = cmd.spawn().map_err(|e| {
        NohupError::ProcessSpawn(format!("{} -c {:?}: {}", config.shell.display(), command, e))
    })?;
    tracing::debug!(pid = ?child.id(), command, "Spawned command");

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| NohupError::internal("stdout pipe not available"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| NohupError::internal("stderr pipe not available"))?;
    let cap = config.command_output_limit.saturating_mul(MAX_BYTES_PER_CHAR);
    let stdout_buf = CappedBuffer::shared(cap);
    let stderr_buf = CappedBuffer::shared(cap);
    let mut stdout_task = tokio::spawn(read_capped(stdout, Arc::clone(&stdout_buf)));
    let mut stderr_task = tokio::spawn(read_capped(stderr, Arc::clone(&stderr_buf)));

    let (status, timed_out) = tokio::select! {
        status = child.wait() => (Some(status?), false),
        _ = tokio::time::sleep(config.command_timeout) => {
            tracing::warn!(command, timeout = ?config.command_timeout, "Command timed out, killing process group");
            kill_process_group(&child)?;
            child.start_kill()?;
            let status = child.wait().await.ok();
            (status, true)
        }
    };

    drain(&mut stdout_task).await;
    drain(&mut stderr_task).await;

    let (stdout, stdout_truncated) = CappedBuffer::take(&stdout_buf);
    let (stderr, stderr_truncated) = CappedBuffer::take(&stderr_buf);
    let truncated = stdout_truncated || stderr_truncated;
    if truncated {
        tracing::debug!(command, cap, "Command output exceeded capture cap");
    }

    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        timed_out,
        truncated,
    })
}

/// Output captured from one pipe, bounded to `cap` bytes
#[derive(Debug)]
struct CappedBuffer {
    bytes: Vec<u8>,
    cap: usize,
    truncated: bool,
}

impl CappedBuffer {
    fn shared(cap: usize) -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self {
            bytes: Vec::new(),
            cap,
            truncated: false,
        }))
    }

    fn append(&mut self, chunk: &[u8]) {
        let room = self.cap.saturating_sub(self.bytes.len());
        if chunk.len() > room {
            self.truncated = true;
        }
        self.bytes.extend_from_slice(&chunk[..chunk.len().min(room)]);
    }

    /// Whatever has been captured so far, even if the reader is still running
    fn take(buf: &Mutex<Self>) -> (String, bool) {
        match buf.lock() {
            Ok(mut buf) => {
                let bytes = std::mem::take(&mut buf.bytes);
                (String::from_utf8_lossy(&bytes).into_owned(), buf.truncated)
            }
            Err(_) => (String::new(), false),
        }
    }
}

/// Read a pipe to EOF, keeping only what fits in `buf`
///
/// Reading continues past the cap so the child never blocks on a full pipe.
async fn read_capped<R: AsyncRead + Unpin>(
    mut reader: R,
    buf: Arc<Mutex<CappedBuffer>>,
) -> io::Result<()> {
    let mut tmp = [0u8; READ_CHUNK_SIZE];
    loop {
        let n = reader.read(&mut tmp).await?;
        if n == 0 {
            return Ok(());
        }
        match buf.lock() {
            Ok(mut buf) => buf.append(&tmp[..n]),
            Err(_) => return Err(io::Error::other("output buffer poisoned")),
        }
    }
}

/// Wait for a pipe reader, giving up if a stray grandchild keeps it open
async fn drain(handle: &mut JoinHandle<io::Result<()>>) {
    match tokio::time::timeout(IO_DRAIN_TIMEOUT, &mut *handle).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => tracing::warn!("Failed to read command output: {}", e),
        Ok(Err(e)) => tracing::warn!("Output reader task failed: {}", e),
        Err(_) => {
            tracing::debug!("Output pipe still open after exit, keeping partial output");
            handle.abort();
        }
    }
}

fn describe_status(status: ExitStatus) -> String {
    if let Some(code) = status.code() {
        return format!("exit code {}", code);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return format!("killed by signal {}", signal);
        }
    }
    status.to_string()
}

#[cfg(unix)]
fn kill_process_group(child: &Child) -> io::Result<()> {
    if let Some(pid) = child.id() {
        // The child leads its own group, so the group id is its pid.
        let result = unsafe { libc::killpg(pid as libc::pid_t, libc::SIGKILL) };
        if result == -1 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() != Some(libc::ESRCH) {
                return Err(err);
            }
        }
    }
    Ok(())
}

#[cfg(not(unix))]
fn kill_process_group(_: &Child) -> io::Result<()> {
    Ok(())
}
