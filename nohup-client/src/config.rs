//! Client configuration loading
//!
//! Reads `[backend]` and `[actions]` from the shared config file. Every field
//! has a default, so a missing file or a missing section is not an error.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use nohup_utils::{config_file, expand_home, NohupError, Result};

use crate::executor::ExecutorConfig;
use crate::pending::ApprovalPolicy;

/// Top-level configuration file
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub backend: BackendConfig,
    pub actions: ActionsConfig,
}

/// Agent backend connection settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// WebSocket endpoint, without the session parameter
    pub url: String,
    /// Fixed delay before reconnecting after an unexpected disconnect
    pub reconnect_delay_ms: u64,
    pub connect_timeout_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8000/ws".into(),
            reconnect_delay_ms: 5000,
            connect_timeout_ms: 10_000,
        }
    }
}

/// Local tool execution settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ActionsConfig {
    /// Working directory for commands and relative paths (default: cwd)
    pub working_dir: Option<String>,
    pub shell: String,
    pub command_timeout_secs: u64,
    pub command_output_limit: usize,
    pub file_read_limit: usize,
    pub paste_delay_ms: u64,
    /// Tools that run without asking
    pub auto_approve: Vec<String>,
    /// Expire undecided tool calls after this long (default: never)
    pub pending_timeout_secs: Option<u64>,
}

impl Default for ActionsConfig {
    fn default() -> Self {
        Self {
            working_dir: None,
            shell: "/bin/sh".into(),
            command_timeout_secs: 15,
            command_output_limit: 1000,
            file_read_limit: 2000,
            paste_delay_ms: 150,
            auto_approve: vec![nohup_protocol::tools::PASTE_AT_CURSOR.into()],
            pending_timeout_secs: None,
        }
    }
}

impl ClientConfig {
    /// Parse a config file, failing on unreadable or invalid files
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| NohupError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    /// Load the default config file
    ///
    /// Returns defaults if the file doesn't exist or can't be parsed.
    pub fn load_or_default() -> Self {
        let path = config_file();

        if !path.exists() {
            tracing::debug!("Config file not found, using defaults");
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(config) => {
                tracing::debug!(path = %path.display(), "Loaded config");
                config
            }
            Err(e) => {
                tracing::warn!("{}, using defaults", e);
                Self::default()
            }
        }
    }

    fn parse(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| NohupError::ConfigInvalid {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Validated backend endpoint
    pub fn endpoint(&self) -> Result<Url> {
        let url = Url::parse(&self.backend.url)
            .map_err(|e| NohupError::config(format!("invalid backend url '{}': {}", self.backend.url, e)))?;
        match url.scheme() {
            "ws" | "wss" => Ok(url),
            other => Err(NohupError::config(format!(
                "backend url must use ws:// or wss://, got {}://",
                other
            ))),
        }
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.backend.reconnect_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.backend.connect_timeout_ms)
    }

    pub fn pending_timeout(&self) -> Option<Duration> {
        self.actions
            .pending_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    pub fn approval_policy(&self) -> ApprovalPolicy {
        ApprovalPolicy::from_names(self.actions.auto_approve.iter().cloned())
    }

    /// Working directory, falling back to the process's current directory
    pub fn working_dir(&self) -> Result<PathBuf> {
        match &self.actions.working_dir {
            Some(dir) => Ok(expand_home(dir)),
            None => Ok(std::env::current_dir()?),
        }
    }

    pub fn executor_config(&self) -> Result<ExecutorConfig> {
        Ok(ExecutorConfig {
            working_dir: self.working_dir()?,
            shell: PathBuf::from(&self.actions.shell),
            command_timeout: Duration::from_secs(self.actions.command_timeout_secs),
            command_output_limit: self.actions.command_output_limit,
            file_read_limit: self.actions.file_read_limit,
            paste_delay: Duration::from_millis(self.actions.paste_delay_ms),
        })
    }
}
