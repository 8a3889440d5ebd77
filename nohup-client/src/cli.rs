//! Command-line argument parsing for nohup-desk
//!
//! Uses clap for argument parsing with derive macros.

use std::path::PathBuf;

use clap::Parser;

use nohup_client::{ClientConfig, SessionId};
use nohup_utils::{LogConfig, Result};

/// nohup-desk - session core for the nohup desktop companion
///
/// Reads UI intents as JSON lines on stdin and writes UI events as JSON
/// lines on stdout.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Agent backend WebSocket URL
    ///
    /// Overrides `[backend] url` from the config file.
    /// Example: ws://localhost:8000/ws
    #[arg(long, env = "NOHUP_URL")]
    pub url: Option<String>,

    /// Config file path
    ///
    /// Defaults to config.toml in the nohup config directory. An explicit
    /// path must exist and parse.
    #[arg(long, short = 'c', env = "NOHUP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Working directory for commands and relative file paths
    #[arg(long, short = 'C')]
    pub working_dir: Option<PathBuf>,

    /// Resume an existing session instead of starting a new one
    #[arg(long)]
    pub session: Option<SessionId>,

    /// Log at debug level to stderr instead of the log file
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

impl Args {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn log_config(&self) -> LogConfig {
        if self.verbose {
            LogConfig::development()
        } else {
            LogConfig::client()
        }
    }

    /// Load the config file and apply command-line overrides
    pub fn load_config(&self) -> Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::load_from(path)?,
            None => ClientConfig::load_or_default(),
        };
        self.apply_overrides(&mut config);
        Ok(config)
    }

    fn apply_overrides(&self, config: &mut ClientConfig) {
        if let Some(url) = &self.url {
            config.backend.url = url.clone();
        }
        if let Some(dir) = &self.working_dir {
            config.actions.working_dir = Some(dir.to_string_lossy().into_owned());
        }
    }
}
