//! nohup-utils: Common utilities shared across nohup crates
//!
//! This crate provides:
//! - Unified error types ([`NohupError`], [`Result`])
//! - Logging infrastructure ([`init_logging_with_config`], [`LogConfig`])
//! - XDG-compliant path utilities ([`paths`] module)

pub mod error;
pub mod logging;
pub mod paths;

pub use error::{NohupError, Result};
pub use logging::{init_logging_with_config, LogConfig, LogOutput};

pub use paths::{config_dir, config_file, expand_home, home_dir, log_dir, resolve_path, state_dir};
