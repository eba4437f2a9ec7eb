//! Service declaration parsing and daemon configuration for airride.
//!
//! Handles the `[Service]`/`[Dependencies]` declaration grammar read from
//! `/etc/airride/services/*.service`, plus the optional daemon-level
//! `/etc/airride/airride.toml` configuration file.

mod daemon_config;
mod parser;
mod service;

pub use daemon_config::DaemonConfig;
pub use parser::load_dir;
pub use service::{built_in_shell, ServiceConfig, ServiceKind, SERVICE_SUFFIX};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse daemon configuration: {0}")]
    TomlParse(#[from] toml::de::Error),
}
