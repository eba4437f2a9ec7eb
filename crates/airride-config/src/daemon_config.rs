//! Daemon-level configuration, distinct from the per-service declarations.
//!
//! Not part of the control protocol or the service grammar — just the small
//! set of paths and timings an operator might want to override without
//! rebuilding. Mirrors the teacher's "try an override file, fall back to
//! built-in defaults" shape.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Where the daemon looks for an override file, absent an explicit path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/airride/airride.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub socket_path: PathBuf,
    pub services_dir: PathBuf,
    pub log_dir: PathBuf,
    pub hostname_file: PathBuf,
    pub tick_ms: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from("/run/airride.sock"),
            services_dir: PathBuf::from("/etc/airride/services"),
            log_dir: PathBuf::from("/var/log/airride"),
            hostname_file: PathBuf::from("/etc/hostname"),
            tick_ms: 100,
        }
    }
}

impl DaemonConfig {
    pub fn load(path: &Path) -> Result<Self, crate::ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Load `/etc/airride/airride.toml` if present, else built-in defaults.
    /// A present-but-malformed file is logged and defaults are used instead
    /// rather than failing daemon startup — this file is a convenience, not
    /// a required boot dependency.
    pub fn load_default() -> Self {
        let path = Path::new(DEFAULT_CONFIG_PATH);
        if !path.exists() {
            return Self::default();
        }
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!("ignoring malformed {}: {}", DEFAULT_CONFIG_PATH, e);
                Self::default()
            }
        }
    }
}
