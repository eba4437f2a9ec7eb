//! The declarative half of a service: everything the loader produces from a
//! `.service` file. Runtime state (current pid, failure count, ...) lives in
//! `airride-core` alongside this struct.

use std::collections::HashSet;
use std::path::PathBuf;

/// Suffix recognized by the loader when scanning the services directory.
pub const SERVICE_SUFFIX: &str = ".service";

/// How a service's lifetime is managed. `Forking` is parsed but otherwise
/// treated identically to `Simple` — airride does not read PID files, same
/// as the source this grammar was distilled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    Simple,
    Forking,
    OneShot,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub name: String,
    pub description: String,
    pub exec_start: String,
    pub exec_stop: Option<String>,
    pub kind: ServiceKind,
    pub tty: Option<PathBuf>,
    pub foreground: bool,
    pub requires: HashSet<String>,
    pub after: HashSet<String>,
    pub autostart: bool,
    pub parallel: bool,
    pub restart_on_failure: bool,
    pub restart_delay: u64,
    pub clear_screen: bool,
}

impl ServiceConfig {
    fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: String::new(),
            exec_start: String::new(),
            exec_stop: None,
            kind: ServiceKind::Simple,
            tty: None,
            foreground: false,
            requires: HashSet::new(),
            after: HashSet::new(),
            autostart: false,
            parallel: false,
            restart_on_failure: false,
            restart_delay: 0,
            clear_screen: false,
        }
    }

    /// Whether this service belongs in the autostart "terminal" group
    /// (explicit tty, or attaches to the console).
    pub fn is_terminal(&self) -> bool {
        self.tty.is_some() || self.foreground
    }
}

/// The built-in emergency shell, always present after loading completes
/// regardless of what the services directory contains.
pub fn built_in_shell() -> ServiceConfig {
    let mut svc = ServiceConfig::named("shell");
    svc.description = "Emergency shell".to_string();
    svc.exec_start = "/bin/sh".to_string();
    svc.kind = ServiceKind::Simple;
    svc.foreground = true;
    svc
}
