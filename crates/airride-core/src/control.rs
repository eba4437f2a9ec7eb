//! The control endpoint: a filesystem-named Unix stream socket serving
//! one short request/reply exchange per connection. Bind failures
//! disable the endpoint silently — the supervisor keeps running
//! services either way, just without remote control.

use std::io::{Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::orchestrate;
use crate::state::ServiceTable;

const READ_BUF_SIZE: usize = 1024;

pub struct ControlEndpoint {
    listener: Option<UnixListener>,
}

impl ControlEndpoint {
    /// Bind the socket at `path`, replacing any stale entry left by a
    /// previous run. A bind or non-blocking-mode failure disables the
    /// endpoint rather than propagating — the supervisor is process
    /// one and must not fail to start over this.
    pub fn open(path: &Path) -> Self {
        let _ = std::fs::remove_file(path);
        match UnixListener::bind(path) {
            Ok(listener) => match listener.set_nonblocking(true) {
                Ok(()) => {
                    info!("control endpoint listening on {}", path.display());
                    Self {
                        listener: Some(listener),
                    }
                }
                Err(e) => {
                    warn!("control endpoint: failed to set non-blocking: {}", e);
                    Self { listener: None }
                }
            },
            Err(e) => {
                warn!("control endpoint unavailable ({}), continuing without it", e);
                Self { listener: None }
            }
        }
    }

    /// Accept and service at most one pending connection. A no-op if
    /// the endpoint failed to bind or nobody is waiting.
    pub fn tick(&self, table: &Arc<ServiceTable>, log_dir: &Path) {
        let Some(listener) = &self.listener else {
            return;
        };
        let stream = match listener.accept() {
            Ok((stream, _)) => stream,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => return,
            Err(e) => {
                warn!("control endpoint accept failed: {}", e);
                return;
            }
        };
        handle_connection(stream, table, log_dir);
    }
}

fn handle_connection(mut stream: UnixStream, table: &Arc<ServiceTable>, log_dir: &Path) {
    let mut buf = [0u8; READ_BUF_SIZE];
    let n = match stream.read(&mut buf) {
        Ok(n) => n,
        Err(e) => {
            warn!("control connection read failed: {}", e);
            return;
        }
    };
    let request = String::from_utf8_lossy(&buf[..n]);
    let reply = dispatch(request.trim(), table, log_dir);
    if let Err(e) = stream.write_all(reply.as_bytes()) {
        warn!("control connection write failed: {}", e);
    }
}

fn dispatch(request: &str, table: &Arc<ServiceTable>, log_dir: &Path) -> String {
    let mut parts = request.split_whitespace();
    let verb = parts.next().unwrap_or("");
    let arg = parts.next();

    match (verb, arg) {
        ("start", Some(name)) => ok_or_failed(orchestrate::start(table, log_dir, name)),
        ("stop", Some(name)) => ok_or_failed(orchestrate::stop(table, name)),
        ("restart", Some(name)) => ok_or_failed(orchestrate::restart(table, log_dir, name)),
        ("status", Some(name)) => status_reply(table, name),
        ("status", None) => "Service not found\n".to_string(),
        ("list", _) => list_reply(table),
        _ => "Unknown command\n".to_string(),
    }
}

fn ok_or_failed<E>(result: Result<(), E>) -> String {
    match result {
        Ok(()) => "OK\n".to_string(),
        Err(_) => "FAILED\n".to_string(),
    }
}

fn status_reply(table: &Arc<ServiceTable>, name: &str) -> String {
    let guard = table.lock();
    let Some(entry) = guard.get(name) else {
        return "Service not found\n".to_string();
    };

    let mut out = format!(
        "Service: {}\nDescription: {}\nState: {}\n",
        entry.config.name, entry.config.description, entry.runtime.state
    );
    if let Some(pid) = entry.runtime.pid {
        out.push_str(&format!("PID: {}\n", pid));
    }
    if let Some(tty) = &entry.config.tty {
        out.push_str(&format!("TTY: {}\n", tty.display()));
    }
    out
}

fn list_reply(table: &Arc<ServiceTable>) -> String {
    let guard = table.lock();
    let mut names: Vec<&String> = guard.keys().collect();
    names.sort();

    let mut out = String::from("Services:\n");
    for name in names {
        let entry = &guard[name];
        out.push_str("  ");
        out.push_str(name);
        out.push_str(" - ");
        out.push_str(&entry.runtime.state.to_string());
        if entry.config.autostart {
            out.push_str(" [auto]");
        }
        if let Some(tty) = &entry.config.tty {
            out.push_str(&format!(" [{}]", tty.display()));
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use airride_config::built_in_shell;
    use std::path::PathBuf;

    fn table_with_shell() -> Arc<ServiceTable> {
        Arc::new(ServiceTable::new(vec![built_in_shell()]))
    }

    #[test]
    fn unknown_verb_yields_unknown_command() {
        let table = table_with_shell();
        assert_eq!(
            dispatch("flop svc", &table, Path::new("/tmp")),
            "Unknown command\n"
        );
    }

    #[test]
    fn status_of_missing_service_is_reported() {
        let table = table_with_shell();
        assert_eq!(
            dispatch("status nope", &table, Path::new("/tmp")),
            "Service not found\n"
        );
    }

    #[test]
    fn status_reports_configured_fields() {
        let table = table_with_shell();
        let reply = status_reply(&table, "shell");
        assert!(reply.contains("Service: shell"));
        assert!(reply.contains("State: stopped"));
        assert!(!reply.contains("PID:"));
    }

    #[test]
    fn list_includes_autostart_and_tty_markers() {
        let mut svc = built_in_shell();
        svc.name = "getty".to_string();
        svc.autostart = true;
        svc.tty = Some(PathBuf::from("/dev/tty1"));
        let table = Arc::new(ServiceTable::new(vec![svc]));

        let reply = list_reply(&table);
        assert!(reply.starts_with("Services:\n"));
        assert!(reply.contains("getty - stopped [auto] [/dev/tty1]"));
    }
}
