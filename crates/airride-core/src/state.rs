//! The service table: the single mutex-guarded map of name to service
//! entry. Entries are created once at load time and never removed —
//! only the state/pid/failure-count fields mutate thereafter.

use airride_config::ServiceConfig;
use nix::unistd::Pid;
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Failed,
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServiceState::Stopped => "stopped",
            ServiceState::Starting => "starting",
            ServiceState::Running => "running",
            ServiceState::Stopping => "stopping",
            ServiceState::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct ServiceRuntime {
    pub state: ServiceState,
    pub pid: Option<Pid>,
    pub failure_count: u32,
}

impl Default for ServiceRuntime {
    fn default() -> Self {
        Self {
            state: ServiceState::Stopped,
            pid: None,
            failure_count: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServiceEntry {
    pub config: ServiceConfig,
    pub runtime: ServiceRuntime,
}

/// Maximum number of automatic restarts before the restart fuse blows
/// (spec section 4.E / testable property 10).
pub const MAX_AUTO_RESTARTS: u32 = 10;

pub struct ServiceTable {
    inner: Mutex<HashMap<String, ServiceEntry>>,
    /// Serializes every `waitpid` call site (the steady-state reaper, the
    /// one-shot launcher's synchronous wait, and stop's graceful-exit
    /// poll). Distinct from `inner`, which only ever guards data: holding
    /// this one can legitimately span a blocking syscall, so it must
    /// never be acquired while `inner` is held.
    reap_lock: Mutex<()>,
}

impl ServiceTable {
    pub fn new(configs: Vec<ServiceConfig>) -> Self {
        let mut map = HashMap::with_capacity(configs.len());
        for config in configs {
            let name = config.name.clone();
            map.insert(
                name,
                ServiceEntry {
                    config,
                    runtime: ServiceRuntime::default(),
                },
            );
        }
        Self {
            inner: Mutex::new(map),
            reap_lock: Mutex::new(()),
        }
    }

    /// Acquire the single table-wide data lock. Callers must keep the
    /// critical section short: inspect/mutate fields, then release
    /// before any syscall that can block (fork/exec, wait, sleep, read,
    /// write).
    pub fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, ServiceEntry>> {
        self.inner.lock().unwrap_or_else(|poison| poison.into_inner())
    }

    /// Acquire the reap lock for the duration of a `waitpid` call (or a
    /// bounded sequence of them). Rules out the double-reap race between
    /// the steady-state reaper and a synchronous one-shot/stop wait.
    pub fn reap_guard(&self) -> std::sync::MutexGuard<'_, ()> {
        self.reap_lock
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use airride_config::built_in_shell;

    #[test]
    fn new_table_has_stopped_entries() {
        let table = ServiceTable::new(vec![built_in_shell()]);
        let guard = table.lock();
        let entry = guard.get("shell").unwrap();
        assert_eq!(entry.runtime.state, ServiceState::Stopped);
        assert!(entry.runtime.pid.is_none());
        assert_eq!(entry.runtime.failure_count, 0);
    }

    #[test]
    fn display_matches_status_reply_vocabulary() {
        assert_eq!(ServiceState::Stopped.to_string(), "stopped");
        assert_eq!(ServiceState::Running.to_string(), "running");
        assert_eq!(ServiceState::Failed.to_string(), "failed");
    }
}
