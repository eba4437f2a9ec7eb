//! Reaps terminated children and drives the restart policy.
//!
//! This is the single call site for `waitpid` in the whole process: the
//! one-shot launcher in [`crate::orchestrate`] never waits on its own
//! child, it instead polls the table entry this function updates. That
//! is what rules out a double-reap race between the two.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use tracing::{debug, info, warn};

use crate::launch;
use crate::state::{ServiceState, ServiceTable, MAX_AUTO_RESTARTS};

/// Drain every terminated child currently waiting to be reaped,
/// updating the table and scheduling restarts as needed. Called once
/// per tick of the main loop.
pub fn reap_all(table: &Arc<ServiceTable>, log_dir: &Path) {
    let _guard = table.reap_guard();
    loop {
        match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::Exited(pid, code)) => handle_exit(table, log_dir, pid, code == 0),
            Ok(WaitStatus::Signaled(pid, signal, _)) => {
                debug!("child {} killed by signal {:?}", pid, signal);
                handle_exit(table, log_dir, pid, false);
            }
            Ok(WaitStatus::StillAlive) => break,
            Ok(_) => continue,
            Err(Errno::ECHILD) => break,
            Err(e) => {
                warn!("waitpid failed: {}", e);
                break;
            }
        }
    }
}

/// Update the table entry owning `pid` and, if the exit warrants it,
/// hand a restart off to a detached thread.
fn handle_exit(table: &Arc<ServiceTable>, log_dir: &Path, pid: Pid, success: bool) {
    let restart = {
        let mut guard = table.lock();
        let found = guard.iter_mut().find(|(_, e)| e.runtime.pid == Some(pid));
        let Some((name, entry)) = found else {
            debug!("reaped untracked pid {}", pid);
            return;
        };
        entry.runtime.pid = None;

        if entry.runtime.state == ServiceState::Stopping {
            info!("service {} stopped", name);
            entry.runtime.state = ServiceState::Stopped;
            entry.runtime.failure_count = 0;
            return;
        }

        if success {
            info!("service {} exited", name);
            entry.runtime.state = ServiceState::Stopped;
            entry.runtime.failure_count = 0;
            None
        } else if entry.config.restart_on_failure && entry.runtime.failure_count < MAX_AUTO_RESTARTS
        {
            entry.runtime.failure_count += 1;
            entry.runtime.state = ServiceState::Starting;
            warn!(
                "service {} failed ({}/{} restarts), restarting",
                name, entry.runtime.failure_count, MAX_AUTO_RESTARTS
            );
            Some((name.clone(), entry.config.restart_delay))
        } else {
            warn!("service {} failed, not restarting", name);
            entry.runtime.state = ServiceState::Failed;
            None
        }
    };

    if let Some((name, delay)) = restart {
        schedule_restart(Arc::clone(table), log_dir.to_path_buf(), name, delay);
    }
}

/// Respawn `name` on a detached thread after `delay_secs`, so the tick
/// loop that called [`reap_all`] is never blocked by a restart delay.
fn schedule_restart(table: Arc<ServiceTable>, log_dir: PathBuf, name: String, delay_secs: u64) {
    thread::spawn(move || {
        if delay_secs > 0 {
            thread::sleep(Duration::from_secs(delay_secs));
        }

        let config = {
            let guard = table.lock();
            guard.get(&name).map(|e| e.config.clone())
        };
        let Some(config) = config else { return };

        match launch::spawn(&config, &log_dir) {
            Ok(pid) => {
                let mut guard = table.lock();
                if let Some(entry) = guard.get_mut(&name) {
                    entry.runtime.pid = Some(pid);
                    entry.runtime.state = ServiceState::Running;
                }
                info!("service {} restarted (pid {})", name, pid);
            }
            Err(e) => {
                let mut guard = table.lock();
                if let Some(entry) = guard.get_mut(&name) {
                    entry.runtime.state = ServiceState::Failed;
                }
                warn!("failed to restart {}: {}", name, e);
            }
        }
    });
}
