//! Dependency resolution, phase-ordered autostart, and individual
//! start/stop/restart. The orchestrator is the only module that knows
//! about `requires`/`after` ordering; it drives the launcher and leaves
//! reaping to [`crate::reap`].

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use airride_config::{ServiceConfig, ServiceKind};
use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use tracing::{info, warn};

use crate::error::SupervisorError;
use crate::launch;
use crate::state::{ServiceState, ServiceTable};

/// Start `name`, expanding `requires` recursively and waiting
/// best-effort on `after`. A no-op (success) if already Starting or
/// Running.
pub fn start(table: &Arc<ServiceTable>, log_dir: &Path, name: &str) -> Result<(), SupervisorError> {
    let mut visiting = HashSet::new();
    start_inner(table, log_dir, name, &mut visiting)
}

fn start_inner(
    table: &Arc<ServiceTable>,
    log_dir: &Path,
    name: &str,
    visiting: &mut HashSet<String>,
) -> Result<(), SupervisorError> {
    if visiting.contains(name) {
        return Err(SupervisorError::Cycle(name.to_string()));
    }

    let config = {
        let mut guard = table.lock();
        let entry = guard
            .get_mut(name)
            .ok_or_else(|| SupervisorError::NotFound(name.to_string()))?;
        if matches!(
            entry.runtime.state,
            ServiceState::Running | ServiceState::Starting
        ) {
            return Ok(());
        }
        entry.runtime.state = ServiceState::Starting;
        entry.config.clone()
    };

    visiting.insert(name.to_string());

    for dep in &config.requires {
        if let Err(e) = start_inner(table, log_dir, dep, visiting) {
            warn!(
                "service {} failed: required dependency {} did not start ({})",
                name, dep, e
            );
            mark_failed(table, name);
            visiting.remove(name);
            return Err(SupervisorError::StartFailed(name.to_string()));
        }
    }

    for dep in &config.after {
        wait_after(table, dep);
    }

    let outcome = launch_and_record(table, log_dir, name, &config);
    visiting.remove(name);
    outcome
}

/// Best-effort wait for a soft (`after`) dependency: up to ten seconds,
/// polled every hundred milliseconds. Never fails the caller.
fn wait_after(table: &Arc<ServiceTable>, dep: &str) {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        let settled = {
            let guard = table.lock();
            match guard.get(dep) {
                Some(entry) => matches!(
                    (entry.runtime.state, entry.config.kind),
                    (ServiceState::Running, _)
                        | (ServiceState::Failed, _)
                        | (ServiceState::Stopped, ServiceKind::OneShot)
                ),
                None => true,
            }
        };
        if settled || Instant::now() >= deadline {
            return;
        }
        thread::sleep(Duration::from_millis(100));
    }
}

/// Fork/exec `name` and record the result. For one-shot services, also
/// waits synchronously for completion under the reap lock so the
/// steady-state reaper can never observe the same exit.
fn launch_and_record(
    table: &Arc<ServiceTable>,
    log_dir: &Path,
    name: &str,
    config: &ServiceConfig,
) -> Result<(), SupervisorError> {
    let pid = match launch::spawn(config, log_dir) {
        Ok(pid) => pid,
        Err(e) => {
            warn!("failed to launch {}: {}", name, e);
            mark_failed(table, name);
            return Err(SupervisorError::StartFailed(name.to_string()));
        }
    };

    {
        let mut guard = table.lock();
        if let Some(entry) = guard.get_mut(name) {
            entry.runtime.pid = Some(pid);
            entry.runtime.state = ServiceState::Running;
        }
    }
    info!("service {} started (pid {})", name, pid);

    if config.kind != ServiceKind::OneShot {
        return Ok(());
    }

    let _reap_guard = table.reap_guard();
    let status = waitpid(pid, None);
    let success = matches!(status, Ok(WaitStatus::Exited(_, 0)));

    {
        let mut guard = table.lock();
        if let Some(entry) = guard.get_mut(name) {
            entry.runtime.pid = None;
            entry.runtime.state = if success {
                ServiceState::Stopped
            } else {
                ServiceState::Failed
            };
        }
    }

    if success {
        info!("one-shot service {} completed", name);
        Ok(())
    } else {
        warn!("one-shot service {} exited with failure", name);
        Err(SupervisorError::StartFailed(name.to_string()))
    }
}

fn mark_failed(table: &Arc<ServiceTable>, name: &str) {
    let mut guard = table.lock();
    if let Some(entry) = guard.get_mut(name) {
        entry.runtime.state = ServiceState::Failed;
    }
}

/// Stop `name`: a no-op (success) if not Running. Sends the graceful
/// signal, polls for exit up to five seconds, then escalates to an
/// unconditional kill and waits synchronously for it.
pub fn stop(table: &Arc<ServiceTable>, name: &str) -> Result<(), SupervisorError> {
    let pid = {
        let mut guard = table.lock();
        let entry = guard
            .get_mut(name)
            .ok_or_else(|| SupervisorError::NotFound(name.to_string()))?;
        match entry.runtime.pid {
            Some(pid) if entry.runtime.state == ServiceState::Running => {
                entry.runtime.state = ServiceState::Stopping;
                pid
            }
            _ => return Ok(()),
        }
    };

    let _reap_guard = table.reap_guard();
    let _ = signal::kill(pid, Signal::SIGTERM);

    let mut exited = false;
    for _ in 0..50 {
        match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) => thread::sleep(Duration::from_millis(100)),
            Ok(_) => {
                exited = true;
                break;
            }
            Err(Errno::ECHILD) => {
                exited = true;
                break;
            }
            Err(_) => break,
        }
    }

    if !exited {
        warn!("service {} did not exit gracefully, killing", name);
        let _ = signal::kill(pid, Signal::SIGKILL);
        let _ = waitpid(pid, None);
    }

    let mut guard = table.lock();
    if let Some(entry) = guard.get_mut(name) {
        entry.runtime.pid = None;
        entry.runtime.state = ServiceState::Stopped;
    }
    info!("service {} stopped", name);
    Ok(())
}

/// Stop, settle, then start again.
pub fn restart(
    table: &Arc<ServiceTable>,
    log_dir: &Path,
    name: &str,
) -> Result<(), SupervisorError> {
    stop(table, name)?;
    thread::sleep(Duration::from_millis(500));
    start(table, log_dir, name)
}

/// The one-time boot-time launch of every autostart service, phased
/// parallel → sequential → settle → terminal.
pub fn autostart(table: &Arc<ServiceTable>, log_dir: &Path) {
    let (terminal, parallel, sequential) = partition_autostart(table);

    info!(
        "autostart: {} terminal, {} parallel, {} sequential",
        terminal.len(),
        parallel.len(),
        sequential.len()
    );

    let handles: Vec<_> = parallel
        .into_iter()
        .map(|name| {
            let table = Arc::clone(table);
            let log_dir = log_dir.to_path_buf();
            thread::spawn(move || {
                if let Err(e) = start(&table, &log_dir, &name) {
                    warn!("autostart of {} failed: {}", name, e);
                }
            })
        })
        .collect();

    for name in sequential {
        if let Err(e) = start(table, log_dir, &name) {
            warn!("autostart of {} failed: {}", name, e);
        }
    }

    for handle in handles {
        let _ = handle.join();
    }

    thread::sleep(Duration::from_millis(500));
    clear_console();

    if terminal.is_empty() {
        if let Err(e) = start(table, log_dir, "shell") {
            warn!("failed to launch emergency shell: {}", e);
        }
    } else {
        for name in terminal {
            if let Err(e) = start(table, log_dir, &name) {
                warn!("autostart of {} failed: {}", name, e);
            }
        }
    }
}

fn partition_autostart(table: &Arc<ServiceTable>) -> (Vec<String>, Vec<String>, Vec<String>) {
    let guard = table.lock();
    let mut terminal = Vec::new();
    let mut parallel = Vec::new();
    let mut sequential = Vec::new();
    for entry in guard.values() {
        if !entry.config.autostart {
            continue;
        }
        if entry.config.is_terminal() {
            terminal.push(entry.config.name.clone());
        } else if entry.config.parallel {
            parallel.push(entry.config.name.clone());
        } else {
            sequential.push(entry.config.name.clone());
        }
    }
    (terminal, parallel, sequential)
}

fn clear_console() {
    let _ = std::fs::write("/dev/console", b"\x1b[2J\x1b[H");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bg_service(name: &str, exec: &str) -> ServiceConfig {
        let mut svc = airride_config::built_in_shell();
        svc.name = name.to_string();
        svc.foreground = false;
        svc.tty = None;
        svc.exec_start = exec.to_string();
        svc
    }

    #[test]
    fn one_shot_success_ends_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let mut svc = bg_service("probe", "/bin/true");
        svc.kind = ServiceKind::OneShot;
        let table = Arc::new(ServiceTable::new(vec![svc]));

        assert!(start(&table, dir.path(), "probe").is_ok());

        let guard = table.lock();
        let entry = guard.get("probe").unwrap();
        assert_eq!(entry.runtime.state, ServiceState::Stopped);
        assert!(entry.runtime.pid.is_none());
        assert_eq!(entry.runtime.failure_count, 0);
    }

    #[test]
    fn one_shot_failure_ends_failed() {
        let dir = tempfile::tempdir().unwrap();
        let mut svc = bg_service("probe", "/bin/false");
        svc.kind = ServiceKind::OneShot;
        let table = Arc::new(ServiceTable::new(vec![svc]));

        assert!(start(&table, dir.path(), "probe").is_err());

        let guard = table.lock();
        assert_eq!(guard.get("probe").unwrap().runtime.state, ServiceState::Failed);
    }

    #[test]
    fn dependency_chain_starts_requires_first() {
        let dir = tempfile::tempdir().unwrap();
        let a = bg_service("a", "/bin/cat");
        let mut b = bg_service("b", "/bin/cat");
        b.requires.insert("a".to_string());
        let table = Arc::new(ServiceTable::new(vec![a, b]));

        assert!(start(&table, dir.path(), "b").is_ok());

        let guard = table.lock();
        assert_eq!(guard.get("a").unwrap().runtime.state, ServiceState::Running);
        assert_eq!(guard.get("b").unwrap().runtime.state, ServiceState::Running);
        drop(guard);

        let _ = stop(&table, "a");
        let _ = stop(&table, "b");
    }

    #[test]
    fn missing_requires_fails_without_blocking() {
        let dir = tempfile::tempdir().unwrap();
        let mut b = bg_service("b", "/bin/cat");
        b.requires.insert("nonexistent".to_string());
        let table = Arc::new(ServiceTable::new(vec![b]));

        assert!(start(&table, dir.path(), "b").is_err());
        let guard = table.lock();
        assert_eq!(guard.get("b").unwrap().runtime.state, ServiceState::Failed);
    }

    #[test]
    fn cycle_in_requires_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut a = bg_service("a", "/bin/cat");
        a.requires.insert("b".to_string());
        let mut b = bg_service("b", "/bin/cat");
        b.requires.insert("a".to_string());
        let table = Arc::new(ServiceTable::new(vec![a, b]));

        assert!(start(&table, dir.path(), "a").is_err());
    }

    #[test]
    fn start_on_running_service_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let svc = bg_service("echo", "/bin/cat");
        let table = Arc::new(ServiceTable::new(vec![svc]));

        assert!(start(&table, dir.path(), "echo").is_ok());
        let first_pid = table.lock().get("echo").unwrap().runtime.pid;

        assert!(start(&table, dir.path(), "echo").is_ok());
        let second_pid = table.lock().get("echo").unwrap().runtime.pid;
        assert_eq!(first_pid, second_pid);

        let _ = stop(&table, "echo");
    }

    #[test]
    fn stop_on_non_running_service_is_a_no_op() {
        let table = Arc::new(ServiceTable::new(vec![bg_service("echo", "/bin/cat")]));
        assert!(stop(&table, "echo").is_ok());
        assert_eq!(
            table.lock().get("echo").unwrap().runtime.state,
            ServiceState::Stopped
        );
    }

    #[test]
    fn simple_start_then_stop() {
        let dir = tempfile::tempdir().unwrap();
        let table = Arc::new(ServiceTable::new(vec![bg_service("echo", "/bin/cat")]));

        assert!(start(&table, dir.path(), "echo").is_ok());
        assert_eq!(
            table.lock().get("echo").unwrap().runtime.state,
            ServiceState::Running
        );

        assert!(stop(&table, "echo").is_ok());
        let guard = table.lock();
        let entry = guard.get("echo").unwrap();
        assert_eq!(entry.runtime.state, ServiceState::Stopped);
        assert!(entry.runtime.pid.is_none());
    }
}
