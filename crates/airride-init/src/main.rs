//! Airride Init System
//!
//! Minimal process-one supervisor: brings the root filesystem into a
//! usable state, loads service declarations, starts them according to
//! dependency and restart policy, and exposes a control socket that
//! `airridectl` speaks to.
//!
//! Boot sequence:
//! 1. Bootstrap the platform (mounts, device nodes, hostname) if PID 1.
//! 2. Load service declarations, injecting the built-in emergency shell.
//! 3. Run the phased autostart (parallel -> sequential -> settle -> terminal).
//! 4. Enter the steady-state loop: service one control connection, reap
//!    exited children, sleep.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use airride_config::DaemonConfig;
use airride_core::{ControlEndpoint, ServiceTable};

/// Set by the SIGTERM/SIGINT handler. The steady-state loop only logs
/// this — process one is not supposed to exit on its own; the kernel
/// terminates it at power-off.
static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

fn main() -> Result<()> {
    setup_logging();
    info!("airride-init starting");

    let config = DaemonConfig::load_default();

    if airride_platform::is_process_one() {
        std::fs::create_dir_all(&config.log_dir).ok();
        airride_platform::bootstrap(&config.log_dir, &config.hostname_file);
    } else {
        info!("not running as PID 1 (pid={}), test mode", std::process::id());
    }

    setup_signal_handlers().context("failed to install signal handlers")?;
    reap_orphans_from_previous_life();

    std::fs::create_dir_all(&config.services_dir).ok();
    std::fs::create_dir_all(&config.log_dir).ok();

    let services = airride_config::load_dir(&config.services_dir);
    info!("loaded {} service declarations", services.len());
    let table = Arc::new(ServiceTable::new(services));

    airride_core::autostart(&table, &config.log_dir);

    let endpoint = ControlEndpoint::open(&config.socket_path);

    info!("entering steady state (tick = {} ms)", config.tick_ms);
    let tick = Duration::from_millis(config.tick_ms);
    loop {
        if SHUTDOWN_REQUESTED.load(Ordering::SeqCst) {
            warn!("shutdown signal received; process one keeps running regardless");
            SHUTDOWN_REQUESTED.store(false, Ordering::SeqCst);
        }

        endpoint.tick(&table, &config.log_dir);
        airride_core::reap_all(&table, &config.log_dir);

        std::thread::sleep(tick);
    }
}

fn setup_logging() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_ansi(false))
        .init();
}

/// Install handlers for the signals a process-one init is expected to
/// react to. SIGCHLD is deliberately left at its default disposition:
/// reaping is done by polling `waitpid` from the steady-state loop, not
/// from an async-signal-unsafe handler.
fn setup_signal_handlers() -> Result<()> {
    use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};

    let action = SigAction::new(
        SigHandler::Handler(handle_signal),
        SaFlags::empty(),
        SigSet::empty(),
    );

    unsafe {
        sigaction(Signal::SIGTERM, &action)?;
        sigaction(Signal::SIGINT, &action)?;
    }

    Ok(())
}

extern "C" fn handle_signal(sig: i32) {
    if sig == libc::SIGTERM || sig == libc::SIGINT {
        SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
    }
}

/// Process one inherits whatever the kernel re-parented to it before
/// this binary even started (e.g. across a re-exec). Drain those once
/// up front so the steady-state reaper starts from a clean slate.
fn reap_orphans_from_previous_life() {
    use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
    use nix::unistd::Pid;

    loop {
        match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) | Err(_) => break,
            Ok(_) => continue,
        }
    }
}
