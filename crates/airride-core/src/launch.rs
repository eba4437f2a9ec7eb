//! Forks and execs a service's start command.
//!
//! Terminal attachment and log redirection both happen inside a
//! `pre_exec` hook, so they run in the child, after `fork`, before
//! `exec` — the same boundary the kernel gives `setsid`. The returned
//! `Child` is never waited on here; the caller drops the handle
//! immediately (dropping a `Child` does not wait or kill it) so the
//! reaper is the only code path that ever calls `waitpid` on it.

use std::fs::OpenOptions;
use std::io;
use std::os::fd::AsRawFd;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use airride_config::ServiceConfig;
use nix::unistd::Pid;

const CONSOLE: &str = "/dev/console";
const CLEAR_SCREEN: &[u8] = b"\x1b[2J\x1b[H";

/// Start one service's process, returning its pid.
pub fn spawn(config: &ServiceConfig, log_dir: &Path) -> io::Result<Pid> {
    let mut parts = config.exec_start.split_whitespace();
    let program = parts
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty exec_start"))?
        .to_string();
    let args: Vec<String> = parts.map(str::to_string).collect();

    let mut cmd = Command::new(program);
    cmd.args(&args);
    cmd.stdin(Stdio::null());

    match terminal_path(config) {
        Some(tty) => {
            let clear = config.clear_screen;
            cmd.stdout(Stdio::null());
            cmd.stderr(Stdio::null());
            unsafe {
                cmd.pre_exec(move || attach_terminal(&tty, clear));
            }
        }
        None => {
            let (out, err) = log_files(config, log_dir);
            cmd.stdout(out);
            cmd.stderr(err);
            unsafe {
                cmd.pre_exec(|| nix::unistd::setsid().map(|_| ()).map_err(to_io_err));
            }
        }
    }

    let child = cmd.spawn()?;
    Ok(Pid::from_raw(child.id() as i32))
}

/// Which terminal, if any, this service should become the foreground
/// process group of. An explicit `tty=` wins; a `foreground` service
/// with no explicit tty attaches to the console.
fn terminal_path(config: &ServiceConfig) -> Option<PathBuf> {
    if let Some(tty) = &config.tty {
        Some(tty.clone())
    } else if config.foreground {
        Some(PathBuf::from(CONSOLE))
    } else {
        None
    }
}

/// Runs in the child, before exec: start a new session, open the
/// terminal, make it the controlling terminal, and wire it to
/// stdin/stdout/stderr.
fn attach_terminal(path: &Path, clear_screen: bool) -> io::Result<()> {
    nix::unistd::setsid().map_err(to_io_err)?;

    let tty = OpenOptions::new().read(true).write(true).open(path)?;
    let fd = tty.as_raw_fd();

    let rc = unsafe { libc::ioctl(fd, libc::TIOCSCTTY as _, 0) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }

    if clear_screen {
        use std::io::Write as _;
        let _ = (&tty).write_all(CLEAR_SCREEN);
    }

    for target in 0..=2 {
        if fd != target {
            nix::unistd::dup2(fd, target).map_err(to_io_err)?;
        }
    }
    Ok(())
}

/// Open (creating if needed) this service's append-only log file for
/// stdout and stderr. Falls back to discarding output entirely rather
/// than failing the whole launch over a log directory problem.
fn log_files(config: &ServiceConfig, log_dir: &Path) -> (Stdio, Stdio) {
    let path = log_dir.join(format!("{}.log", config.name));
    let open = || OpenOptions::new().create(true).append(true).open(&path);
    match (open(), open()) {
        (Ok(out), Ok(err)) => (Stdio::from(out), Stdio::from(err)),
        _ => (Stdio::null(), Stdio::null()),
    }
}

fn to_io_err(e: nix::Error) -> io::Error {
    io::Error::from_raw_os_error(e as i32)
}
