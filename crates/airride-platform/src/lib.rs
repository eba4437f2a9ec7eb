//! Platform bootstrap: mount virtual filesystems, create device nodes, and
//! set the hostname. One-shot, and only meaningful when running as PID 1.
//!
//! Every individual step is best-effort — a failed mount or device node
//! does not stop the rest of bootstrap, so that a broken image can still
//! produce an emergency shell (spec section 4.A / `BootstrapPartial`).

mod devices;
mod hostname;
mod mounts;

pub use hostname::read_hostname;

use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("failed to mount {target}: {source}")]
    Mount { target: String, source: nix::Error },

    #[error("failed to create device node {path}: {source}")]
    MkNod { path: String, source: nix::Error },

    #[error("failed to set hostname: {0}")]
    Hostname(String),
}

pub fn is_process_one() -> bool {
    std::process::id() == 1
}

/// Run the full bootstrap sequence: mounts, device nodes, hostname. Only
/// called when [`is_process_one`] is true; the caller is expected to log
/// "test mode" and skip this entirely otherwise (spec section 4.A).
pub fn bootstrap(log_dir: &Path, hostname_file: &Path) {
    mounts::mount_all(log_dir);
    devices::make_all();

    let name = hostname::read_hostname(hostname_file);
    if let Err(e) = hostname::set_hostname(&name) {
        tracing::warn!("{}", e);
    }
}
