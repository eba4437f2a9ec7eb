//! Service table, launcher, reaper, orchestrator, and control protocol.
//!
//! This crate owns everything downstream of the service declarations
//! parsed by `airride-config`: the mutex-guarded runtime table, the
//! fork/exec launcher, the single-site reaper, dependency-ordered
//! start/stop, and the Unix-socket control endpoint.

mod control;
mod error;
mod launch;
mod orchestrate;
mod reap;
mod state;

pub use control::ControlEndpoint;
pub use error::SupervisorError;
pub use orchestrate::{autostart, restart, start, stop};
pub use reap::reap_all;
pub use state::{ServiceEntry, ServiceRuntime, ServiceState, ServiceTable, MAX_AUTO_RESTARTS};
