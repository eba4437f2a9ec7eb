//! Character device node table (spec section 6).

use crate::PlatformError;
use nix::sys::stat::{makedev, mknod, Mode, SFlag};
use std::path::Path;
use tracing::{debug, warn};

struct DeviceSpec {
    path: &'static str,
    mode: u32,
    major: u64,
    minor: u64,
}

const DEVICES: &[DeviceSpec] = &[
    DeviceSpec { path: "/dev/console", mode: 0o600, major: 5, minor: 1 },
    DeviceSpec { path: "/dev/null", mode: 0o666, major: 1, minor: 3 },
    DeviceSpec { path: "/dev/zero", mode: 0o666, major: 1, minor: 5 },
    DeviceSpec { path: "/dev/random", mode: 0o666, major: 1, minor: 8 },
    DeviceSpec { path: "/dev/urandom", mode: 0o666, major: 1, minor: 9 },
    DeviceSpec { path: "/dev/tty", mode: 0o666, major: 5, minor: 0 },
    DeviceSpec { path: "/dev/tty0", mode: 0o620, major: 4, minor: 0 },
    DeviceSpec { path: "/dev/tty1", mode: 0o620, major: 4, minor: 1 },
    DeviceSpec { path: "/dev/tty2", mode: 0o620, major: 4, minor: 2 },
    DeviceSpec { path: "/dev/tty3", mode: 0o620, major: 4, minor: 3 },
    DeviceSpec { path: "/dev/ttyS0", mode: 0o660, major: 4, minor: 64 },
    DeviceSpec { path: "/dev/fb0", mode: 0o666, major: 29, minor: 0 },
    DeviceSpec { path: "/dev/dri/card0", mode: 0o666, major: 226, minor: 0 },
    DeviceSpec { path: "/dev/dri/renderD128", mode: 0o666, major: 226, minor: 128 },
];

/// Create the fixed set of character device nodes, skipping any that
/// already exist. Best-effort: a failure is logged and the rest proceed.
pub fn make_all() {
    for dev in DEVICES {
        if Path::new(dev.path).exists() {
            continue;
        }
        if let Err(e) = make_one(dev) {
            warn!("failed to create device node {}: {}", dev.path, e);
        } else {
            debug!("created device node {}", dev.path);
        }
    }
}

fn make_one(dev: &DeviceSpec) -> Result<(), PlatformError> {
    let mode = Mode::from_bits_truncate(dev.mode);
    mknod(dev.path, SFlag::S_IFCHR, mode, makedev(dev.major, dev.minor)).map_err(|e| {
        PlatformError::MkNod {
            path: dev.path.to_string(),
            source: e,
        }
    })
}
