//! Virtual filesystem mount table (spec section 6).

use crate::PlatformError;
use nix::mount::{mount, MsFlags};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

struct MountSpec {
    target: &'static str,
    fstype: &'static str,
    flags: MsFlags,
    data: Option<&'static str>,
}

const MOUNTS: &[MountSpec] = &[
    MountSpec {
        target: "/proc",
        fstype: "proc",
        flags: MsFlags::MS_NOEXEC.union(MsFlags::MS_NOSUID).union(MsFlags::MS_NODEV),
        data: None,
    },
    MountSpec {
        target: "/sys",
        fstype: "sysfs",
        flags: MsFlags::MS_NOEXEC.union(MsFlags::MS_NOSUID).union(MsFlags::MS_NODEV),
        data: None,
    },
    MountSpec {
        target: "/dev",
        fstype: "tmpfs",
        flags: MsFlags::MS_NOSUID,
        data: Some("mode=0755"),
    },
    MountSpec {
        target: "/dev/pts",
        fstype: "devpts",
        flags: MsFlags::empty(),
        data: Some("gid=5,mode=620"),
    },
    MountSpec {
        target: "/run",
        fstype: "tmpfs",
        flags: MsFlags::MS_NOEXEC.union(MsFlags::MS_NOSUID).union(MsFlags::MS_NODEV),
        data: Some("mode=0755"),
    },
    MountSpec {
        target: "/tmp",
        fstype: "tmpfs",
        flags: MsFlags::MS_NOEXEC.union(MsFlags::MS_NOSUID).union(MsFlags::MS_NODEV),
        data: Some("mode=1777"),
    },
];

/// Extra directories that must exist but are not themselves mount targets
/// here (populated by the devtmpfs mount at `/dev`, or by a later step).
const EXTRA_DIRS: &[&str] = &["/dev/dri"];

fn is_mounted(path: &str) -> bool {
    fs::read_to_string("/proc/mounts")
        .map(|mounts| {
            mounts
                .lines()
                .any(|line| line.split_whitespace().nth(1) == Some(path))
        })
        .unwrap_or(false)
}

/// Create mount points and mount the virtual filesystems. Every step is
/// best-effort: a failure is logged and the next step is attempted anyway.
pub fn mount_all(log_dir: &Path) {
    for spec in MOUNTS {
        if let Err(e) = fs::create_dir_all(spec.target) {
            warn!("could not create mount point {}: {}", spec.target, e);
        }
    }
    for dir in EXTRA_DIRS {
        if let Err(e) = fs::create_dir_all(dir) {
            warn!("could not create directory {}: {}", dir, e);
        }
    }
    if let Err(e) = fs::create_dir_all(log_dir) {
        warn!("could not create log directory {}: {}", log_dir.display(), e);
    }

    for spec in MOUNTS {
        if is_mounted(spec.target) {
            debug!("{} already mounted, skipping", spec.target);
            continue;
        }
        if let Err(e) = do_mount(spec) {
            warn!("failed to mount {}: {}", spec.target, e);
        } else {
            debug!("mounted {} ({})", spec.target, spec.fstype);
        }
    }
}

fn do_mount(spec: &MountSpec) -> Result<(), PlatformError> {
    mount::<str, str, str, str>(
        Some("none"),
        spec.target,
        Some(spec.fstype),
        spec.flags,
        spec.data,
    )
    .map_err(|e| PlatformError::Mount {
        target: spec.target.to_string(),
        source: e,
    })
}
