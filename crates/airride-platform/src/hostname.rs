//! Hostname assignment from `/etc/hostname` (or a default).

use crate::PlatformError;
use std::fs;
use std::path::Path;
use tracing::debug;

const DEFAULT_HOSTNAME: &str = "airride";

/// Read the first line of `path`, falling back to a default if the file is
/// absent or empty.
pub fn read_hostname(path: &Path) -> String {
    fs::read_to_string(path)
        .ok()
        .and_then(|contents| contents.lines().next().map(str::trim).map(str::to_string))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_HOSTNAME.to_string())
}

pub fn set_hostname(name: &str) -> Result<(), PlatformError> {
    nix::unistd::sethostname(name).map_err(|e| PlatformError::Hostname(e.to_string()))?;
    debug!("hostname set to {}", name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_first_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hostname");
        std::fs::write(&path, "myhost\nignored\n").unwrap();
        assert_eq!(read_hostname(&path), "myhost");
    }

    #[test]
    fn missing_file_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope");
        assert_eq!(read_hostname(&path), DEFAULT_HOSTNAME);
    }

    #[test]
    fn empty_file_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hostname");
        std::fs::write(&path, "\n").unwrap();
        assert_eq!(read_hostname(&path), DEFAULT_HOSTNAME);
    }
}
