//! Line-oriented parser for the `.service` declaration grammar.
//!
//! Deliberately not TOML/INI-crate based: the grammar is small, hand-rolled,
//! and case-sensitive, matching spec section 4.B exactly.

use crate::service::{ServiceConfig, ServiceKind, SERVICE_SUFFIX};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Service,
    Dependencies,
}

fn strip_quotes(value: &str) -> &str {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

fn to_bool(value: &str) -> bool {
    matches!(value, "true" | "yes" | "1")
}

/// Parse the contents of a single `.service` file. Returns `None` if the
/// declaration yields an empty name (silently discarded, per spec).
pub fn parse_str(contents: &str) -> Option<ServiceConfig> {
    let mut svc = ServiceConfig {
        name: String::new(),
        description: String::new(),
        exec_start: String::new(),
        exec_stop: None,
        kind: ServiceKind::Simple,
        tty: None,
        foreground: false,
        requires: Default::default(),
        after: Default::default(),
        autostart: false,
        parallel: false,
        restart_on_failure: false,
        restart_delay: 0,
        clear_screen: false,
    };

    let mut section = Section::None;

    for raw_line in contents.lines() {
        let line = raw_line.trim_end_matches('\r').trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if line.starts_with('[') && line.ends_with(']') {
            section = match &line[1..line.len() - 1] {
                "Service" => Section::Service,
                "Dependencies" => Section::Dependencies,
                _ => Section::None,
            };
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim_end();
        let value = strip_quotes(value.trim_start());

        match section {
            Section::Service => match key {
                "name" => svc.name = value.to_string(),
                "description" => svc.description = value.to_string(),
                "exec_start" => svc.exec_start = value.to_string(),
                "exec_stop" => svc.exec_stop = Some(value.to_string()),
                "type" => {
                    svc.kind = match value {
                        "simple" => ServiceKind::Simple,
                        "forking" => ServiceKind::Forking,
                        "oneshot" => ServiceKind::OneShot,
                        _ => ServiceKind::Simple,
                    }
                }
                "tty" => svc.tty = Some(PathBuf::from(value)),
                "foreground" => svc.foreground = to_bool(value),
                "autostart" => svc.autostart = to_bool(value),
                "parallel" => svc.parallel = to_bool(value),
                "restart" => svc.restart_on_failure = matches!(value, "on-failure" | "always"),
                "restart_delay" => svc.restart_delay = value.parse().unwrap_or(0),
                "clear_screen" => svc.clear_screen = to_bool(value),
                _ => {}
            },
            Section::Dependencies => match key {
                "requires" => svc.requires.extend(value.split_whitespace().map(String::from)),
                "after" => svc.after.extend(value.split_whitespace().map(String::from)),
                _ => {}
            },
            Section::None => {}
        }
    }

    if svc.name.is_empty() {
        None
    } else {
        Some(svc)
    }
}

/// Load every `*.service` declaration in `dir`, plus the built-in emergency
/// shell. Files that fail to parse cleanly (empty name) are skipped with a
/// warning; loading continues with the rest.
pub fn load_dir(dir: &Path) -> Vec<ServiceConfig> {
    let mut services = vec![crate::service::built_in_shell()];

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("could not read services directory {}: {}", dir.display(), e);
            return services;
        }
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(SERVICE_SUFFIX))
        })
        .collect();
    paths.sort();

    for path in paths {
        match fs::read_to_string(&path) {
            Ok(contents) => match parse_str(&contents) {
                Some(svc) => services.push(svc),
                None => warn!("discarding {}: no name declared", path.display()),
            },
            Err(e) => warn!("could not read {}: {}", path.display(), e),
        }
    }

    services
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_service() {
        let svc = parse_str(
            r#"
[Service]
name=getty
description="Poyo Login"
type=simple
exec_start=/sbin/poyo /dev/tty1
tty=/dev/tty1
autostart=true
restart=always
restart_delay=1
foreground=false

[Dependencies]
after=hostname
"#,
        )
        .unwrap();

        assert_eq!(svc.name, "getty");
        assert_eq!(svc.description, "Poyo Login");
        assert_eq!(svc.exec_start, "/sbin/poyo /dev/tty1");
        assert_eq!(svc.tty, Some(PathBuf::from("/dev/tty1")));
        assert!(svc.autostart);
        assert!(svc.restart_on_failure);
        assert_eq!(svc.restart_delay, 1);
        assert!(!svc.foreground);
        assert_eq!(svc.kind, ServiceKind::Simple);
        assert!(svc.after.contains("hostname"));
    }

    #[test]
    fn ignores_comments_and_blank_lines() {
        let svc = parse_str(
            "\n# a comment\n[Service]\n# another\nname = echo\n\nexec_start = /bin/cat\n",
        )
        .unwrap();
        assert_eq!(svc.name, "echo");
        assert_eq!(svc.exec_start, "/bin/cat");
    }

    #[test]
    fn empty_name_is_discarded() {
        assert!(parse_str("[Service]\nexec_start=/bin/true\n").is_none());
    }

    #[test]
    fn unknown_type_defaults_to_simple() {
        let svc = parse_str("[Service]\nname=x\ntype=bogus\n").unwrap();
        assert_eq!(svc.kind, ServiceKind::Simple);
    }

    #[test]
    fn restart_on_failure_accepts_both_literals() {
        assert!(
            parse_str("[Service]\nname=x\nrestart=on-failure\n")
                .unwrap()
                .restart_on_failure
        );
        assert!(
            parse_str("[Service]\nname=x\nrestart=always\n")
                .unwrap()
                .restart_on_failure
        );
        assert!(
            !parse_str("[Service]\nname=x\nrestart=no\n")
                .unwrap()
                .restart_on_failure
        );
    }

    #[test]
    fn requires_and_after_accumulate_across_lines() {
        let svc = parse_str(
            "[Service]\nname=x\n[Dependencies]\nrequires=a b\nrequires=c\nafter=d\n",
        )
        .unwrap();
        assert_eq!(svc.requires.len(), 3);
        assert!(svc.after.contains("d"));
    }

    #[test]
    fn round_trips_recognized_fields() {
        let original = parse_str(
            "[Service]\nname=svc\ndescription=desc\ntype=oneshot\nexec_start=/bin/true\nautostart=true\nparallel=yes\nrestart=always\nrestart_delay=3\nclear_screen=1\n[Dependencies]\nrequires=a\nafter=b\n",
        )
        .unwrap();

        let mut serialized = String::new();
        serialized.push_str("[Service]\n");
        serialized.push_str(&format!("name={}\n", original.name));
        serialized.push_str(&format!("description={}\n", original.description));
        serialized.push_str("type=oneshot\n");
        serialized.push_str(&format!("exec_start={}\n", original.exec_start));
        serialized.push_str(&format!("autostart={}\n", original.autostart));
        serialized.push_str(&format!("parallel={}\n", original.parallel));
        serialized.push_str("restart=always\n");
        serialized.push_str(&format!("restart_delay={}\n", original.restart_delay));
        serialized.push_str(&format!("clear_screen={}\n", original.clear_screen));
        serialized.push_str("[Dependencies]\n");
        serialized.push_str(&format!(
            "requires={}\n",
            original.requires.iter().cloned().collect::<Vec<_>>().join(" ")
        ));
        serialized.push_str(&format!(
            "after={}\n",
            original.after.iter().cloned().collect::<Vec<_>>().join(" ")
        ));

        let reparsed = parse_str(&serialized).unwrap();
        assert_eq!(reparsed.name, original.name);
        assert_eq!(reparsed.description, original.description);
        assert_eq!(reparsed.kind, original.kind);
        assert_eq!(reparsed.exec_start, original.exec_start);
        assert_eq!(reparsed.autostart, original.autostart);
        assert_eq!(reparsed.parallel, original.parallel);
        assert_eq!(reparsed.restart_on_failure, original.restart_on_failure);
        assert_eq!(reparsed.restart_delay, original.restart_delay);
        assert_eq!(reparsed.clear_screen, original.clear_screen);
        assert_eq!(reparsed.requires, original.requires);
        assert_eq!(reparsed.after, original.after);
    }

    #[test]
    fn load_dir_always_contains_builtin_shell() {
        let dir = tempfile::tempdir().unwrap();
        let services = load_dir(dir.path());
        assert!(services.iter().any(|s| s.name == "shell"));
    }

    #[test]
    fn load_dir_skips_non_service_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "name=ignored\n").unwrap();
        std::fs::write(
            dir.path().join("echo.service"),
            "[Service]\nname=echo\nexec_start=/bin/cat\n",
        )
        .unwrap();

        let services = load_dir(dir.path());
        assert!(services.iter().any(|s| s.name == "echo"));
        assert!(!services.iter().any(|s| s.name == "ignored"));
    }
}
