// Host distribution detection.
// The installer only makes sense on the distributions the manifest was written for
// (package names, repository names and kernel header packages differ between distros),
// so it refuses to run anywhere else.

use crate::errors::{InstallerError, Result};
use crate::schemas::manifest::PlatformEntry;
use crate::{log_debug, log_info};
use colored::Colorize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

pub const OS_RELEASE_PATH: &str = "/etc/os-release";

/// The bits of `/etc/os-release` we care about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsRelease {
    pub id: String,
    pub version_id: String,
    pub pretty_name: String,
}

/// Parses `os-release(5)` content: `KEY=value` lines, values optionally quoted.
pub fn parse_os_release(contents: &str) -> OsRelease {
    let fields: HashMap<&str, String> = contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim(), unquote(value.trim())))
        .collect();

    let id = fields.get("ID").cloned().unwrap_or_default().to_lowercase();
    let version_id = fields.get("VERSION_ID").cloned().unwrap_or_default();
    let pretty_name = fields
        .get("PRETTY_NAME")
        .cloned()
        .unwrap_or_else(|| format!("{id} {version_id}"));

    OsRelease {
        id,
        version_id,
        pretty_name,
    }
}

fn unquote(value: &str) -> String {
    let stripped = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        .unwrap_or(value);
    stripped.to_string()
}

/// Reads and parses an os-release file.
pub fn detect_os_release(path: &Path) -> Result<OsRelease> {
    let contents = fs::read_to_string(path).map_err(|e| InstallerError::UnsupportedPlatform {
        detected: format!("unknown ({} unreadable: {e})", path.display()),
        supported: "a Linux distribution with /etc/os-release".into(),
    })?;
    Ok(parse_os_release(&contents))
}

/// True when `release` matches one entry. The version is a dotted-prefix match,
/// so `9` accepts `9.4` but not `90`.
pub fn platform_matches(release: &OsRelease, entry: &PlatformEntry) -> bool {
    if !release.id.eq_ignore_ascii_case(&entry.id) {
        return false;
    }
    match &entry.version {
        None => true,
        Some(wanted) => {
            release.version_id == *wanted
                || release
                    .version_id
                    .strip_prefix(wanted.as_str())
                    .is_some_and(|rest| rest.starts_with('.'))
        }
    }
}

/// Fails with `UnsupportedPlatform` unless the host matches one of `allowed`.
/// An empty list disables the check.
pub fn ensure_supported(os_release_path: &Path, allowed: &[PlatformEntry]) -> Result<OsRelease> {
    if allowed.is_empty() {
        log_debug!("[Platform] Manifest declares no platforms; skipping distribution check");
        return Ok(
            detect_os_release(os_release_path).unwrap_or_else(|_| OsRelease {
                id: "unknown".into(),
                version_id: String::new(),
                pretty_name: "unknown".into(),
            }),
        );
    }

    let release = detect_os_release(os_release_path)?;
    if allowed.iter().any(|entry| platform_matches(&release, entry)) {
        log_info!(
            "[Platform] Detected {}",
            release.pretty_name.green()
        );
        return Ok(release);
    }

    let supported = allowed
        .iter()
        .map(|p| match &p.version {
            Some(v) => format!("{} {}", p.id, v),
            None => p.id.clone(),
        })
        .collect::<Vec<_>>()
        .join(", ");
    Err(InstallerError::UnsupportedPlatform {
        detected: release.pretty_name,
        supported,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const ROCKY: &str = r#"NAME="Rocky Linux"
VERSION="9.4 (Blue Onyx)"
ID="rocky"
ID_LIKE="rhel centos fedora"
VERSION_ID="9.4"
PRETTY_NAME="Rocky Linux 9.4 (Blue Onyx)"
"#;

    fn rocky9() -> PlatformEntry {
        PlatformEntry {
            id: "rocky".into(),
            version: Some("9".into()),
        }
    }

    #[test]
    fn parses_quoted_fields() {
        let release = parse_os_release(ROCKY);
        assert_eq!(release.id, "rocky");
        assert_eq!(release.version_id, "9.4");
        assert_eq!(release.pretty_name, "Rocky Linux 9.4 (Blue Onyx)");
    }

    #[test]
    fn version_is_a_dotted_prefix() {
        let mut release = parse_os_release(ROCKY);
        assert!(platform_matches(&release, &rocky9()));
        release.version_id = "90".into();
        assert!(!platform_matches(&release, &rocky9()));
        release.version_id = "9".into();
        assert!(platform_matches(&release, &rocky9()));
    }

    #[test]
    fn rejects_other_distributions() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("os-release");
        fs::write(&path, "ID=ubuntu\nVERSION_ID=\"24.04\"\n").unwrap();

        let err = ensure_supported(&path, &[rocky9()]).unwrap_err();
        assert!(matches!(err, InstallerError::UnsupportedPlatform { .. }));
        assert!(err.to_string().contains("rocky 9"));
    }

    #[test]
    fn accepts_listed_distribution() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("os-release");
        fs::write(&path, ROCKY).unwrap();
        assert_eq!(ensure_supported(&path, &[rocky9()]).unwrap().id, "rocky");
    }

    #[test]
    fn empty_list_skips_check_even_without_os_release() {
        let dir = tempdir().unwrap();
        let release = ensure_supported(&dir.path().join("missing"), &[]).unwrap();
        assert_eq!(release.id, "unknown");
    }
}
