// This module is the installer's persistent memory.
// For every component it records the version that was last installed successfully,
// so that a second run can tell "already done" apart from "never done" or "outdated".
//
// The on-disk layout is one regular file per component inside
// the status directory, whose content is exactly the version string. Operators can
// inspect (`cat`) or reset (`rm`) a record without any tooling.
//
// Key functionalities include:
// - Reading a record (`get`), where a missing record is simply `None`.
// - Writing a record atomically (`set`) through a temp file and rename.
// - Removing a record (`clear`) to force reinstallation.
// - Listing all records for the `status` command.

use crate::errors::{InstallerError, Result};
use crate::schemas::manifest::validate_component_name;
use crate::{log_debug, log_warn};
use chrono::{DateTime, Local};
use colored::Colorize;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use tempfile::NamedTempFile;

/// A single persisted "believed installed" marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRecord {
    pub component: String,
    pub installed_version: String,
    /// When the record was last written, if the backend knows.
    pub recorded_at: Option<DateTime<Local>>,
}

/// Durable record of which version of each component was last installed.
///
/// Single-process, sequential use only: there is no locking, and two
/// orchestrators sharing one store is undefined behavior.
pub trait StatusStore {
    /// Returns the recorded version, or `None` when nothing was recorded.
    fn get(&self, component: &str) -> Result<Option<String>>;

    /// Overwrites the record. Only call after the install action succeeded.
    fn set(&self, component: &str, version: &str) -> Result<()>;

    /// Removes the record. Clearing a missing record is not an error.
    fn clear(&self, component: &str) -> Result<()>;

    /// All records currently present, sorted by component name.
    fn list(&self) -> Result<Vec<StatusRecord>>;
}

/// `StatusStore` backed by one flat file per component.
#[derive(Debug, Clone)]
pub struct FileStatusStore {
    dir: PathBuf,
}

impl FileStatusStore {
    /// Creates a store rooted at `dir`. The directory is created lazily on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileStatusStore { dir: dir.into() }
    }

    fn record_path(&self, component: &str) -> Result<PathBuf> {
        validate_component_name(component)?;
        Ok(self.dir.join(component))
    }
}

impl StatusStore for FileStatusStore {
    fn get(&self, component: &str) -> Result<Option<String>> {
        let path = self.record_path(component)?;
        match fs::read_to_string(&path) {
            Ok(contents) => {
                // Hand-edited records often gain a trailing newline.
                let version = contents.trim_end_matches(['\n', '\r']).to_string();
                log_debug!(
                    "[Status] {} is recorded at version {}",
                    component.bold(),
                    version.cyan()
                );
                Ok(Some(version))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log_debug!("[Status] No record for {}", component.bold());
                Ok(None)
            }
            Err(e) => Err(InstallerError::io(
                format!("failed to read status record {}", path.display()),
                e,
            )),
        }
    }

    fn set(&self, component: &str, version: &str) -> Result<()> {
        let path = self.record_path(component)?;
        fs::create_dir_all(&self.dir).map_err(|e| {
            InstallerError::io(
                format!("failed to create status directory {}", self.dir.display()),
                e,
            )
        })?;

        // Write next to the final location, then rename over it, so a crash
        // never leaves a half-written version string behind.
        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(|e| {
            InstallerError::io("failed to create temporary status file", e)
        })?;
        tmp.write_all(version.as_bytes())
            .and_then(|_| tmp.flush())
            .map_err(|e| InstallerError::io("failed to write temporary status file", e))?;
        tmp.persist(&path).map_err(|e| {
            InstallerError::io(
                format!("failed to store status record {}", path.display()),
                e.error,
            )
        })?;

        log_debug!(
            "[Status] Recorded {} = {}",
            component.bold(),
            version.green()
        );
        Ok(())
    }

    fn clear(&self, component: &str) -> Result<()> {
        let path = self.record_path(component)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                log_debug!("[Status] Cleared record for {}", component.bold());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(InstallerError::io(
                format!("failed to remove status record {}", path.display()),
                e,
            )),
        }
    }

    fn list(&self) -> Result<Vec<StatusRecord>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(InstallerError::io(
                    format!("failed to list status directory {}", self.dir.display()),
                    e,
                ));
            }
        };

        let mut records = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| InstallerError::io("failed to read status entry", e))?;
            let name = entry.file_name().to_string_lossy().to_string();
            // Skips leftovers of interrupted writes and anything that is not a record.
            if validate_component_name(&name).is_err() || !entry.path().is_file() {
                log_warn!(
                    "[Status] Ignoring unexpected entry in status directory: {}",
                    name.yellow()
                );
                continue;
            }
            let Some(installed_version) = self.get(&name)? else {
                continue;
            };
            let recorded_at = entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .map(DateTime::<Local>::from);
            records.push(StatusRecord {
                component: name,
                installed_version,
                recorded_at,
            });
        }
        records.sort_by(|a, b| a.component.cmp(&b.component));
        Ok(records)
    }
}
