//! # Installation Manifest Schema (`manifest.yaml`)
//!
//! The manifest replaces the per-script globals of a shell installer (work
//! directory, package versions, checksums) with one explicit document that is
//! parsed once and handed to the orchestrator.
//!
//! ## Example
//!
//! ```yaml
//! workdir: ~/media-setup-work
//! platforms:
//!   - id: rocky
//!     version: "9"
//! components:
//!   - name: prereqs
//!     version: "1.0"
//!     steps:
//!       - run: dnf
//!         args: ["-y", "groupinstall", "Development Tools"]
//!   - name: ffmpeg
//!     version: "7.1"
//!     artifacts:
//!       - url: https://ffmpeg.org/releases/ffmpeg-7.1.tar.xz
//!         filename: ffmpeg-7.1.tar.xz
//!         sha256: <sha256 published next to the tarball>
//!         extract: true
//!     steps:
//!       - run: ./configure
//!         cwd: "ffmpeg-{version}"
//!       - run: make
//!         args: ["-j4"]
//!         cwd: "ffmpeg-{version}"
//!     notes:
//!       - "Run `ldconfig` if ffmpeg cannot find its shared libraries."
//! ```
//!
//! ## Validation
//!
//! `Manifest::validate` enforces what the orchestrator relies on:
//! - at least one component;
//! - unique component names that are safe to use as file names;
//! - every checksum is a 64-character hex SHA-256 digest;
//! - every artifact filename is a plain file name (no directories).

use crate::errors::{InstallerError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

// ============================================================================
// TOP-LEVEL STRUCTURE
// ============================================================================

/// The complete structure of `manifest.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    /// Cache directory for downloads, extracted sources and status records.
    /// Tilde and environment variables are expanded at load time.
    pub workdir: String,

    /// Distributions this manifest may run on. Empty disables the check.
    #[serde(default)]
    pub platforms: Vec<PlatformEntry>,

    /// The pipeline, in execution order. The last entry is the terminal component.
    pub components: Vec<ComponentEntry>,
}

/// One allowed distribution, matched against `/etc/os-release`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformEntry {
    /// `ID` field, e.g. `rocky`.
    pub id: String,
    /// Prefix of `VERSION_ID`, e.g. `9` matches `9.4`. Absent means any version.
    #[serde(default)]
    pub version: Option<String>,
}

// ============================================================================
// COMPONENTS
// ============================================================================

/// A named, versioned unit of install work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentEntry {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Files fetched and verified before any step runs.
    #[serde(default)]
    pub artifacts: Vec<ArtifactEntry>,
    /// External commands making up the install action, run in order.
    #[serde(default)]
    pub steps: Vec<CommandStep>,
    /// Manual follow-up printed once the whole run succeeds
    /// (Secure Boot key enrollment, reboot reminders, ...).
    #[serde(default)]
    pub notes: Vec<String>,
}

/// A downloadable (or operator-supplied) file guarded by a SHA-256 digest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactEntry {
    /// Where to fetch the file. `None` means the operator must place it in the
    /// component directory by hand.
    #[serde(default)]
    pub url: Option<String>,
    pub filename: String,
    pub sha256: String,
    /// Unpack into the component directory after verification.
    #[serde(default)]
    pub extract: bool,
}

/// One external command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandStep {
    /// Program to execute, looked up on `PATH` unless it contains a slash.
    pub run: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Working directory, relative to the component directory.
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl Manifest {
    /// Parses a manifest from YAML text and validates it.
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let manifest: Manifest = serde_yaml::from_str(contents)
            .map_err(|e| InstallerError::Config(format!("invalid manifest YAML: {e}")))?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn validate(&self) -> Result<()> {
        if self.workdir.trim().is_empty() {
            return Err(InstallerError::Config("'workdir' must not be empty".into()));
        }
        if self.components.is_empty() {
            return Err(InstallerError::Config(
                "manifest declares no components".into(),
            ));
        }

        let mut seen = HashSet::new();
        for component in &self.components {
            validate_component_name(&component.name)?;
            if !seen.insert(component.name.as_str()) {
                return Err(InstallerError::Config(format!(
                    "component '{}' is declared more than once",
                    component.name
                )));
            }
            if component.version.trim().is_empty() {
                return Err(InstallerError::Config(format!(
                    "component '{}' has an empty version",
                    component.name
                )));
            }
            for artifact in &component.artifacts {
                artifact.validate(&component.name)?;
            }
        }
        Ok(())
    }

    /// Name of the last component in the pipeline.
    pub fn terminal_component(&self) -> Option<&ComponentEntry> {
        self.components.last()
    }
}

impl ArtifactEntry {
    fn validate(&self, owner: &str) -> Result<()> {
        if self.filename.is_empty()
            || self.filename.contains('/')
            || self.filename == "."
            || self.filename == ".."
        {
            return Err(InstallerError::Config(format!(
                "component '{owner}': artifact filename '{}' must be a plain file name",
                self.filename
            )));
        }
        if self.sha256.len() != 64 || !self.sha256.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(InstallerError::Config(format!(
                "component '{owner}': artifact '{}' needs a 64-character hex sha256",
                self.filename
            )));
        }
        if let Some(url) = &self.url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(InstallerError::Config(format!(
                    "component '{owner}': artifact URL must start with http:// or https://: {url}"
                )));
            }
        }
        Ok(())
    }
}

/// Component names double as status file names and cache subdirectories.
pub fn validate_component_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(InstallerError::Config(format!(
            "invalid component name '{name}': use letters, digits, '-', '_' or '.'"
        )))
    }
}
