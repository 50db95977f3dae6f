// Loading the manifest from disk and turning it into the objects the orchestrator runs.
//
// Resolution order for the manifest path: `--config`, then `MEDIA_SETUP_CONFIG`
// (both handled by clap), then `~/.media-setup/manifest.yaml`.
// The cache directory comes from `--workdir` when given, otherwise from the manifest.

use crate::errors::{InstallerError, Result};
use crate::libs::component_installer::Component;
use crate::libs::orchestrator::OrchestratorConfig;
use crate::libs::utilities::path_helpers::{default_manifest_path, expand_path};
use crate::schemas::manifest::Manifest;
use crate::{log_debug, log_info};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};

/// A parsed manifest together with everything resolved from it.
#[derive(Debug)]
pub struct LoadedManifest {
    pub path: PathBuf,
    pub manifest: Manifest,
    pub config: OrchestratorConfig,
}

impl LoadedManifest {
    /// The pipeline, in manifest order.
    pub fn components(&self) -> Vec<Component> {
        self.manifest
            .components
            .iter()
            .map(Component::from_entry)
            .collect()
    }
}

/// Picks the manifest path: explicit argument or the default location.
pub fn resolve_manifest_path(config: Option<&str>) -> Result<PathBuf> {
    match config {
        Some(path) => expand_path(path),
        None => Ok(default_manifest_path()),
    }
}

/// Reads, parses and validates the manifest, then resolves the cache directory.
pub fn load(config: Option<&str>, workdir_override: Option<&str>) -> Result<LoadedManifest> {
    let path = resolve_manifest_path(config)?;
    let manifest = read_manifest(&path)?;

    let workdir = match workdir_override {
        Some(dir) => expand_path(dir)?,
        None => expand_path(&manifest.workdir)?,
    };
    // Cache directories are always absolute.
    if !workdir.is_absolute() {
        return Err(InstallerError::Config(format!(
            "cache directory '{}' must be an absolute path (or start with ~)",
            workdir.display()
        )));
    }
    log_debug!(
        "[Manifest] Cache directory resolved to {}",
        workdir.display().to_string().cyan()
    );

    Ok(LoadedManifest {
        path,
        manifest,
        config: OrchestratorConfig::new(workdir),
    })
}

pub fn read_manifest(path: &Path) -> Result<Manifest> {
    let contents = fs::read_to_string(path).map_err(|e| {
        InstallerError::Config(format!(
            "cannot read manifest {}: {e}. Run `media-setup generate` to create one.",
            path.display()
        ))
    })?;
    let manifest = Manifest::from_yaml(&contents)?;
    log_info!(
        "[Manifest] Using {} ({} components)",
        path.display().to_string().cyan(),
        manifest.components.len()
    );
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const MANIFEST: &str = r#"
workdir: /var/tmp/media-setup
components:
  - name: prereqs
    version: "1.0"
    steps:
      - run: dnf
        args: ["-y", "install", "epel-release"]
  - name: alsa-tools
    version: "1.2.11"
"#;

    #[test]
    fn loads_manifest_and_workdir() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("manifest.yaml");
        fs::write(&path, MANIFEST).unwrap();

        let loaded = load(Some(path.to_str().unwrap()), None).unwrap();

        assert_eq!(loaded.config.workdir, PathBuf::from("/var/tmp/media-setup"));
        assert_eq!(
            loaded.config.status_dir(),
            PathBuf::from("/var/tmp/media-setup/.status")
        );
        let names: Vec<_> = loaded.components().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["prereqs", "alsa-tools"]);
    }

    #[test]
    fn workdir_override_wins() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("manifest.yaml");
        fs::write(&path, MANIFEST).unwrap();

        let loaded = load(Some(path.to_str().unwrap()), Some("/opt/elsewhere")).unwrap();
        assert_eq!(loaded.config.workdir, PathBuf::from("/opt/elsewhere"));
    }

    #[test]
    fn relative_workdir_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("manifest.yaml");
        fs::write(&path, MANIFEST).unwrap();

        for relative in [".", "..", "work"] {
            let err = load(Some(path.to_str().unwrap()), Some(relative)).unwrap_err();
            assert!(matches!(err, InstallerError::Config(_)), "{relative}");
        }
    }

    #[test]
    fn missing_manifest_is_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.yaml");
        let err = load(Some(path.to_str().unwrap()), None).unwrap_err();
        assert!(matches!(err, InstallerError::Config(_)));
        assert!(err.to_string().contains("generate"));
    }
}
