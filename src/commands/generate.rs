// `media-setup generate`: writes a starter manifest for the Rocky Linux 9 media stack.
//
// The template only contains steps that need no checksums (repository setup and
// distribution packages). Vendor artifacts are shown as commented examples because
// their digests must come from the vendor release the operator actually downloads.

use crate::errors::{InstallerError, Result};
use crate::libs::manifest_loading::resolve_manifest_path;
use crate::log_info;
use colored::Colorize;
use std::fs;
use std::path::Path;

/// The default manifest content.
pub const MANIFEST_TEMPLATE: &str = r#"# media-setup manifest
#
# Components run top to bottom. Each one is recorded in <workdir>/.status/<name>
# after it installed successfully, and skipped (after asking) on the next run.
# The last component marks the whole pipeline as installed.
#
# Placeholders usable in args, cwd and env: {name} {version} {workdir} {component_dir}

workdir: ~/media-setup-work

platforms:
  - id: rocky
    version: "9"

components:
  - name: repositories
    version: "1"
    description: "Enable CRB and EPEL"
    steps:
      - run: dnf
        args: ["-y", "install", "dnf-plugins-core", "epel-release"]
      - run: dnf
        args: ["config-manager", "--set-enabled", "crb"]

  - name: build-tools
    version: "1"
    description: "Compilers, assemblers and kernel headers for DKMS"
    steps:
      - run: dnf
        args: ["-y", "groupinstall", "Development Tools"]
      - run: dnf
        args: ["-y", "install", "cmake", "nasm", "yasm", "dkms", "pkgconf-pkg-config"]
      - run: sh
        args: ["-c", "dnf -y install kernel-devel-$(uname -r) kernel-headers"]

  - name: alsa-tools
    version: "1"
    description: "ALSA utilities and development headers"
    steps:
      - run: dnf
        args: ["-y", "install", "alsa-lib-devel", "alsa-utils"]
    # Vendor or source artifacts look like this. `sha256` must be the digest
    # published alongside the file; the run stops if it does not match.
    #
    # artifacts:
    #   - url: https://www.alsa-project.org/files/pub/tools/alsa-tools-{version}.tar.bz2
    #     filename: alsa-tools-1.2.11.tar.bz2
    #     sha256: <64 hex characters>
    #     extract: true
    #
    # Files behind a vendor login (the DeckLink SDK, for instance) have no url:
    # place them in <workdir>/<component>/ yourself before running.
    #
    #   - filename: Blackmagic_DeckLink_SDK_12.9.zip
    #     sha256: <64 hex characters>
    #     extract: true
    #
    # notes:
    #   - "Secure Boot: enroll the DKMS signing key with `mokutil --import` and reboot."
"#;

/// Writes the template to the manifest location. Refuses to clobber an existing
/// file unless `overwrite` is set.
pub fn run(config: Option<String>, overwrite: bool) -> Result<()> {
    let path = resolve_manifest_path(config.as_deref())?;
    write_template(&path, overwrite)?;
    log_info!(
        "Starter manifest written to {}",
        path.display().to_string().green()
    );
    log_info!(
        "Review it, then run {}",
        "media-setup now".bold()
    );
    Ok(())
}

pub fn write_template(path: &Path, overwrite: bool) -> Result<()> {
    if path.exists() && !overwrite {
        return Err(InstallerError::Config(format!(
            "{} already exists; pass --overwrite to replace it",
            path.display()
        )));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            InstallerError::io(format!("failed to create {}", parent.display()), e)
        })?;
    }
    fs::write(path, MANIFEST_TEMPLATE)
        .map_err(|e| InstallerError::io(format!("failed to write {}", path.display()), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::manifest::Manifest;
    use tempfile::tempdir;

    #[test]
    fn template_is_a_valid_manifest() {
        let manifest = Manifest::from_yaml(MANIFEST_TEMPLATE).unwrap();
        assert_eq!(manifest.platforms[0].id, "rocky");
        assert_eq!(manifest.terminal_component().unwrap().name, "alsa-tools");
    }

    #[test]
    fn does_not_overwrite_without_flag() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("conf/manifest.yaml");

        write_template(&path, false).unwrap();
        fs::write(&path, "mine").unwrap();

        assert!(write_template(&path, false).is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "mine");

        write_template(&path, true).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), MANIFEST_TEMPLATE);
    }
}
