use crate::errors::{InstallerError, Result};
use crate::log_debug;
use colored::Colorize;
use std::path::PathBuf;

/// Directory holding the default manifest, `~/.media-setup`.
pub const APP_DIR_NAME: &str = ".media-setup";
pub const DEFAULT_MANIFEST_NAME: &str = "manifest.yaml";

/// Expands `~` and `$VAR`/`${VAR}` references in a user-supplied path.
///
/// Unknown variables are an error rather than being silently left in place,
/// since a literal `$WORKDIR` directory is never what the operator meant.
pub fn expand_path(path: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(path)
        .map_err(|e| InstallerError::Config(format!("cannot expand path '{path}': {e}")))?;
    let resolved = PathBuf::from(expanded.as_ref());
    log_debug!(
        "[Paths] {} -> {}",
        path,
        resolved.display().to_string().cyan()
    );
    Ok(resolved)
}

/// `~/.media-setup/manifest.yaml`, or `./manifest.yaml` when there is no home directory.
pub fn default_manifest_path() -> PathBuf {
    match dirs::home_dir() {
        Some(home) => home.join(APP_DIR_NAME).join(DEFAULT_MANIFEST_NAME),
        None => PathBuf::from(DEFAULT_MANIFEST_NAME),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_paths_are_untouched() {
        assert_eq!(
            expand_path("/opt/media-work").unwrap(),
            PathBuf::from("/opt/media-work")
        );
    }

    #[test]
    fn tilde_expands_to_home() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_path("~/work").unwrap(), home.join("work"));
        }
    }

    #[test]
    fn unknown_variable_is_config_error() {
        assert!(matches!(
            expand_path("$MEDIA_SETUP_SURELY_UNSET_VARIABLE/work"),
            Err(InstallerError::Config(_))
        ));
    }

    #[test]
    fn default_manifest_lives_in_app_dir() {
        let path = default_manifest_path();
        assert!(path.ends_with(".media-setup/manifest.yaml") || path == PathBuf::from("manifest.yaml"));
    }
}
