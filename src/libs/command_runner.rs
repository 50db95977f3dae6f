// Execution of external commands: package managers, build tools, kernel module
// managers. Each step inherits the console, so the operator sees the tool's own
// output as it happens, and any nonzero exit aborts the component.

use crate::errors::{InstallerError, Result};
use crate::schemas::manifest::CommandStep;
use crate::{log_debug, log_error, log_info};
use colored::Colorize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Values substituted for `{name}` placeholders in step arguments, `cwd` and `env`.
#[derive(Debug, Clone, Default)]
pub struct Placeholders {
    values: BTreeMap<&'static str, String>,
}

impl Placeholders {
    pub fn new(name: &str, version: &str, workdir: &Path, component_dir: &Path) -> Self {
        let mut values = BTreeMap::new();
        values.insert("name", name.to_string());
        values.insert("version", version.to_string());
        values.insert("workdir", workdir.display().to_string());
        values.insert("component_dir", component_dir.display().to_string());
        Placeholders { values }
    }

    /// Replaces every known `{key}`; unknown braces are left alone
    /// so shell snippets such as `${HOME}` pass through.
    pub fn apply(&self, input: &str) -> String {
        self.values
            .iter()
            .fold(input.to_string(), |acc, (key, value)| {
                acc.replace(&format!("{{{key}}}"), value)
            })
    }
}

/// A step with every placeholder resolved, ready to spawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedStep {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: BTreeMap<String, String>,
}

impl ResolvedStep {
    /// `program arg1 arg2 ...`, used in logs and error messages.
    pub fn display_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Resolves placeholders and the working directory of one step.
pub fn resolve_step(step: &CommandStep, placeholders: &Placeholders, component_dir: &Path) -> ResolvedStep {
    let cwd = match &step.cwd {
        Some(dir) => {
            let dir = placeholders.apply(dir);
            // Absolute paths win over the component directory in `join`.
            component_dir.join(dir)
        }
        None => component_dir.to_path_buf(),
    };
    ResolvedStep {
        program: placeholders.apply(&step.run),
        args: step.args.iter().map(|a| placeholders.apply(a)).collect(),
        cwd,
        env: step
            .env
            .iter()
            .map(|(k, v)| (k.clone(), placeholders.apply(v)))
            .collect(),
    }
}

/// Runs one resolved step to completion, blocking. Output is passed through.
pub fn run_step(step: &ResolvedStep) -> Result<()> {
    let line = step.display_line();
    log_info!(
        "[Command] {} {}",
        "$".dimmed(),
        line.bold()
    );
    log_debug!("[Command] cwd = {}", step.cwd.display());

    let status = Command::new(&step.program)
        .args(&step.args)
        .current_dir(&step.cwd)
        .envs(&step.env)
        .status()
        .map_err(|e| {
            log_error!("[Command] Could not start {}: {}", step.program.red(), e);
            InstallerError::ExternalTool {
                command: line.clone(),
                status: format!("failed to start: {e}"),
            }
        })?;

    if status.success() {
        Ok(())
    } else {
        log_error!("[Command] {} exited with {}", line.red(), status);
        Err(InstallerError::ExternalTool {
            command: line,
            status: status.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn step(run: &str, args: &[&str]) -> CommandStep {
        CommandStep {
            run: run.into(),
            args: args.iter().map(|s| s.to_string()).collect(),
            cwd: None,
            env: BTreeMap::new(),
        }
    }

    #[test]
    fn placeholders_are_substituted() {
        let p = Placeholders::new("ffmpeg", "7.1", Path::new("/work"), Path::new("/work/ffmpeg"));
        assert_eq!(
            p.apply("--prefix={workdir}/out ffmpeg-{version} ${HOME}"),
            "--prefix=/work/out ffmpeg-7.1 ${HOME}"
        );
    }

    #[test]
    fn cwd_is_relative_to_component_dir() {
        let mut s = step("make", &["-j4"]);
        s.cwd = Some("ffmpeg-{version}".into());
        s.env.insert("PKG_CONFIG_PATH".into(), "{workdir}/lib/pkgconfig".into());
        let p = Placeholders::new("ffmpeg", "7.1", Path::new("/w"), Path::new("/w/ffmpeg"));

        let resolved = resolve_step(&s, &p, Path::new("/w/ffmpeg"));

        assert_eq!(resolved.cwd, PathBuf::from("/w/ffmpeg/ffmpeg-7.1"));
        assert_eq!(resolved.env["PKG_CONFIG_PATH"], "/w/lib/pkgconfig");
        assert_eq!(resolved.display_line(), "make -j4");
    }

    #[cfg(unix)]
    #[test]
    fn successful_command_runs_in_cwd() {
        let dir = tempdir().unwrap();
        let resolved = ResolvedStep {
            program: "sh".into(),
            args: vec!["-c".into(), "echo \"$MARK\" > marker".into()],
            cwd: dir.path().to_path_buf(),
            env: BTreeMap::from([("MARK".to_string(), "done".to_string())]),
        };
        run_step(&resolved).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("marker")).unwrap(), "done\n");
    }

    #[cfg(unix)]
    #[test]
    fn nonzero_exit_is_external_tool_error() {
        let dir = tempdir().unwrap();
        let resolved = ResolvedStep {
            program: "sh".into(),
            args: vec!["-c".into(), "exit 3".into()],
            cwd: dir.path().to_path_buf(),
            env: BTreeMap::new(),
        };
        match run_step(&resolved) {
            Err(InstallerError::ExternalTool { command, status }) => {
                assert_eq!(command, "sh -c exit 3");
                assert!(status.contains('3'));
            }
            other => panic!("expected external tool error, got {other:?}"),
        }
    }

    #[test]
    fn missing_program_is_external_tool_error() {
        let dir = tempdir().unwrap();
        let resolved = ResolvedStep {
            program: "media-setup-no-such-program".into(),
            args: vec![],
            cwd: dir.path().to_path_buf(),
            env: BTreeMap::new(),
        };
        assert!(matches!(
            run_step(&resolved),
            Err(InstallerError::ExternalTool { .. })
        ));
    }
}
