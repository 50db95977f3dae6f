// This module wraps one unit of install work with idempotency and operator control.
//
// Each component walks the same small state machine on every run:
//
//   NOT_CHECKED -> (record == required) ALREADY_SATISFIED -> declined  -> SKIPPED
//                                                         -> accepted  -> RUNNING
//               -> (no / other record)  RUNNING -> action ok  -> DONE
//                                               -> any error  -> FAILED
//
// RUNNING means: make sure every artifact is present, verify every checksum, unpack what
// needs unpacking, and only then hand over to the install action. The status record is
// written strictly after the action succeeded.

use crate::errors::{InstallerError, Result};
use crate::libs::command_runner::{self, Placeholders};
use crate::libs::confirmation::ConfirmationGate;
use crate::libs::download::{self, Downloader};
use crate::libs::status_store::StatusStore;
use crate::libs::utilities::compression;
use crate::schemas::manifest::{ArtifactEntry, CommandStep, ComponentEntry};
use crate::{log_debug, log_info, log_warn};
use colored::Colorize;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Where a component ended up (or currently is) in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComponentState {
    NotChecked,
    AlreadySatisfied,
    Skipped,
    Running,
    Done,
    Failed,
}

impl fmt::Display for ComponentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ComponentState::NotChecked => "NOT_CHECKED",
            ComponentState::AlreadySatisfied => "ALREADY_SATISFIED",
            ComponentState::Skipped => "SKIPPED",
            ComponentState::Running => "RUNNING",
            ComponentState::Done => "DONE",
            ComponentState::Failed => "FAILED",
        };
        f.write_str(label)
    }
}

/// Everything an install action may look at.
#[derive(Debug, Clone)]
pub struct InstallContext {
    pub name: String,
    pub version: String,
    pub workdir: PathBuf,
    /// This component's private slice of the cache.
    pub component_dir: PathBuf,
    /// Verified artifacts, in declaration order.
    pub artifacts: Vec<PathBuf>,
}

/// The opaque "do the install" part of a component.
pub trait InstallAction {
    fn execute(&self, ctx: &InstallContext) -> Result<()>;
}

/// Install action made of external command steps, run in order, stopping at the first failure.
pub struct CommandSteps {
    steps: Vec<CommandStep>,
}

impl CommandSteps {
    pub fn new(steps: Vec<CommandStep>) -> Self {
        CommandSteps { steps }
    }
}

impl InstallAction for CommandSteps {
    fn execute(&self, ctx: &InstallContext) -> Result<()> {
        if self.steps.is_empty() {
            log_debug!("[Component] {} has no command steps", ctx.name.bold());
            return Ok(());
        }
        let placeholders =
            Placeholders::new(&ctx.name, &ctx.version, &ctx.workdir, &ctx.component_dir);
        for (index, step) in self.steps.iter().enumerate() {
            log_debug!(
                "[Component] {} step {}/{}",
                ctx.name.bold(),
                index + 1,
                self.steps.len()
            );
            let resolved = command_runner::resolve_step(step, &placeholders, &ctx.component_dir);
            command_runner::run_step(&resolved)?;
        }
        Ok(())
    }
}

/// A named, versioned unit of work guarded by the status store.
pub struct Component {
    pub name: String,
    pub required_version: String,
    pub description: Option<String>,
    pub artifacts: Vec<ArtifactEntry>,
    pub notes: Vec<String>,
    pub action: Box<dyn InstallAction>,
}

impl Component {
    pub fn new(
        name: impl Into<String>,
        required_version: impl Into<String>,
        action: Box<dyn InstallAction>,
    ) -> Self {
        Component {
            name: name.into(),
            required_version: required_version.into(),
            description: None,
            artifacts: Vec::new(),
            notes: Vec::new(),
            action,
        }
    }

    /// Builds a component whose install action runs the manifest's command steps.
    pub fn from_entry(entry: &ComponentEntry) -> Self {
        Component {
            name: entry.name.clone(),
            required_version: entry.version.clone(),
            description: entry.description.clone(),
            artifacts: entry.artifacts.clone(),
            notes: entry.notes.clone(),
            action: Box::new(CommandSteps::new(entry.steps.clone())),
        }
    }

    pub fn with_artifacts(mut self, artifacts: Vec<ArtifactEntry>) -> Self {
        self.artifacts = artifacts;
        self
    }

    pub fn with_notes(mut self, notes: Vec<String>) -> Self {
        self.notes = notes;
        self
    }

    pub fn component_dir(&self, workdir: &Path) -> PathBuf {
        workdir.join(&self.name)
    }
}

/// The collaborators one component needs for a run.
pub struct InstallEnv<'a> {
    pub workdir: &'a Path,
    pub store: &'a dyn StatusStore,
    pub gate: &'a dyn ConfirmationGate,
    pub downloader: &'a dyn Downloader,
}

/// Checks the status store for `component`.
/// Returns `AlreadySatisfied` when the recorded version equals the required one.
pub fn check(component: &Component, store: &dyn StatusStore) -> Result<ComponentState> {
    match store.get(&component.name)? {
        Some(installed) if installed == component.required_version => {
            Ok(ComponentState::AlreadySatisfied)
        }
        Some(installed) => {
            log_info!(
                "[Component] {} is at {}, upgrading to {}",
                component.name.bold(),
                installed.yellow(),
                component.required_version.green()
            );
            Ok(ComponentState::NotChecked)
        }
        None => Ok(ComponentState::NotChecked),
    }
}

/// The question asked for a component that is already at its required version.
pub fn reinstall_prompt(component: &Component) -> String {
    format!(
        "{} {} is already installed. Reinstall anyway?",
        component.name, component.required_version
    )
}

/// Runs the whole state machine for one component and returns its terminal state.
///
/// # Arguments
/// * `component`: The component to check and, if needed, install.
/// * `env`: Cache directory, status store, confirmation gate and downloader for this run.
///
/// # Returns
/// * `Result<ComponentState>`:
///   - `Ok(ComponentState::Skipped)` if the required version was already recorded and the
///     operator declined to reinstall it.
///   - `Ok(ComponentState::Done)` if the install action succeeded and the version was recorded.
///   - An `InstallerError` for any failure; the caller treats the component as `FAILED`.
pub fn install(component: &Component, env: &InstallEnv<'_>) -> Result<ComponentState> {
    if check(component, env.store)? == ComponentState::AlreadySatisfied {
        log_info!(
            "[Component] {} {} is {}",
            component.name.bold(),
            component.required_version.cyan(),
            "already satisfied".green()
        );
        if !env.gate.confirm(&reinstall_prompt(component), false)? {
            log_info!("[Component] Skipping {}", component.name.bold());
            return Ok(ComponentState::Skipped);
        }
        env.store.clear(&component.name)?;
    }

    run(component, env)?;
    Ok(ComponentState::Done)
}

/// The RUNNING phase: checksum gate, unpacking, install action, then the status record.
pub fn run(component: &Component, env: &InstallEnv<'_>) -> Result<()> {
    eprintln!(
        "{}",
        "==============================================================================".bright_blue()
    );
    log_info!(
        "[Component] Installing {} {}",
        component.name.bright_blue().bold(),
        component.required_version.cyan()
    );
    if let Some(description) = &component.description {
        log_info!("[Component] {}", description);
    }

    let component_dir = component.component_dir(env.workdir);
    fs::create_dir_all(&component_dir).map_err(|e| {
        InstallerError::io(
            format!("failed to create {}", component_dir.display()),
            e,
        )
    })?;

    // Every artifact is present and verified before anything is unpacked or executed.
    let mut artifact_paths = Vec::with_capacity(component.artifacts.len());
    for artifact in &component.artifacts {
        let path = component_dir.join(&artifact.filename);
        fetch_artifact(artifact, &path, env.downloader)?;
        download::verify_checksum(&path, &artifact.sha256)?;
        artifact_paths.push(path);
    }

    for (artifact, path) in component.artifacts.iter().zip(&artifact_paths) {
        if artifact.extract {
            compression::extract_archive(path, &component_dir)?;
        }
    }

    let ctx = InstallContext {
        name: component.name.clone(),
        version: component.required_version.clone(),
        workdir: env.workdir.to_path_buf(),
        component_dir,
        artifacts: artifact_paths,
    };
    component.action.execute(&ctx)?;

    env.store.set(&component.name, &component.required_version)?;
    log_info!(
        "[Component] {}: {}",
        "Successfully installed".yellow(),
        component.name.bold().bright_green()
    );
    Ok(())
}

fn fetch_artifact(artifact: &ArtifactEntry, path: &Path, downloader: &dyn Downloader) -> Result<()> {
    match &artifact.url {
        Some(url) => {
            download::ensure_downloaded(downloader, url, path)?;
            Ok(())
        }
        None if path.exists() => {
            log_debug!(
                "[Component] Operator-supplied file present: {}",
                path.display()
            );
            Ok(())
        }
        None => {
            log_warn!(
                "[Component] {} has no download URL and must be placed by hand",
                artifact.filename.yellow()
            );
            Err(InstallerError::MissingArtifact {
                path: path.to_path_buf(),
            })
        }
    }
}

/// Test doubles shared with the orchestrator tests.
#[cfg(test)]
pub mod testing {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    /// Install action that counts its invocations and optionally fails.
    #[derive(Clone, Default)]
    pub struct CountingAction {
        pub calls: Rc<Cell<usize>>,
        pub fail: bool,
        pub seen: Rc<RefCell<Vec<InstallContext>>>,
    }

    impl CountingAction {
        pub fn failing() -> Self {
            CountingAction {
                fail: true,
                ..Default::default()
            }
        }

        pub fn count(&self) -> usize {
            self.calls.get()
        }
    }

    impl InstallAction for CountingAction {
        fn execute(&self, ctx: &InstallContext) -> Result<()> {
            self.calls.set(self.calls.get() + 1);
            self.seen.borrow_mut().push(ctx.clone());
            if self.fail {
                return Err(InstallerError::ExternalTool {
                    command: format!("install {}", ctx.name),
                    status: "exit status: 1".into(),
                });
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::CountingAction;
    use super::*;
    use crate::libs::confirmation::ScriptedGate;
    use crate::libs::download::FakeDownloader;
    use crate::libs::status_store::FileStatusStore;
    use tempfile::tempdir;

    // sha256("hello world")
    const HELLO_SHA: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    struct Fixture {
        dir: tempfile::TempDir,
        store: FileStatusStore,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempdir().unwrap();
            let store = FileStatusStore::new(dir.path().join(".status"));
            Fixture { dir, store }
        }

        fn env<'a>(&'a self, gate: &'a ScriptedGate, dl: &'a FakeDownloader) -> InstallEnv<'a> {
            InstallEnv {
                workdir: self.dir.path(),
                store: &self.store,
                gate,
                downloader: dl,
            }
        }
    }

    fn artifact(url: Option<&str>, sha: &str) -> ArtifactEntry {
        ArtifactEntry {
            url: url.map(str::to_string),
            filename: "payload.bin".into(),
            sha256: sha.into(),
            extract: false,
        }
    }

    #[test]
    fn fresh_component_runs_once_and_records_version() {
        let fx = Fixture::new();
        let gate = ScriptedGate::default();
        let dl = FakeDownloader::serving(b"");
        let action = CountingAction::default();
        let component = Component::new("prereqs", "1.0", Box::new(action.clone()));

        let state = install(&component, &fx.env(&gate, &dl)).unwrap();

        assert_eq!(state, ComponentState::Done);
        assert_eq!(action.count(), 1);
        assert_eq!(fx.store.get("prereqs").unwrap().as_deref(), Some("1.0"));
        assert!(gate.asked().is_empty());
    }

    #[test]
    fn satisfied_component_declined_is_skipped() {
        let fx = Fixture::new();
        fx.store.set("prereqs", "1.0").unwrap();
        let gate = ScriptedGate::new([false]);
        let dl = FakeDownloader::serving(b"");
        let action = CountingAction::default();
        let component = Component::new("prereqs", "1.0", Box::new(action.clone()));

        let state = install(&component, &fx.env(&gate, &dl)).unwrap();

        assert_eq!(state, ComponentState::Skipped);
        assert_eq!(action.count(), 0);
        assert_eq!(gate.asked(), vec![reinstall_prompt(&component)]);
        assert_eq!(fx.store.get("prereqs").unwrap().as_deref(), Some("1.0"));
    }

    #[test]
    fn satisfied_component_accepted_reinstalls() {
        let fx = Fixture::new();
        fx.store.set("prereqs", "1.0").unwrap();
        let gate = ScriptedGate::new([true]);
        let dl = FakeDownloader::serving(b"");
        let action = CountingAction::default();
        let component = Component::new("prereqs", "1.0", Box::new(action.clone()));

        assert_eq!(
            install(&component, &fx.env(&gate, &dl)).unwrap(),
            ComponentState::Done
        );
        assert_eq!(action.count(), 1);
    }

    #[test]
    fn failed_reinstall_leaves_no_record() {
        let fx = Fixture::new();
        fx.store.set("prereqs", "1.0").unwrap();
        let gate = ScriptedGate::new([true]);
        let dl = FakeDownloader::serving(b"");
        let component = Component::new("prereqs", "1.0", Box::new(CountingAction::failing()));

        assert!(install(&component, &fx.env(&gate, &dl)).is_err());
        assert_eq!(fx.store.get("prereqs").unwrap(), None);
    }

    #[test]
    fn outdated_record_upgrades_without_prompt() {
        let fx = Fixture::new();
        fx.store.set("tsduck", "3.37").unwrap();
        let gate = ScriptedGate::default();
        let dl = FakeDownloader::serving(b"");
        let action = CountingAction::default();
        let component = Component::new("tsduck", "3.38", Box::new(action.clone()));

        install(&component, &fx.env(&gate, &dl)).unwrap();

        assert!(gate.asked().is_empty());
        assert_eq!(action.count(), 1);
        assert_eq!(fx.store.get("tsduck").unwrap().as_deref(), Some("3.38"));
    }

    #[test]
    fn checksum_mismatch_blocks_action() {
        let fx = Fixture::new();
        let gate = ScriptedGate::default();
        let dl = FakeDownloader::serving(b"hello world");
        let action = CountingAction::default();
        let component = Component::new("ffmpeg", "7.1", Box::new(action.clone()))
            .with_artifacts(vec![artifact(Some("https://example.invalid/p"), "abc123")]);

        let err = install(&component, &fx.env(&gate, &dl)).unwrap_err();

        assert!(matches!(err, InstallerError::Integrity { .. }));
        assert_eq!(action.count(), 0);
        assert_eq!(fx.store.get("ffmpeg").unwrap(), None);
    }

    #[test]
    fn action_sees_verified_artifacts() {
        let fx = Fixture::new();
        let gate = ScriptedGate::default();
        let dl = FakeDownloader::serving(b"hello world");
        let action = CountingAction::default();
        let component = Component::new("ffmpeg", "7.1", Box::new(action.clone()))
            .with_artifacts(vec![artifact(Some("https://example.invalid/p"), HELLO_SHA)]);

        install(&component, &fx.env(&gate, &dl)).unwrap();

        let seen = action.seen.borrow();
        assert_eq!(seen[0].artifacts, vec![fx.dir.path().join("ffmpeg/payload.bin")]);
        assert_eq!(seen[0].component_dir, fx.dir.path().join("ffmpeg"));
    }

    #[test]
    fn operator_supplied_artifact_must_exist() {
        let fx = Fixture::new();
        let gate = ScriptedGate::default();
        let dl = FakeDownloader::serving(b"");
        let action = CountingAction::default();
        let component = Component::new("decklink-sdk", "12.9", Box::new(action.clone()))
            .with_artifacts(vec![artifact(None, HELLO_SHA)]);

        let err = install(&component, &fx.env(&gate, &dl)).unwrap_err();
        assert!(matches!(err, InstallerError::MissingArtifact { .. }));
        assert_eq!(dl.calls.get(), 0);

        fs::write(fx.dir.path().join("decklink-sdk/payload.bin"), b"hello world").unwrap();
        install(&component, &fx.env(&gate, &dl)).unwrap();
        assert_eq!(action.count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn command_steps_stop_at_first_failure() {
        let dir = tempdir().unwrap();
        let steps = vec![
            CommandStep {
                run: "sh".into(),
                args: vec!["-c".into(), "touch first".into()],
                cwd: None,
                env: Default::default(),
            },
            CommandStep {
                run: "false".into(),
                args: vec![],
                cwd: None,
                env: Default::default(),
            },
            CommandStep {
                run: "sh".into(),
                args: vec!["-c".into(), "touch third".into()],
                cwd: None,
                env: Default::default(),
            },
        ];
        let ctx = InstallContext {
            name: "alsa-tools".into(),
            version: "1.2.11".into(),
            workdir: dir.path().to_path_buf(),
            component_dir: dir.path().to_path_buf(),
            artifacts: vec![],
        };

        let err = CommandSteps::new(steps).execute(&ctx).unwrap_err();

        assert!(matches!(err, InstallerError::ExternalTool { .. }));
        assert!(dir.path().join("first").exists());
        assert!(!dir.path().join("third").exists());
    }
}
