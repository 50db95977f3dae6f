// The orchestrator driver: runs a fixed, ordered pipeline of components.
//
// It owns the lifecycle of the cache directory and of the status records (creation,
// reuse and clearing); each component only touches its own subdirectory and its own record.
//
// Key behaviors:
// - `force` wipes the cache directory and every record of the pipeline first,
//   after the operator confirmed the deletion.
// - Without `force`, a satisfied terminal component means the whole pipeline is
//   considered installed, unless the operator asks to reinstall it.
// - Without `force`, a cache directory holding leftovers from an earlier run is
//   reused unless the operator asks to delete it.
// - Components run strictly in order; the first failure aborts the run. A skipped
//   component does not block the ones after it.
// - The cache directory is never deleted when it is the filesystem root, or when it
//   is or contains the home directory or the current directory.

use crate::errors::{InstallerError, Result};
use crate::libs::component_installer::{self, Component, ComponentState, InstallEnv};
use crate::libs::confirmation::{self, ConfirmationGate};
use crate::libs::download::Downloader;
use crate::libs::status_store::StatusStore;
use crate::{log_debug, log_error, log_info, log_warn};
use colored::Colorize;
use serde::Serialize;
use std::collections::HashSet;
use std::env;
use std::fs;
use std::io;
use std::path::{self, Path, PathBuf};
use walkdir::WalkDir;

/// Name of the status subdirectory inside the cache directory.
pub const STATUS_DIR_NAME: &str = ".status";

/// Explicit run configuration, built once from the manifest and CLI flags.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Cache directory: downloads, extracted sources, status records.
    pub workdir: PathBuf,
}

impl OrchestratorConfig {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        OrchestratorConfig {
            workdir: workdir.into(),
        }
    }

    pub fn status_dir(&self) -> PathBuf {
        self.workdir.join(STATUS_DIR_NAME)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunOutcome {
    /// The terminal component was already satisfied; nothing else was looked at.
    FullyInstalled,
    /// Every component ended up `DONE` or `SKIPPED`.
    Completed,
    /// The run stopped early; see `RunFailure::error`.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentReport {
    pub name: String,
    pub version: String,
    pub state: ComponentState,
}

/// What a run did, component by component.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub workdir: PathBuf,
    pub components: Vec<ComponentReport>,
    /// `(component, note)` for every component that reached `DONE`.
    pub notes: Vec<(String, String)>,
}

impl RunReport {
    pub fn state_of(&self, name: &str) -> Option<ComponentState> {
        self.components
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.state)
    }
}

/// A run that stopped early, with the states every component had reached.
/// Components after the failing one stay `NOT_CHECKED`.
#[derive(Debug)]
pub struct RunFailure {
    pub report: RunReport,
    pub error: InstallerError,
}

pub struct Orchestrator<'a> {
    config: OrchestratorConfig,
    store: &'a dyn StatusStore,
    gate: &'a dyn ConfirmationGate,
    downloader: &'a dyn Downloader,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        config: OrchestratorConfig,
        store: &'a dyn StatusStore,
        gate: &'a dyn ConfirmationGate,
        downloader: &'a dyn Downloader,
    ) -> Self {
        Orchestrator {
            config,
            store,
            gate,
            downloader,
        }
    }

    /// Runs the pipeline. See the module comment for the rules.
    ///
    /// # Arguments
    /// * `components`: The pipeline in execution order. The last entry is the terminal
    ///   component that decides whether everything is already installed.
    /// * `force`: Delete the cache directory and every record of the pipeline before running.
    ///
    /// # Returns
    /// * `std::result::Result<RunReport, RunFailure>`:
    ///   - `Ok(report)` with outcome `FullyInstalled` or `Completed`.
    ///   - `Err(failure)` carrying the error that stopped the run and the report of how far
    ///     it got, with the failing component marked `FAILED`.
    pub fn run(
        &self,
        components: &[Component],
        force: bool,
    ) -> std::result::Result<RunReport, RunFailure> {
        let mut report = RunReport {
            outcome: RunOutcome::Completed,
            workdir: self.config.workdir.clone(),
            components: components
                .iter()
                .map(|c| ComponentReport {
                    name: c.name.clone(),
                    version: c.required_version.clone(),
                    state: ComponentState::NotChecked,
                })
                .collect(),
            notes: Vec::new(),
        };

        match self.drive(components, force, &mut report) {
            Ok(outcome) => {
                report.outcome = outcome;
                Ok(report)
            }
            Err(error) => {
                report.outcome = RunOutcome::Failed;
                Err(RunFailure { report, error })
            }
        }
    }

    fn drive(
        &self,
        components: &[Component],
        force: bool,
        report: &mut RunReport,
    ) -> Result<RunOutcome> {
        check_unique_names(components)?;
        let Some(terminal) = components.last() else {
            return Err(InstallerError::Config("the pipeline has no components".into()));
        };

        if force {
            self.force_reset(components)?;
        } else if component_installer::check(terminal, self.store)?
            == ComponentState::AlreadySatisfied
        {
            log_info!(
                "[Orchestrator] Terminal component {} {} is already installed",
                terminal.name.bold(),
                terminal.required_version.cyan()
            );
            if !self
                .gate
                .confirm(&component_installer::reinstall_prompt(terminal), false)?
            {
                if let Some(last) = report.components.last_mut() {
                    last.state = ComponentState::AlreadySatisfied;
                }
                log_info!("[Orchestrator] {}", "Everything is already installed".green());
                return Ok(RunOutcome::FullyInstalled);
            }
            // The operator already answered for the terminal component.
            self.store.clear(&terminal.name)?;
        }

        if !force {
            self.offer_dirty_reset(components)?;
        }
        self.ensure_workdir()?;

        let env = InstallEnv {
            workdir: &self.config.workdir,
            store: self.store,
            gate: self.gate,
            downloader: self.downloader,
        };

        let total = components.len();
        for (index, (component, entry)) in components
            .iter()
            .zip(report.components.iter_mut())
            .enumerate()
        {
            log_info!(
                "[Orchestrator] Step {}/{}: {}",
                index + 1,
                total,
                component.name.bold()
            );
            entry.state = ComponentState::Running;
            match component_installer::install(component, &env) {
                Ok(state) => {
                    entry.state = state;
                    if state == ComponentState::Done {
                        report.notes.extend(
                            component
                                .notes
                                .iter()
                                .map(|n| (component.name.clone(), n.clone())),
                        );
                    }
                }
                Err(err) => {
                    entry.state = ComponentState::Failed;
                    log_error!(
                        "[Orchestrator] {} {}; aborting the remaining {} step(s)",
                        component.name.red().bold(),
                        ComponentState::Failed.to_string().red(),
                        total - index - 1
                    );
                    return Err(err);
                }
            }
        }

        log_info!("[Orchestrator] {}", "Pipeline completed".green());
        Ok(RunOutcome::Completed)
    }

    /// Deletes every record of the pipeline and the whole cache directory.
    fn force_reset(&self, components: &[Component]) -> Result<()> {
        let workdir = deletable_workdir(&self.config.workdir)?;
        confirmation::require(
            self.gate,
            &format!(
                "Force mode: delete {} and all installation records?",
                workdir.display()
            ),
            true,
        )?;
        self.wipe(components, &workdir)
    }

    /// Asks whether leftovers of an earlier run should be deleted. Declining keeps them.
    fn offer_dirty_reset(&self, components: &[Component]) -> Result<()> {
        if !workdir_is_dirty(&self.config.workdir)? {
            return Ok(());
        }
        log_warn!(
            "[Orchestrator] Cache directory {} already holds files from an earlier run",
            self.config.workdir.display().to_string().yellow()
        );
        let workdir = deletable_workdir(&self.config.workdir)?;
        let prompt = format!(
            "Delete {} and all installation records before continuing?",
            workdir.display()
        );
        if self.gate.confirm(&prompt, false)? {
            self.wipe(components, &workdir)
        } else {
            log_info!("[Orchestrator] Reusing cache directory {}", workdir.display());
            Ok(())
        }
    }

    fn wipe(&self, components: &[Component], workdir: &Path) -> Result<()> {
        for component in components {
            self.store.clear(&component.name)?;
        }
        if workdir.exists() {
            log_warn!(
                "[Orchestrator] Removing cache directory {}",
                workdir.display().to_string().yellow()
            );
            fs::remove_dir_all(workdir).map_err(|e| {
                InstallerError::io(format!("failed to remove {}", workdir.display()), e)
            })?;
        }
        Ok(())
    }

    fn ensure_workdir(&self) -> Result<()> {
        let workdir = &self.config.workdir;
        log_debug!("[Orchestrator] Using cache directory {}", workdir.display());
        fs::create_dir_all(workdir).map_err(|e| {
            InstallerError::io(format!("failed to create {}", workdir.display()), e)
        })
    }

    /// Every regular file in the cache, status records excluded.
    pub fn cached_artifacts(&self) -> Vec<PathBuf> {
        list_cached_files(&self.config.workdir)
    }
}

/// Regular files under `workdir`, skipping the status directory, sorted.
/// Only the top two levels are listed so extracted source trees don't flood the output.
pub fn list_cached_files(workdir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(workdir)
        .min_depth(1)
        .max_depth(2)
        .into_iter()
        .filter_entry(|e| e.file_name() != STATUS_DIR_NAME)
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

/// True when `workdir` holds anything besides the status directory.
fn workdir_is_dirty(workdir: &Path) -> Result<bool> {
    let entries = match fs::read_dir(workdir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => {
            return Err(InstallerError::io(
                format!("failed to list {}", workdir.display()),
                e,
            ));
        }
    };
    for entry in entries {
        let entry = entry.map_err(|e| InstallerError::io("failed to read cache entry", e))?;
        if entry.file_name() != STATUS_DIR_NAME {
            return Ok(true);
        }
    }
    Ok(false)
}

fn check_unique_names(components: &[Component]) -> Result<()> {
    let mut seen = HashSet::new();
    for component in components {
        if !seen.insert(component.name.as_str()) {
            return Err(InstallerError::Config(format!(
                "component '{}' appears twice in the pipeline",
                component.name
            )));
        }
    }
    Ok(())
}

/// Absolute form of `path`, with symlinks and `..` resolved when it exists.
fn resolve(dir: &Path) -> Result<PathBuf> {
    match fs::canonicalize(dir) {
        Ok(resolved) => Ok(resolved),
        Err(_) => path::absolute(dir)
            .map_err(|e| InstallerError::io(format!("cannot resolve {}", dir.display()), e)),
    }
}

/// Resolves the cache directory and refuses locations a recursive delete must never touch:
/// the filesystem root, and any directory that is or contains the home or current directory.
fn deletable_workdir(workdir: &Path) -> Result<PathBuf> {
    let refuse = |reason: &str| -> Result<PathBuf> {
        Err(InstallerError::Config(format!(
            "refusing to delete {}: {reason}",
            workdir.display()
        )))
    };
    if workdir.as_os_str().is_empty() {
        return refuse("empty path");
    }

    let resolved = resolve(workdir)?;
    if resolved.parent().is_none() {
        return refuse("it is the filesystem root");
    }
    let home = dirs::home_dir().map(|h| resolve(&h).unwrap_or(h));
    if home.is_some_and(|h| h.starts_with(&resolved)) {
        return refuse("it is or contains the home directory");
    }
    let cwd = env::current_dir().ok().map(|c| resolve(&c).unwrap_or(c));
    if cwd.is_some_and(|c| c.starts_with(&resolved)) {
        return refuse("it is or contains the current directory");
    }
    Ok(resolved)
}
