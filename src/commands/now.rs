// This file contains the primary logic for the `media-setup now` command.
// It checks the host platform, asks for consent, builds the orchestrator from the
// manifest and runs the pipeline, then prints where everything ended up and what the
// operator still has to do by hand.

use crate::errors::Result;
use crate::libs::component_installer::ComponentState;
use crate::libs::confirmation::{self, ConfirmationGate, InteractiveGate, NonInteractiveGate};
use crate::libs::download::HttpDownloader;
use crate::libs::manifest_loading;
use crate::libs::orchestrator::{Orchestrator, RunOutcome, RunReport};
use crate::libs::status_store::FileStatusStore;
use crate::libs::utilities::platform::{self, OS_RELEASE_PATH};
use crate::{log_debug, log_info, log_warn};
use colored::Colorize;
use std::path::{Path, PathBuf};

/// Options of the `now` command, straight from the command line.
#[derive(Debug, Clone, Default)]
pub struct NowOptions {
    pub config: Option<String>,
    pub workdir: Option<String>,
    pub force: bool,
    pub non_interactive: bool,
}

/// Main entry point for the `now` command.
pub fn run(options: NowOptions) -> Result<()> {
    log_debug!("Entered now::run() with {:?}", options);

    let loaded = manifest_loading::load(options.config.as_deref(), options.workdir.as_deref())?;
    platform::ensure_supported(Path::new(OS_RELEASE_PATH), &loaded.manifest.platforms)?;

    let gate: Box<dyn ConfirmationGate> = if options.non_interactive {
        Box::new(NonInteractiveGate)
    } else {
        Box::new(InteractiveGate)
    };

    print_plan(&loaded.manifest.components, &loaded.config.workdir, options.force);
    confirmation::require(
        gate.as_ref(),
        &format!(
            "Install {} component(s) using {}?",
            loaded.manifest.components.len(),
            loaded.config.workdir.display()
        ),
        true,
    )?;

    let store = FileStatusStore::new(loaded.config.status_dir());
    let downloader = HttpDownloader::new();
    let orchestrator = Orchestrator::new(loaded.config.clone(), &store, gate.as_ref(), &downloader);

    let components = loaded.components();
    match orchestrator.run(&components, options.force) {
        Ok(report) => {
            print_summary(&report, &orchestrator.cached_artifacts());
            Ok(())
        }
        Err(failure) => {
            print_progress(&failure.report);
            Err(failure.error)
        }
    }
}

fn print_plan(
    components: &[crate::schemas::manifest::ComponentEntry],
    workdir: &Path,
    force: bool,
) {
    eprintln!();
    log_info!("Installation plan:");
    for (index, component) in components.iter().enumerate() {
        let description = component.description.as_deref().unwrap_or("");
        eprintln!(
            "  {}. {} {} {}",
            index + 1,
            component.name.bold(),
            component.version.cyan(),
            description.dimmed()
        );
    }
    log_info!("Cache directory: {}", workdir.display().to_string().cyan());
    if force {
        log_warn!(
            "{} the cache directory and all installation records will be deleted first",
            "--force:".bright_yellow().bold()
        );
    }
    eprintln!();
}

fn print_summary(report: &RunReport, cached: &[PathBuf]) {
    eprintln!();
    match report.outcome {
        RunOutcome::FullyInstalled => {
            log_info!("{}", "All components are already installed.".green().bold());
        }
        RunOutcome::Completed => {
            for component in &report.components {
                log_info!(
                    "  {} {} {}",
                    component.name.bold(),
                    component.version.cyan(),
                    component.state.to_string().green()
                );
            }
            log_info!("{}", "Installation completed successfully.".green().bold());
        }
        RunOutcome::Failed => print_progress(report),
    }

    log_info!(
        "Downloaded artifacts and sources are kept in {}",
        report.workdir.display().to_string().cyan()
    );
    for path in cached {
        eprintln!("    {}", path.display());
    }

    if !report.notes.is_empty() {
        eprintln!();
        log_warn!("{}", "Manual steps remaining:".bright_yellow().bold());
        for (component, note) in &report.notes {
            eprintln!("  [{}] {}", component.bold(), note);
        }
    }
}

/// Shows how far a stopped run got. Nothing is printed when no component was reached.
fn print_progress(report: &RunReport) {
    if report
        .components
        .iter()
        .all(|c| c.state == ComponentState::NotChecked)
    {
        return;
    }
    eprintln!();
    log_warn!("{}", "Installation stopped:".bright_yellow().bold());
    for component in &report.components {
        let state = component.state.to_string();
        let state = match component.state {
            ComponentState::Done | ComponentState::AlreadySatisfied => state.green(),
            ComponentState::Failed => state.red().bold(),
            ComponentState::Skipped => state.yellow(),
            _ => state.dimmed(),
        };
        eprintln!(
            "  {} {} {}",
            component.name.bold(),
            component.version.cyan(),
            state
        );
    }
    if let Some(failed) = report
        .components
        .iter()
        .find(|c| c.state == ComponentState::Failed)
    {
        log_info!(
            "Finished components are recorded. Fix {} and run {} again.",
            failed.name.bold(),
            "media-setup now".bold()
        );
    }
}
