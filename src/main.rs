use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use media_setup::cli::cmd_enums::{Cli, Commands};
use media_setup::commands::{generate, now, status, version};
use media_setup::errors::InstallerError;
use media_setup::{log_debug, log_error, log_warn, logger};
use std::process::ExitCode;

fn dispatch(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Version => version::run(),
        Commands::Now {
            config,
            workdir,
            force,
            non_interactive,
        } => now::run(now::NowOptions {
            config,
            workdir,
            force,
            non_interactive,
        })
        .context("installation did not complete")?,
        Commands::Status {
            config,
            workdir,
            json,
        } => status::run(config, workdir, json).context("cannot report status")?,
        Commands::Generate { config, overwrite } => {
            generate::run(config, overwrite).context("cannot write starter manifest")?
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logger::init(cli.debug);
    log_debug!("Parsed command line: {:?}", cli);

    let Err(err) = dispatch(cli.command) else {
        return ExitCode::SUCCESS;
    };

    match err.downcast_ref::<InstallerError>() {
        Some(InstallerError::UserDeclined(reason)) => {
            log_warn!("Nothing was changed: {}", reason);
            ExitCode::SUCCESS
        }
        Some(installer_err) => {
            log_error!("[{}] {}", installer_err.tag().bold(), installer_err);
            log_debug!("{:?}", err);
            ExitCode::from(installer_err.exit_code() as u8)
        }
        None => {
            log_error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}
