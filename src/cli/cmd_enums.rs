use clap::{Parser, Subcommand};

/// Defines the command-line interface (CLI) for 'media-setup'.
/// `#[derive(Parser)]` automatically generates argument parsing code via `clap`.
#[derive(Parser, Debug)]
#[command(name = "media-setup", version)]
#[command(about = "Idempotent, checksum-gated installer for the Rocky Linux 9 media stack", long_about = None)]
pub struct Cli {
    /// Enables detailed debug output for troubleshooting.
    #[arg(short, long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Enumerates all supported subcommands with their specific arguments and options.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Runs the installation pipeline described by the manifest.
    Now {
        /// Path to the manifest (defaults to ~/.media-setup/manifest.yaml).
        #[arg(long, env = "MEDIA_SETUP_CONFIG")]
        config: Option<String>,
        /// Cache directory override; takes precedence over the manifest's `workdir`.
        #[arg(long)]
        workdir: Option<String>,
        /// Delete the cache directory and every installation record, then install everything.
        #[arg(long)]
        force: bool,
        /// Answer every prompt with its default instead of asking.
        #[arg(long)]
        non_interactive: bool,
    },
    /// Shows the recorded version of every component.
    Status {
        /// Path to the manifest (defaults to ~/.media-setup/manifest.yaml).
        #[arg(long, env = "MEDIA_SETUP_CONFIG")]
        config: Option<String>,
        /// Cache directory override.
        #[arg(long)]
        workdir: Option<String>,
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Writes a starter manifest.
    Generate {
        /// Where to write it (defaults to ~/.media-setup/manifest.yaml).
        #[arg(long, env = "MEDIA_SETUP_CONFIG")]
        config: Option<String>,
        /// Replace an existing manifest.
        #[arg(long)]
        overwrite: bool,
    },
    /// Shows the current version of the tool.
    Version,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_force_flag() {
        let cli = Cli::parse_from(["media-setup", "now", "--force", "--workdir", "/tmp/w"]);
        match cli.command {
            Commands::Now {
                force,
                workdir,
                non_interactive,
                ..
            } => {
                assert!(force);
                assert!(!non_interactive);
                assert_eq!(workdir.as_deref(), Some("/tmp/w"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn debug_is_global() {
        let cli = Cli::parse_from(["media-setup", "status", "--json", "--debug"]);
        assert!(cli.debug);
    }
}
