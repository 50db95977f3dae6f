// Register application subcommands.
// Each module corresponds to a specific `media-setup` command-line action.

// Writes a starter manifest.
pub mod generate;
// Runs the installation pipeline.
pub mod now;
// Shows the recorded state of every component.
pub mod status;
// Displays the version.
pub mod version;
