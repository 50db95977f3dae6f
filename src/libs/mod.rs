// The installer's building blocks, bottom-up: persistence, prompts, downloads,
// external commands, the per-component state machine and the pipeline driver.

// Component installer: idempotency guard, checksum gate and install action.
pub mod component_installer;
// External command execution with placeholder substitution.
pub mod command_runner;
// Yes/no decision points.
pub mod confirmation;
// Download-skip-if-present and SHA-256 verification.
pub mod download;
// Reading the manifest and turning it into a runnable pipeline.
pub mod manifest_loading;
// The ordered pipeline driver with force mode.
pub mod orchestrator;
// Per-component "last installed version" records.
pub mod status_store;
pub mod utilities;
