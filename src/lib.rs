// media-setup: installs the Rocky Linux 9 media stack from a manifest, one
// component at a time, remembering what it already did.

pub mod cli;
pub mod commands;
pub mod errors;
pub mod libs;
pub mod logger;
pub mod schemas;
