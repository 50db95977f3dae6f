// Helpers shared by the installer pipeline that are not part of the
// orchestration logic itself.

// Unpacking of verified archives (tar.gz, tar.xz, tar.bz2, tar, zip).
pub mod compression;
// `/etc/os-release` parsing and the supported-platform check.
pub mod platform;
// Tilde/env expansion and default locations.
pub mod path_helpers;
