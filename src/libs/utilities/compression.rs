// Unpacking of verified artifacts.
//
// Source tarballs and vendor SDK bundles arrive in a handful of formats. The format is
// taken from the file name; an artifact is only ever extracted after its checksum
// has been verified, so we trust the name the manifest gave it.

use crate::errors::{InstallerError, Result};
use crate::{log_debug, log_info};
use bzip2::read::BzDecoder;
use colored::Colorize;
use flate2::read::GzDecoder;
use std::fmt;
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;
use tar::Archive;
use xz2::read::XzDecoder;
use zip::ZipArchive;

/// Archive formats we know how to unpack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    TarGz,
    TarXz,
    TarBz2,
    Tar,
    Zip,
}

impl fmt::Display for ArchiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArchiveKind::TarGz => "tar.gz",
            ArchiveKind::TarXz => "tar.xz",
            ArchiveKind::TarBz2 => "tar.bz2",
            ArchiveKind::Tar => "tar",
            ArchiveKind::Zip => "zip",
        };
        f.write_str(name)
    }
}

/// Guesses the archive format from a file name.
pub fn detect_archive_kind(filename: &str) -> Option<ArchiveKind> {
    let lower = filename.to_lowercase();
    if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
        Some(ArchiveKind::TarGz)
    } else if lower.ends_with(".tar.xz") || lower.ends_with(".txz") {
        Some(ArchiveKind::TarXz)
    } else if lower.ends_with(".tar.bz2") || lower.ends_with(".tbz2") {
        Some(ArchiveKind::TarBz2)
    } else if lower.ends_with(".tar") {
        Some(ArchiveKind::Tar)
    } else if lower.ends_with(".zip") {
        Some(ArchiveKind::Zip)
    } else {
        None
    }
}

/// Extracts `src` into `dest`, creating `dest` if needed.
/// Existing files in `dest` are overwritten by archive members of the same name.
pub fn extract_archive(src: &Path, dest: &Path) -> Result<ArchiveKind> {
    let filename = src
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let kind = detect_archive_kind(&filename).ok_or_else(|| {
        InstallerError::Config(format!(
            "cannot extract '{filename}': unsupported archive type (expected tar.gz, tar.xz, tar.bz2, tar or zip)"
        ))
    })?;

    log_info!(
        "[Extract] Unpacking {} ({}) into {}",
        filename.cyan(),
        kind.to_string().magenta(),
        dest.display().to_string().cyan()
    );
    fs::create_dir_all(dest).map_err(|e| {
        InstallerError::io(format!("failed to create {}", dest.display()), e)
    })?;

    let file = File::open(src)
        .map_err(|e| InstallerError::io(format!("failed to open {}", src.display()), e))?;
    let context = || format!("failed to extract {}", src.display());

    match kind {
        ArchiveKind::TarGz => unpack_tar(GzDecoder::new(file), dest).map_err(|e| InstallerError::io(context(), e))?,
        ArchiveKind::TarXz => unpack_tar(XzDecoder::new(file), dest).map_err(|e| InstallerError::io(context(), e))?,
        ArchiveKind::TarBz2 => unpack_tar(BzDecoder::new(file), dest).map_err(|e| InstallerError::io(context(), e))?,
        ArchiveKind::Tar => unpack_tar(file, dest).map_err(|e| InstallerError::io(context(), e))?,
        ArchiveKind::Zip => {
            let mut archive = ZipArchive::new(file)
                .map_err(|e| InstallerError::io(context(), e.into()))?;
            archive
                .extract(dest)
                .map_err(|e| InstallerError::io(context(), e.into()))?;
        }
    }

    log_debug!("[Extract] {} unpacked", filename);
    Ok(kind)
}

fn unpack_tar<R: Read>(reader: R, dest: &Path) -> std::io::Result<()> {
    let mut archive = Archive::new(reader);
    archive.set_preserve_permissions(true);
    archive.unpack(dest)
}
