// The download-verify step: obtain a byte-exact artifact and prove its integrity
// before anything consumes it.
//
// Downloading and verifying are two separate operations. A file already
// sitting in the cache is never fetched again, but it is hashed again on every run,
// so a corrupted or tampered cached file is still caught.

use crate::errors::{InstallerError, Result};
use crate::{log_debug, log_error, log_info};
use colored::Colorize;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Transport used to fetch artifact bytes.
pub trait Downloader {
    /// Streams the full body of `url` into `sink`.
    fn fetch(&self, url: &str, sink: &mut dyn Write) -> Result<u64>;
}

/// Blocking HTTP(S) downloads through `ureq`.
pub struct HttpDownloader {
    agent: ureq::Agent,
}

impl HttpDownloader {
    pub fn new() -> Self {
        let agent = ureq::AgentBuilder::new()
            .user_agent(concat!("media-setup/", env!("CARGO_PKG_VERSION")))
            .build();
        HttpDownloader { agent }
    }
}

impl Default for HttpDownloader {
    fn default() -> Self {
        Self::new()
    }
}

impl Downloader for HttpDownloader {
    fn fetch(&self, url: &str, sink: &mut dyn Write) -> Result<u64> {
        log_debug!("[Download] GET {}", url.blue());
        // Non-2xx responses come back as `ureq::Error::Status`.
        let response = self.agent.get(url).call().map_err(|e| {
            log_error!("[Download] HTTP request failed for {}: {}", url.red(), e);
            InstallerError::Download {
                url: url.to_string(),
                reason: e.to_string(),
            }
        })?;

        let mut reader = response.into_reader();
        io::copy(&mut reader, sink).map_err(|e| InstallerError::Download {
            url: url.to_string(),
            reason: format!("transfer interrupted: {e}"),
        })
    }
}

/// Makes sure `local_path` exists, fetching `url` only when it does not.
/// The body is streamed into a temporary file in the same directory and renamed
/// into place on success, so a failed transfer never leaves a partial file at `local_path`.
///
/// # Arguments
/// * `downloader`: The transport used when the file is missing.
/// * `url`: Where the artifact is published.
/// * `local_path`: The cache location of the artifact, including its filename.
///
/// # Returns
/// * `Result<bool>`:
///   - `Ok(true)` if the file was downloaded during this call.
///   - `Ok(false)` if the file was already present and no network access happened.
///   - `InstallerError::Download` on transport failure, or `InstallerError::Io` when the
///     cache directory or temporary file cannot be written.
pub fn ensure_downloaded(
    downloader: &dyn Downloader,
    url: &str,
    local_path: &Path,
) -> Result<bool> {
    if local_path.exists() {
        log_info!(
            "[Download] Using cached {}",
            local_path.display().to_string().cyan()
        );
        return Ok(false);
    }

    let parent = match local_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|e| {
        InstallerError::io(
            format!("failed to create download directory {}", parent.display()),
            e,
        )
    })?;

    log_info!(
        "[Download] Fetching {} -> {}",
        url.blue(),
        local_path.display().to_string().cyan()
    );

    // Dropping `tmp` on the error path deletes the partial file.
    let mut tmp = NamedTempFile::new_in(parent)
        .map_err(|e| InstallerError::io("failed to create temporary download file", e))?;
    let bytes = downloader.fetch(url, tmp.as_file_mut())?;
    tmp.as_file_mut()
        .sync_all()
        .map_err(|e| InstallerError::io("failed to flush downloaded file", e))?;
    tmp.persist(local_path).map_err(|e| {
        InstallerError::io(
            format!("failed to move download into {}", local_path.display()),
            e.error,
        )
    })?;

    log_debug!("[Download] Wrote {} bytes", bytes);
    Ok(true)
}

/// Hex-encoded SHA-256 of a file's contents, streamed in chunks.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)
        .map_err(|e| InstallerError::io(format!("failed to open {}", path.display()), e))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file
            .read(&mut buf)
            .map_err(|e| InstallerError::io(format!("failed to read {}", path.display()), e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Checks the file against the declared digest. Comparison ignores hex case.
///
/// # Arguments
/// * `local_path`: The artifact to hash.
/// * `expected_hash`: The hex SHA-256 digest declared in the manifest.
///
/// # Returns
/// * `Result<()>`:
///   - `Ok(())` if the digests match.
///   - `InstallerError::Integrity` on a mismatch. This is always fatal: the caller must
///     not install the artifact.
pub fn verify_checksum(local_path: &Path, expected_hash: &str) -> Result<()> {
    let actual = sha256_file(local_path)?;
    let expected = expected_hash.trim();
    if actual.eq_ignore_ascii_case(expected) {
        log_info!(
            "[Checksum] {} {}",
            local_path.display().to_string().cyan(),
            "OK".green()
        );
        Ok(())
    } else {
        log_error!(
            "[Checksum] {} does not match. Expected {}, got {}",
            local_path.display().to_string().red(),
            expected.yellow(),
            actual.red()
        );
        Err(InstallerError::Integrity {
            path: local_path.to_path_buf(),
            expected: expected.to_string(),
            actual,
        })
    }
}

/// Test double that serves fixed bytes and counts calls.
#[cfg(test)]
pub struct FakeDownloader {
    pub body: Vec<u8>,
    pub fail: bool,
    pub calls: std::cell::Cell<usize>,
}

#[cfg(test)]
impl FakeDownloader {
    pub fn serving(body: &[u8]) -> Self {
        FakeDownloader {
            body: body.to_vec(),
            fail: false,
            calls: std::cell::Cell::new(0),
        }
    }

    pub fn failing() -> Self {
        FakeDownloader {
            body: b"partial".to_vec(),
            fail: true,
            calls: std::cell::Cell::new(0),
        }
    }
}

#[cfg(test)]
impl Downloader for FakeDownloader {
    fn fetch(&self, url: &str, sink: &mut dyn Write) -> Result<u64> {
        self.calls.set(self.calls.get() + 1);
        // Write something first so a failure leaves real partial bytes behind.
        sink.write_all(&self.body)
            .map_err(|e| InstallerError::io("fake write", e))?;
        if self.fail {
            return Err(InstallerError::Download {
                url: url.to_string(),
                reason: "connection reset".into(),
            });
        }
        Ok(self.body.len() as u64)
    }
}
