// Error taxonomy for the installer.
//
// Every failure the orchestrator can hit ends up as one of these variants.
// Nothing is retried or rolled back: the error is logged with its tag and the
// process exits with `exit_code()`.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// All the ways an installation run can stop.
#[derive(Debug, Error)]
pub enum InstallerError {
    /// The host distribution is not one the manifest allows.
    #[error("unsupported platform: {detected} (supported: {supported})")]
    UnsupportedPlatform { detected: String, supported: String },

    /// Transport failure while fetching an artifact. No partial file is left behind.
    #[error("failed to download {url}: {reason}")]
    Download { url: String, reason: String },

    /// A cached or freshly downloaded artifact does not match its declared checksum.
    #[error("checksum mismatch for {}: expected {expected}, got {actual}", path.display())]
    Integrity {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    /// An artifact with no download URL has not been placed in the cache by the operator.
    #[error("required file {} is missing; download it manually and place it there", path.display())]
    MissingArtifact { path: PathBuf },

    /// A package manager, build tool or kernel module manager returned nonzero.
    #[error("command `{command}` failed ({status})")]
    ExternalTool { command: String, status: String },

    /// The operator answered "no" to a prompt the run cannot continue without.
    #[error("aborted by user: {0}")]
    UserDeclined(String),

    /// The manifest is unreadable or violates its invariants.
    #[error("configuration error: {0}")]
    Config(String),

    /// Interactive prompt could not be shown or read.
    #[error("prompt failed: {0}")]
    Prompt(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl InstallerError {
    /// Wraps an `io::Error` with a short description of what was being attempted.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        InstallerError::Io {
            context: context.into(),
            source,
        }
    }

    /// Process exit code for this error. Declining a prompt is a clean exit.
    pub fn exit_code(&self) -> i32 {
        match self {
            InstallerError::UserDeclined(_) => 0,
            _ => 1,
        }
    }

    /// Short tag used in front of the error line.
    pub fn tag(&self) -> &'static str {
        match self {
            InstallerError::UnsupportedPlatform { .. } => "Platform",
            InstallerError::Download { .. } => "Download",
            InstallerError::Integrity { .. } => "Checksum",
            InstallerError::MissingArtifact { .. } => "Artifact",
            InstallerError::ExternalTool { .. } => "Command",
            InstallerError::UserDeclined(_) => "Aborted",
            InstallerError::Config(_) => "Config",
            InstallerError::Prompt(_) => "Prompt",
            InstallerError::Io { .. } => "IO",
        }
    }
}

pub type Result<T> = std::result::Result<T, InstallerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declined_prompts_exit_cleanly() {
        assert_eq!(InstallerError::UserDeclined("no".into()).exit_code(), 0);
    }

    #[test]
    fn every_failure_exits_with_one() {
        let errors = [
            InstallerError::Integrity {
                path: PathBuf::from("/tmp/x"),
                expected: "abc123".into(),
                actual: "def456".into(),
            },
            InstallerError::ExternalTool {
                command: "dnf -y install nasm".into(),
                status: "exit status: 1".into(),
            },
            InstallerError::MissingArtifact {
                path: PathBuf::from("/tmp/sdk.zip"),
            },
            InstallerError::Download {
                url: "https://example.invalid/a".into(),
                reason: "dns".into(),
            },
        ];
        for err in errors {
            assert_eq!(err.exit_code(), 1, "{err}");
        }
    }

    #[test]
    fn integrity_message_names_both_digests() {
        let err = InstallerError::Integrity {
            path: PathBuf::from("/work/ffmpeg.tar.xz"),
            expected: "abc123".into(),
            actual: "def456".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("abc123"));
        assert!(msg.contains("def456"));
        assert!(msg.contains("/work/ffmpeg.tar.xz"));
    }
}
