use std::path::PathBuf;
use std::process::Output;

#[derive(Debug, thiserror::Error)]
pub enum InstallerError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("failed to run develop runner at {0}")]
    CommandFailed(PathBuf, #[source] std::io::Error),
    #[error("{message}:\n--- stdout:\n{stdout}\n--- stderr:\n{stderr}\n---")]
    BuildBackend {
        message: String,
        stdout: String,
        stderr: String,
    },
    #[error("expected exactly one .egg-link in {dir}, found {found}")]
    AmbiguousDevelopOutput { dir: PathBuf, found: usize },
}

impl InstallerError {
    pub(crate) fn from_output(message: impl Into<String>, output: &Output) -> Self {
        Self::BuildBackend {
            message: message.into(),
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
    }
}
