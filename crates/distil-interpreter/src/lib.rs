//! Querying a Python interpreter for the facts the installer needs: its version, its
//! standard-library and site-packages directories, and the on-disk location of a
//! module. Every query runs the interpreter with site initialization disabled
//! (`-S`) so a broken or half-installed site-packages can't interfere with the
//! probe itself, and results are memoized per resolved executable path since the
//! probe is run once per interpreter and then consulted repeatedly.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::{Arc, Mutex};

use rustc_hash::FxHashMap;
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("failed to locate python interpreter {0:?}")]
    NotFound(PathBuf, #[source] which::Error),
    #[error("failed to run interpreter probe at {0}")]
    CommandFailed(PathBuf, #[source] std::io::Error),
    #[error("interpreter probe at {path} exited with an error:\n--- stdout:\n{stdout}\n--- stderr:\n{stderr}\n---")]
    ProbeFailed {
        path: PathBuf,
        stdout: String,
        stderr: String,
    },
    #[error("interpreter probe at {0} returned malformed output")]
    MalformedOutput(PathBuf, #[source] serde_json::Error),
    #[error(transparent)]
    Fs(#[from] std::io::Error),
}

/// `sys.version_info[:2]`: a structured `(major, minor)` tuple, never the banner text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
pub struct PythonVersion {
    pub major: u8,
    pub minor: u8,
}

impl std::fmt::Display for PythonVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RawProbe {
    version: PythonVersion,
    stdlib_paths: Vec<PathBuf>,
    /// `sys.path` as seen with user-site initialization suppressed (`-s`), before
    /// subtracting `stdlib_paths` to isolate the site-packages directories.
    paths_without_user_site: Vec<PathBuf>,
}

/// The facts gathered about one interpreter by a single probe invocation.
#[derive(Debug, Clone)]
pub struct InterpreterInfo {
    executable: PathBuf,
    version: PythonVersion,
    stdlib_paths: Vec<PathBuf>,
    site_paths: Vec<PathBuf>,
}

impl InterpreterInfo {
    /// Construct an `InterpreterInfo` directly from already-known facts, bypassing
    /// the subprocess probe. Useful for callers that cache probe results themselves
    /// (e.g. across invocations) or that need to exercise downstream logic without a
    /// real interpreter on hand.
    pub fn new(
        executable: PathBuf,
        version: PythonVersion,
        stdlib_paths: Vec<PathBuf>,
        site_paths: Vec<PathBuf>,
    ) -> Self {
        Self {
            executable,
            version,
            stdlib_paths,
            site_paths,
        }
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    pub fn version(&self) -> PythonVersion {
        self.version
    }

    /// Directories belonging to the standard library, e.g. `.../lib/python3.11`.
    pub fn stdlib_paths(&self) -> &[PathBuf] {
        &self.stdlib_paths
    }

    /// Directories belonging to site-packages, e.g. `.../lib/python3.11/site-packages`.
    pub fn site_paths(&self) -> &[PathBuf] {
        &self.site_paths
    }

    /// The on-disk file implementing `module`, if it can be imported by this
    /// interpreter. Used to resolve entry-point targets to real paths.
    pub fn module_file(&self, module: &str) -> Result<Option<PathBuf>, ProbeError> {
        let script = format!(
            "import importlib.util, json, sys\n\
             spec = importlib.util.find_spec({module:?})\n\
             print(json.dumps(spec.origin if spec else None))\n"
        );
        let output = run_script(&self.executable, &script)?;
        check_success(&self.executable, &output)?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let origin: Option<String> = serde_json::from_str(stdout.trim())
            .map_err(|err| ProbeError::MalformedOutput(self.executable.clone(), err))?;
        Ok(origin.map(PathBuf::from))
    }
}

fn run_script(python: &Path, script: &str) -> Result<Output, ProbeError> {
    Command::new(python)
        .args(["-S", "-c", script])
        .output()
        .map_err(|err| ProbeError::CommandFailed(python.to_path_buf(), err))
}

fn check_success(python: &Path, output: &Output) -> Result<(), ProbeError> {
    if output.status.success() {
        Ok(())
    } else {
        Err(ProbeError::ProbeFailed {
            path: python.to_path_buf(),
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

/// Run with `-s` (suppress user-site only; regular site-packages still get added to
/// `sys.path` by `site.py`) so `paths_without_user_site` reflects the venv's own
/// site-packages without the invoking user's local site directory mixed in.
const PROBE_SCRIPT: &str = r#"
import json
import sys
import sysconfig

info = {
    "version": {"major": sys.version_info[0], "minor": sys.version_info[1]},
    "stdlib_paths": [sysconfig.get_path("stdlib"), sysconfig.get_path("platstdlib")],
    "paths_without_user_site": [p for p in sys.path if p],
}
print(json.dumps(info))
"#;

/// Resolves interpreters by executable path and memoizes the probe result, so that
/// repeated lookups of the same interpreter (e.g. once per resolved distribution)
/// only spawn one subprocess.
#[derive(Debug, Default)]
pub struct InterpreterProbe {
    cache: Mutex<FxHashMap<PathBuf, Arc<InterpreterInfo>>>,
}

impl InterpreterProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `python` (a bare name like `python3.11`, or a path) to an absolute
    /// executable, following the same rule as a shell: paths containing a separator
    /// are used as-is, bare names are looked up on `PATH`.
    pub fn resolve_executable(python: &Path) -> Result<PathBuf, ProbeError> {
        if python.components().count() > 1 {
            return Ok(python.to_path_buf());
        }
        which::which(python).map_err(|err| ProbeError::NotFound(python.to_path_buf(), err))
    }

    /// Probe `executable`, returning the memoized result if this executable has
    /// already been probed.
    pub fn probe(&self, executable: &Path) -> Result<Arc<InterpreterInfo>, ProbeError> {
        let executable = distil_fs::realpath(executable).unwrap_or_else(|_| executable.to_path_buf());

        if let Some(cached) = self.cache.lock().unwrap().get(&executable) {
            return Ok(Arc::clone(cached));
        }

        debug!(?executable, "probing interpreter");
        let output = Command::new(&executable)
            .args(["-s", "-c", PROBE_SCRIPT])
            .output()
            .map_err(|err| ProbeError::CommandFailed(executable.clone(), err))?;
        check_success(&executable, &output)?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let raw: RawProbe = serde_json::from_str(stdout.trim())
            .map_err(|err| ProbeError::MalformedOutput(executable.clone(), err))?;

        // site_paths = paths_without_user_site \ stdlib_paths, preserving the order
        // paths first appear in sys.path.
        let site_paths = raw
            .paths_without_user_site
            .into_iter()
            .filter(|path| !raw.stdlib_paths.contains(path))
            .collect();

        let info = Arc::new(InterpreterInfo {
            executable: executable.clone(),
            version: raw.version,
            stdlib_paths: raw.stdlib_paths,
            site_paths,
        });

        self.cache
            .lock()
            .unwrap()
            .insert(executable, Arc::clone(&info));
        Ok(info)
    }
}
