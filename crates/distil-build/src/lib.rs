//! Invoking the external build tool that turns a source tree into one or more
//! binary archives (spec §4.6).
//!
//! A transient runner script is written to a scratch directory, injects the
//! packaging-support library onto the interpreter's path via an environment
//! variable, changes into the source directory, and invokes the build-script in a
//! mode that writes its output into `--dist-dir`. The runner itself is spawned with
//! site initialization disabled, mirroring the teacher's pattern of running a
//! generated `-c` script with a subprocess and surfacing its stdout/stderr verbatim
//! on failure.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use fs_err as fs;
use tracing::debug;

use distil_interpreter::InterpreterInfo;

/// The environment variable the runner script reads the packaging-support library's
/// location from.
pub const PACKAGING_SUPPORT_ENV_VAR: &str = "DISTIL_PACKAGING_SUPPORT";

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("failed to run build-tool runner at {0}")]
    CommandFailed(PathBuf, #[source] std::io::Error),
    #[error("{message}:\n--- stdout:\n{stdout}\n--- stderr:\n{stderr}\n---")]
    BuildBackend {
        message: String,
        stdout: String,
        stderr: String,
    },
    #[error("build tool produced no binary archives in {0}")]
    NoOutputsProduced(PathBuf),
}

impl BuildError {
    fn from_output(message: impl Into<String>, output: &Output) -> Self {
        Self::BuildBackend {
            message: message.into(),
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
    }
}

/// Optional extra arguments forwarded to the build-script's command line, e.g.
/// `-D` defines or `-I` include paths for a build extension.
#[derive(Debug, Clone, Default)]
pub struct BuildExtConfig {
    pub args: Vec<String>,
}

fn runner_script(source_dir: &Path, dist_dir: &Path, build_ext: &BuildExtConfig) -> String {
    let mut argv = vec![
        "\"setup.py\"".to_string(),
        "\"bdist_egg\"".to_string(),
        "\"--dist-dir\"".to_string(),
        format!("{:?}", dist_dir.display().to_string()),
    ];
    argv.extend(build_ext.args.iter().map(|arg| format!("{arg:?}")));

    format!(
        "import os\n\
         import runpy\n\
         import sys\n\
         \n\
         support = os.environ.get({PACKAGING_SUPPORT_ENV_VAR:?})\n\
         if support:\n\
         \x20\x20\x20\x20sys.path.insert(0, support)\n\
         \n\
         os.chdir({source:?})\n\
         sys.argv = [{argv}]\n\
         runpy.run_path(\"setup.py\", run_name=\"__main__\")\n",
        source = source_dir.display().to_string(),
        argv = argv.join(", "),
    )
}

/// Run the external build tool against `source_dir`, writing its binary archive
/// outputs into `dist_dir`. Returns the paths of every archive produced.
pub fn build(
    source_dir: &Path,
    dist_dir: &Path,
    interpreter: &InterpreterInfo,
    packaging_support_path: Option<&Path>,
    build_ext: &BuildExtConfig,
) -> Result<Vec<PathBuf>, BuildError> {
    fs::create_dir_all(dist_dir)?;

    let scratch = tempfile::tempdir()?;
    let runner_path = scratch.path().join("distil_build_runner.py");
    fs::write(&runner_path, runner_script(source_dir, dist_dir, build_ext))?;

    debug!(source = %source_dir.display(), dist = %dist_dir.display(), "invoking build tool");

    let mut command = Command::new(interpreter.executable());
    command.arg("-S").arg(&runner_path);
    if let Some(support) = packaging_support_path {
        command.env(PACKAGING_SUPPORT_ENV_VAR, support);
    }

    let output = command
        .output()
        .map_err(|err| BuildError::CommandFailed(runner_path.clone(), err))?;

    if !output.status.success() {
        return Err(BuildError::from_output(
            format!("build tool failed for {}", source_dir.display()),
            &output,
        ));
    }

    let outputs: Vec<PathBuf> = fs::read_dir(dist_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();

    if outputs.is_empty() {
        return Err(BuildError::NoOutputsProduced(dist_dir.to_path_buf()));
    }

    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runner_script_injects_packaging_support_and_dist_dir() {
        let script = runner_script(
            Path::new("/src/demo"),
            Path::new("/scratch/dist"),
            &BuildExtConfig::default(),
        );
        assert!(script.contains(PACKAGING_SUPPORT_ENV_VAR));
        assert!(script.contains("/src/demo"));
        assert!(script.contains("/scratch/dist"));
        assert!(script.contains("bdist_egg"));
    }

    #[test]
    fn runner_script_forwards_build_ext_args() {
        let build_ext = BuildExtConfig {
            args: vec!["--define=FOO=1".to_string()],
        };
        let script = runner_script(Path::new("/src"), Path::new("/dist"), &build_ext);
        assert!(script.contains("--define=FOO=1"));
    }
}
