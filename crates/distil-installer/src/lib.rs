//! `DevelopInstaller`: linking a source checkout into a destination without copying
//! it, by running the build tool's "develop" mode against a scratch directory and
//! relocating the single `.egg-link` it produces (spec §4.8).
//!
//! Every side effect — the transient runner script, a moved-aside `setup.cfg`, the
//! scratch build directory — is registered on a [`distil_fs::Finalizer`] undo stack
//! as it happens, and reversed in LIFO order on every exit path, mirroring the
//! teacher's `develop()` function and its `undo` list.

mod error;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use distil_build::PACKAGING_SUPPORT_ENV_VAR;
use distil_fs::with_finalizer;
use distil_interpreter::InterpreterInfo;

pub use error::InstallerError;

/// Options written into a moved-aside `setup.cfg`'s `[build_ext]` section before
/// `develop` runs, e.g. `{"include-dirs": "/usr/local/include"}`.
#[derive(Debug, Clone, Default)]
pub struct BuildExtOptions(pub BTreeMap<String, String>);

impl BuildExtOptions {
    fn render(&self) -> String {
        let mut out = String::from("[build_ext]\n");
        for (key, value) in &self.0 {
            out.push_str(&format!("{key} = {value}\n"));
        }
        out
    }
}

pub struct DevelopInstaller<'a> {
    pub dest: &'a Path,
    pub interpreter: &'a InterpreterInfo,
    pub packaging_support_path: Option<&'a Path>,
    pub verbose: bool,
}

impl DevelopInstaller<'_> {
    /// Link the source tree at `setup` (either a directory containing `setup.py`, or
    /// a direct path to it) into `self.dest`, returning the path of the `.egg-link`
    /// now living there.
    pub fn develop(&self, setup: &Path) -> Result<PathBuf, InstallerError> {
        let (directory, setup_py) = if setup.is_dir() {
            (setup.to_path_buf(), setup.join("setup.py"))
        } else {
            (
                setup.parent().unwrap_or(setup).to_path_buf(),
                setup.to_path_buf(),
            )
        };

        with_finalizer(|finalizer| {
            // build_ext customization is applied via `with_build_ext` before this
            // call, matching the teacher's `if build_ext:` guard in `develop()`;
            // nothing here needs to know whether setup.cfg was touched.
            let scratch = tempfile::Builder::new()
                .prefix("distil-develop-")
                .tempdir_in(self.dest)?
                .keep();
            {
                let scratch = scratch.clone();
                finalizer.defer(move || {
                    let _ = fs_err::remove_dir_all(&scratch);
                });
            }

            let runner_path = scratch.join("distil_develop_runner.py");
            fs_err::write(&runner_path, self.runner_script(&directory, &setup_py, &scratch))?;
            {
                let runner_path = runner_path.clone();
                finalizer.defer(move || {
                    let _ = fs_err::remove_file(&runner_path);
                });
            }

            debug!(directory = %directory.display(), dest = %self.dest.display(), "running develop");

            let mut command = Command::new(self.interpreter.executable());
            command.arg("-S").arg(&runner_path);
            if let Some(support) = self.packaging_support_path {
                command.env(PACKAGING_SUPPORT_ENV_VAR, support);
            }

            let output = command
                .output()
                .map_err(|err| InstallerError::CommandFailed(runner_path.clone(), err))?;

            if !output.status.success() {
                return Err(InstallerError::from_output(
                    format!("develop failed for {}", directory.display()),
                    &output,
                ));
            }

            self.relocate_egg_link(&scratch)
        })
    }

    /// Apply `options` to `setup.cfg` under `directory` for the duration of one
    /// `develop()` call: if a `setup.cfg` already exists it's moved aside and
    /// restored afterwards; otherwise a transient one is written and removed
    /// afterwards. Call before [`Self::develop`].
    pub fn with_build_ext(
        &self,
        directory: &Path,
        options: &BuildExtOptions,
        finalizer: &mut distil_fs::Finalizer,
    ) -> Result<(), InstallerError> {
        let setup_cfg = directory.join("setup.cfg");
        if setup_cfg.exists() {
            let aside = setup_cfg.with_extension("cfg-develop-aside");
            fs_err::rename(&setup_cfg, &aside)?;
            let (setup_cfg, aside) = (setup_cfg.clone(), aside);
            finalizer.defer(move || {
                let _ = fs_err::remove_file(&setup_cfg);
                let _ = fs_err::rename(&aside, &setup_cfg);
            });
        } else {
            let setup_cfg_for_cleanup = setup_cfg.clone();
            finalizer.defer(move || {
                let _ = fs_err::remove_file(&setup_cfg_for_cleanup);
            });
        }
        fs_err::write(&setup_cfg, options.render())?;
        Ok(())
    }

    fn runner_script(&self, directory: &Path, setup_py: &Path, scratch: &Path) -> String {
        let mut argv = vec!["\"setup.py\"".to_string()];
        if !self.verbose {
            argv.push("\"-q\"".to_string());
        }
        argv.push("\"develop\"".to_string());
        argv.push("\"-mxN\"".to_string());
        argv.push("\"-d\"".to_string());
        argv.push(format!("{:?}", scratch.display().to_string()));

        format!(
            "import os\n\
             import runpy\n\
             import sys\n\
             \n\
             support = os.environ.get({PACKAGING_SUPPORT_ENV_VAR:?})\n\
             if support:\n\
             \x20\x20\x20\x20sys.path.insert(0, support)\n\
             \n\
             os.chdir({directory:?})\n\
             sys.argv = [{argv}]\n\
             runpy.run_path({setup_py:?}, run_name=\"__main__\")\n",
            directory = directory.display().to_string(),
            setup_py = setup_py.display().to_string(),
            argv = argv.join(", "),
        )
    }

    /// Move the single `.egg-link` produced under `scratch` into `self.dest`,
    /// matching the teacher's `_copyeggs` (an `assert len(result) == 1` away from
    /// silently picking the wrong one).
    fn relocate_egg_link(&self, scratch: &Path) -> Result<PathBuf, InstallerError> {
        let mut found: Vec<PathBuf> = fs_err::read_dir(scratch)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "egg-link"))
            .collect();

        if found.len() != 1 {
            return Err(InstallerError::AmbiguousDevelopOutput {
                dir: scratch.to_path_buf(),
                found: found.len(),
            });
        }

        let source = found.remove(0);
        let dest = self
            .dest
            .join(source.file_name().unwrap_or_default());
        if dest.exists() {
            fs_err::remove_file(&dest)?;
        }
        fs_err::rename(&source, &dest)?;
        Ok(dest)
    }
}
