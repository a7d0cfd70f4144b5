//! Generating launcher scripts for a resolved working set (spec §4.7).
//!
//! Two generation modes exist, matching what the teacher's `easy_install` module
//! calls `scripts` (here [`generate_classic_scripts`]) and `sitepackage_safe_scripts`
//! (here [`generate_site_safe`]): the classic mode emits self-contained launchers that
//! set `sys.path` directly; the site-safe mode additionally rewrites the
//! interpreter's own `site` module so it can coexist with whatever is already
//! installed into its site-packages.

mod classic;
mod entry_point;
mod error;
mod path;
mod site_safe;
mod write;

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use distil_distribution::WorkingSet;
use distil_interpreter::InterpreterInfo;
use distil_normalize::ProjectKey;

pub use entry_point::{entry_points_from_ini, EntryPoint};
pub use error::ScriptError;

/// Shared knobs for classic-mode generation.
#[derive(Debug, Clone, Default)]
pub struct ClassicConfig {
    pub initialization: String,
    pub arguments: String,
    pub relative_root: Option<PathBuf>,
    pub windows: bool,
}

/// Generate one launcher per declared console entry point for each of `projects`.
///
/// `rename` optionally maps an entry point's declared name to the script filename it
/// should be written as; an entry point absent from a `Some` map is skipped.
pub fn generate_classic_scripts(
    working_set: &WorkingSet,
    projects: &[ProjectKey],
    extras: &BTreeSet<String>,
    extra_paths: &[PathBuf],
    dest: &Path,
    executable: &Path,
    config: &ClassicConfig,
    rename: Option<&HashMap<String, String>>,
) -> Result<Vec<PathBuf>, ScriptError> {
    fs_err::create_dir_all(dest)?;
    let path = path::working_set_path(working_set, extra_paths);

    let mut generated = Vec::new();
    for project in projects {
        for entry_point in classic::console_entry_points(working_set, project, extras)? {
            let script_name = match rename {
                Some(map) => match map.get(&entry_point.name) {
                    Some(name) => name.clone(),
                    None => continue,
                },
                None => entry_point.name.clone(),
            };
            generated.extend(classic::write_entry_point_script(
                &entry_point,
                &script_name,
                dest,
                executable,
                &path,
                &config.initialization,
                &config.arguments,
                config.relative_root.as_deref(),
                false,
                config.windows,
            )?);
        }
    }
    Ok(generated)
}

/// Generate a Mode A interpreter launcher: a script that prepends the working set's
/// path and drops into an interactive interpreter when run with no arguments.
pub fn generate_classic_interpreter(
    name: &str,
    working_set: &WorkingSet,
    extra_paths: &[PathBuf],
    dest: &Path,
    executable: &Path,
    relative_root: Option<&Path>,
) -> Result<PathBuf, ScriptError> {
    fs_err::create_dir_all(dest)?;
    let script_path = dest.join(name);
    let path = path::working_set_path(working_set, extra_paths);
    let formatted = path::format_paths(&path, &script_path, relative_root);
    let preamble = match &formatted.relative_setup {
        Some(setup) => format!("\n{setup}"),
        None => String::new(),
    };
    let path_body = path::join_path_entries(&formatted.entries, 1);
    let contents = format!(
        "#!{shebang}{preamble}\n\nimport sys\nsys.path[0:0] = [\n    {path_body},\n    ]\n\nimport code\ncode.interact(banner=\"\", local=globals())\n",
        shebang = write::shebang_executable(executable),
    );
    write::write_script(&script_path, &contents)
}

/// Knobs for site-safe generation (spec §4.7 "Mode B").
#[derive(Debug, Clone, Default)]
pub struct SiteSafeConfig {
    pub site_py_dest: PathBuf,
    pub initialization: String,
    pub script_initialization: String,
    pub script_arguments: String,
    pub exec_sitecustomize: bool,
    pub include_site_packages: bool,
    pub relative_root: Option<PathBuf>,
    pub windows: bool,
}

/// The packaging-support project key ("setuptools") namespace-package registration
/// looks for in the working set, matching [`distil_resolver`]'s auto-add heuristic.
pub const PACKAGING_SUPPORT_PROJECT: &str = "setuptools";

/// Run the full Mode B generation sequence: `sitecustomize.py`, the rewritten `site`
/// module, every requested launcher (with site init disabled), and an optional
/// interpreter launcher.
#[allow(clippy::too_many_arguments)]
pub fn generate_site_safe(
    working_set: &WorkingSet,
    projects: &[ProjectKey],
    extras: &BTreeSet<String>,
    extra_paths: &[PathBuf],
    dest: &Path,
    executable: &Path,
    interpreter: &InterpreterInfo,
    config: &SiteSafeConfig,
    rename: Option<&HashMap<String, String>>,
    interpreter_script_name: Option<&str>,
) -> Result<Vec<PathBuf>, ScriptError> {
    fs_err::create_dir_all(dest)?;
    let mut generated = vec![site_safe::generate_sitecustomize(
        &config.site_py_dest,
        interpreter,
        &config.initialization,
        config.exec_sitecustomize,
    )?];

    let packaging_support = ProjectKey::new(PACKAGING_SUPPORT_PROJECT);
    generated.push(site_safe::generate_site(
        &config.site_py_dest,
        working_set,
        interpreter,
        extra_paths,
        config.include_site_packages,
        Some(&packaging_support),
        config.relative_root.as_deref(),
    )?);

    let mut script_initialization = format!(
        "\nimport site # imports custom distil-generated site.py\n{}",
        config.script_initialization
    );
    if !script_initialization.ends_with('\n') {
        script_initialization.push('\n');
    }

    let path = [config.site_py_dest.clone()];
    for project in projects {
        for entry_point in classic::console_entry_points(working_set, project, extras)? {
            let script_name = match rename {
                Some(map) => match map.get(&entry_point.name) {
                    Some(name) => name.clone(),
                    None => continue,
                },
                None => entry_point.name.clone(),
            };
            generated.extend(classic::write_entry_point_script(
                &entry_point,
                &script_name,
                dest,
                executable,
                &path,
                &script_initialization,
                &config.script_arguments,
                config.relative_root.as_deref(),
                true,
                config.windows,
            )?);
        }
    }

    if let Some(name) = interpreter_script_name {
        generated.push(site_safe::generate_interpreter_launcher(
            name,
            dest,
            executable,
            &config.site_py_dest,
        )?);
    }

    Ok(generated)
}
