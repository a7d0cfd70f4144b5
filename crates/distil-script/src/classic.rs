//! Mode A: classic launcher scripts, one per declared entry point, executed
//! directly by a shebang line (spec §4.7 "Mode A (classic)").

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use distil_distribution::WorkingSet;
use distil_normalize::ProjectKey;

use crate::entry_point::{entry_points_from_ini, EntryPoint};
use crate::path::{format_paths, join_path_entries};
use crate::write::{shebang_executable, write_script, write_windows_stub};
use crate::ScriptError;

/// Console entry points a distribution in `working_set` declares for `project`,
/// gated by `extras`.
pub fn console_entry_points(
    working_set: &WorkingSet,
    project: &ProjectKey,
    extras: &BTreeSet<String>,
) -> Result<Vec<EntryPoint>, ScriptError> {
    let dist = working_set
        .get(project)
        .ok_or_else(|| ScriptError::MissingDistribution {
            project: project.to_string(),
        })?;
    if !dist.metadata.has_metadata("entry_points.txt") {
        return Ok(Vec::new());
    }
    let contents = dist.metadata.get_metadata_lines("entry_points.txt").join("\n");
    let (console, _gui) = entry_points_from_ini(&contents, extras)?;
    Ok(console)
}

/// Renders and writes one launcher for `entry_point`, plus a `.bat` stub when
/// targeting a platform whose executables aren't directly interpretable.
pub fn write_entry_point_script(
    entry_point: &EntryPoint,
    script_name: &str,
    dest: &Path,
    executable: &Path,
    path: &[PathBuf],
    initialization: &str,
    arguments: &str,
    relative_root: Option<&Path>,
    block_site: bool,
    windows: bool,
) -> Result<Vec<PathBuf>, ScriptError> {
    let script_path = dest.join(script_name);
    let contents = render_launcher(
        executable,
        path,
        &script_path,
        initialization,
        &entry_point.module,
        &entry_point.attrs,
        arguments,
        relative_root,
        block_site,
    );
    let mut generated = vec![write_script(&script_path, &contents)?];
    if windows {
        generated.push(write_windows_stub(&script_path, executable)?);
    }
    Ok(generated)
}

/// Render a launcher body: shebang, optional relative-path preamble, `sys.path`
/// prepend, the initialization snippet, the module import, and the `__main__` call.
#[allow(clippy::too_many_arguments)]
pub fn render_launcher(
    executable: &Path,
    path: &[PathBuf],
    script_path: &Path,
    initialization: &str,
    module: &str,
    attrs: &str,
    arguments: &str,
    relative_root: Option<&Path>,
    block_site: bool,
) -> String {
    let dash_s = if block_site { " -S" } else { "" };
    let formatted = format_paths(path, script_path, relative_root);
    let preamble = match &formatted.relative_setup {
        Some(setup) => format!("\n{setup}"),
        None => String::new(),
    };
    let path_body = join_path_entries(&formatted.entries, 1);
    let initialization = if initialization.is_empty() {
        String::new()
    } else {
        format!("\n{initialization}\n")
    };

    format!(
        "#!{shebang}{dash_s}{preamble}\n\nimport sys\nsys.path[0:0] = [\n    {path_body},\n    ]\n{initialization}\nimport {module}\n\nif __name__ == '__main__':\n    {module}.{attrs}({arguments})\n",
        shebang = shebang_executable(executable),
    )
}
