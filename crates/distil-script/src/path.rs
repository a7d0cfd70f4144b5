//! Computing and formatting the `sys.path` entries a generated script or site module
//! prepends, with optional root-relative rewriting (spec §4.7).

use std::path::{Path, PathBuf};

use distil_distribution::WorkingSet;
use distil_fs::realpath;

/// `path = [dist.location for dist in working_set] ++ extra_paths`, normalized.
pub fn working_set_path(working_set: &WorkingSet, extra_paths: &[PathBuf]) -> Vec<PathBuf> {
    working_set
        .iter()
        .filter_map(|dist| dist.location.path())
        .map(Path::to_path_buf)
        .chain(extra_paths.iter().cloned())
        .map(|p| realpath(&p).unwrap_or(p))
        .collect()
}

/// One rendered `sys.path` entry: either `join(base, "relative/path")` (root-relative)
/// or a literal quoted absolute path.
pub struct FormattedPath {
    pub entries: Vec<String>,
    pub needs_relative_setup: bool,
    /// The `base = ...` preamble this script needs, present whenever at least one
    /// entry was rewritten root-relative.
    pub relative_setup: Option<String>,
}

/// Render `paths` for inclusion in a generated script located at `script_path`.
///
/// When `root` is given and both a path and the script's own directory fall under it,
/// the entry is emitted as `join(base, "...")`, where `base` is computed at runtime by
/// walking up from `__file__` to `root` — so the relative string itself is root-anchored
/// and carries no `../` segments, and the whole tree can be relocated as a unit without
/// regenerating scripts (spec §4.7, invariant 9: relative-path idempotence). Paths
/// outside `root` are emitted as literal absolute strings.
pub fn format_paths(paths: &[PathBuf], script_path: &Path, root: Option<&Path>) -> FormattedPath {
    let script_dir = script_path.parent().unwrap_or(script_path);
    let mut entries = Vec::with_capacity(paths.len());
    let mut needs_relative_setup = false;
    let mut relative_setup = None;

    for path in paths {
        let rendered = root.and_then(|root| {
            if !path.starts_with(root) || !script_dir.starts_with(root) {
                return None;
            }
            let relative = distil_fs::relative_to(path, root)?;
            needs_relative_setup = true;
            if relative_setup.is_none() {
                let depth = script_dir.strip_prefix(root).ok()?.components().count();
                relative_setup = Some(relative_base_setup(depth));
            }
            Some(format!("join(base, {:?})", relative.to_string_lossy()))
        });
        entries.push(rendered.unwrap_or_else(|| format!("{:?}", path.to_string_lossy())));
    }

    FormattedPath {
        entries,
        needs_relative_setup,
        relative_setup,
    }
}

/// The `base = ...` preamble a script needs when at least one path was rewritten
/// root-relative: `base` is computed by walking up `depth` parent directories from
/// the script's own location, landing on `root` without ever emitting a literal `..`
/// in the generated path strings (mirrors `_relative_path_and_setup`'s repeated
/// `base = os.path.dirname(base)`).
fn relative_base_setup(depth: usize) -> String {
    let mut base_expr = "os.path.realpath(__file__)".to_string();
    for _ in 0..=depth {
        base_expr = format!("os.path.dirname({base_expr})");
    }
    format!("import os\njoin = os.path.join\nbase = {base_expr}\n")
}

/// Join rendered path entries into the indented, comma-separated body of a Python
/// list literal (matching the teacher's `_format_paths`).
pub fn join_path_entries(entries: &[String], indent_level: usize) -> String {
    let separator = format!(",\n{}", "    ".repeat(indent_level));
    entries.join(&separator)
}
