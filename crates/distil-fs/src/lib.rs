//! Path normalization, relative-path computation, and the scoped-acquisition
//! ("undo stack") pattern used by [`crate::Finalizer`].

use std::io;
use std::path::{Component, Path, PathBuf};

pub mod finalizer;
pub use finalizer::Finalizer;

/// Lexically normalize a path: resolve `.` and `..` components without touching the
/// filesystem. Used for paths that may not exist yet (e.g. a destination directory
/// about to be created), where [`std::fs::canonicalize`] would fail.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                match out.components().next_back() {
                    Some(Component::Normal(_)) => {
                        out.pop();
                    }
                    _ => out.push(".."),
                }
            }
            Component::CurDir => {}
            other => out.push(other),
        }
    }
    out
}

/// Resolve a path to its canonical, absolute form.
///
/// If the path exists, this defers to [`std::fs::canonicalize`] (resolving symlinks).
/// If it does not (yet) exist, this falls back to lexical normalization of the path
/// joined onto the current directory, so that destination paths under construction can
/// still be compared and relativized before they're created.
pub fn realpath(path: &Path) -> io::Result<PathBuf> {
    match fs_err::canonicalize(path) {
        Ok(resolved) => Ok(resolved),
        Err(_) => {
            let absolute = if path.is_absolute() {
                path.to_path_buf()
            } else {
                std::env::current_dir()?.join(path)
            };
            Ok(normalize_path(&absolute))
        }
    }
}

/// Compute the relative path from `base` (a directory) to `target`, expressed as a
/// sequence of `..` components followed by the remainder of `target`.
///
/// Both paths are expected to already be absolute and normalized (e.g. via
/// [`realpath`]). Returns `None` if the two paths share no common ancestor (distinct
/// Windows drives, for instance) — callers should fall back to an absolute path in
/// that case, matching the relative-path rewriting rule in spec §4.7 ("paths outside
/// root are emitted literally").
pub fn relative_to(target: &Path, base: &Path) -> Option<PathBuf> {
    let target_components: Vec<Component> = target.components().collect();
    let base_components: Vec<Component> = base.components().collect();

    let common = target_components
        .iter()
        .zip(base_components.iter())
        .take_while(|(a, b)| a == b)
        .count();

    if common == 0 && !(target_components.is_empty() || base_components.is_empty()) {
        // Distinguish "no common prefix at all" from "both are the root".
        if target_components.first() != base_components.first() {
            return None;
        }
    }

    let mut result = PathBuf::new();
    for _ in common..base_components.len() {
        result.push("..");
    }
    for component in &target_components[common..] {
        result.push(component.as_os_str());
    }
    Some(result)
}
