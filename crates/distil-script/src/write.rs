//! Writing a generated script to disk: skip the write if the contents are already
//! identical, and mark the file executable where the platform permits (spec §4.7
//! step 5). Grounded on the teacher's `_write_script`.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::ScriptError;

/// Quote `path` only if it contains whitespace, matching the teacher's `_safe_arg`.
pub fn shebang_executable(path: &Path) -> String {
    let rendered = path.to_string_lossy();
    if rendered.contains(char::is_whitespace) {
        format!("\"{rendered}\"")
    } else {
        rendered.into_owned()
    }
}

/// Write `contents` to `path`, skipping the write (and any logging) if the file
/// already holds the same text. Returns the path actually written.
pub fn write_script(path: &Path, contents: &str) -> Result<PathBuf, ScriptError> {
    let unchanged = fs_err::read_to_string(path)
        .map(|existing| existing == contents)
        .unwrap_or(false);
    if !unchanged {
        fs_err::write(path, contents)?;
        make_executable(path)?;
        debug!(path = %path.display(), "generated script");
    }
    Ok(path.to_path_buf())
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<(), ScriptError> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs_err::metadata(path)?.permissions();
    perms.set_mode(0o755);
    fs_err::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<(), ScriptError> {
    Ok(())
}

/// On platforms whose executables aren't directly interpretable (Windows), also
/// write a `.bat` stub that delegates to the real (`-script.py`-suffixed) script.
/// The teacher embeds a prebuilt `cli.exe` from `setuptools`; we don't carry a
/// vendored binary launcher, so a batch-file stub stands in for it here.
pub fn write_windows_stub(script_path: &Path, interpreter: &Path) -> Result<PathBuf, ScriptError> {
    let stub_path = script_path.with_extension("bat");
    let contents = format!(
        "@echo off\r\n\"{}\" \"{}\" %*\r\n",
        interpreter.display(),
        script_path.display()
    );
    fs_err::write(&stub_path, contents)?;
    Ok(stub_path)
}
