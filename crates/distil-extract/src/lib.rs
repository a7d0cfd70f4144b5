//! Classifying and unpacking fetched artifacts, and recompiling their bytecode
//! caches after materialization (spec §4.5).

use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use fs_err::File;
use tracing::debug;

use distil_interpreter::InterpreterInfo;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("failed to read zip archive")]
    Zip(#[from] zip::result::ZipError),
    #[error("unrecognized archive extension: {0}")]
    UnsupportedArchiveType(String),
    #[error("failed to recompile bytecode with {0}")]
    CommandFailed(PathBuf, #[source] io::Error),
}

/// What a fetched artifact is, before it's materialized into `eggs-dir`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Directory,
    BinaryArchive,
    SourceArchive,
}

/// Classify a fetched artifact by its filesystem shape and extension.
///
/// A directory (already extracted, or a version-control checkout) is classified
/// directly. Otherwise, a `.egg` file is a binary archive (a pre-built distribution);
/// a `.zip`, `.tar.gz`, `.tgz`, or `.tar.bz2` whose name doesn't end in `.egg` is a
/// source archive awaiting a build step.
pub fn classify(path: &Path) -> Result<ArchiveKind, ExtractError> {
    if path.is_dir() {
        return Ok(ArchiveKind::Directory);
    }

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    if name.ends_with(".egg") {
        Ok(ArchiveKind::BinaryArchive)
    } else if name.ends_with(".zip")
        || name.ends_with(".tar.gz")
        || name.ends_with(".tgz")
        || name.ends_with(".tar.bz2")
    {
        Ok(ArchiveKind::SourceArchive)
    } else {
        Err(ExtractError::UnsupportedArchiveType(name))
    }
}

/// Extract `archive` into `dest`, which must already exist.
pub fn unpack(archive: &Path, dest: &Path) -> Result<(), ExtractError> {
    let name = archive
        .file_name()
        .map(|n| n.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    if name.ends_with(".zip") || name.ends_with(".egg") {
        let mut zip = zip::ZipArchive::new(File::open(archive)?)?;
        zip.extract(dest)?;
    } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        let mut tar = tar::Archive::new(flate2::read::GzDecoder::new(File::open(archive)?));
        tar.unpack(dest)?;
    } else if name.ends_with(".tar.bz2") {
        return Err(ExtractError::UnsupportedArchiveType(
            "bzip2 decoding is not wired up; re-fetch as zip or tar.gz".to_string(),
        ));
    } else {
        return Err(ExtractError::UnsupportedArchiveType(name));
    }
    Ok(())
}

/// Whether a binary archive should be unpacked rather than left as a single zipped
/// file on the path, per the zip-safe policy (spec §4.4.2 step 4, §4.5):
///
/// unzip iff the distribution declares `not-zip-safe`, or lacks a `zip-safe` marker
/// entirely, or the caller asked for always-unzip.
pub fn should_unzip(declares_not_zip_safe: bool, declares_zip_safe: bool, always_unzip: bool) -> bool {
    declares_not_zip_safe || !declares_zip_safe || always_unzip
}

/// Recursively copy `src` into `dest`, used when a binary archive's source is
/// already a directory (spec §4.4.2 step 4).
pub fn copy_recursive(src: &Path, dest: &Path) -> Result<(), ExtractError> {
    fs_err::create_dir_all(dest)?;
    for entry in walkdir::WalkDir::new(src) {
        let entry = entry?;
        let relative = entry.path().strip_prefix(src).expect("walkdir yields descendants of src");
        let out_path = dest.join(relative);
        if entry.file_type().is_dir() {
            fs_err::create_dir_all(&out_path)?;
        } else {
            fs_err::copy(entry.path(), &out_path)?;
        }
    }
    Ok(())
}

impl From<walkdir::Error> for ExtractError {
    fn from(err: walkdir::Error) -> Self {
        ExtractError::Io(err.into())
    }
}

/// Recompile the bytecode caches under `dir` (spec §4.5, §4.7): for every `.py` file
/// that already has a compiled `.pyc`/`.pyo` sibling, drop the stale siblings and
/// recompile once under the current optimization level and once under the opposite
/// one, so both are refreshed together.
pub fn recompile_bytecode(dir: &Path, interpreter: &InterpreterInfo) -> Result<usize, ExtractError> {
    let mut stale = Vec::new();
    for entry in walkdir::WalkDir::new(dir) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "py")
            && (path.with_extension("pyc").is_file() || path.with_extension("pyo").is_file())
        {
            stale.push(path.to_path_buf());
            for ext in ["pyc", "pyo"] {
                let sibling = path.with_extension(ext);
                if sibling.is_file() {
                    fs_err::remove_file(&sibling)?;
                }
            }
        }
    }

    if stale.is_empty() {
        return Ok(0);
    }

    debug!(count = stale.len(), dir = %dir.display(), "recompiling bytecode");
    for opt_flag in [None, Some("-O")] {
        let mut command = Command::new(interpreter.executable());
        if let Some(flag) = opt_flag {
            command.arg(flag);
        }
        command.arg("-m").arg("compileall").arg("-q").arg(dir);
        command
            .status()
            .map_err(|err| ExtractError::CommandFailed(interpreter.executable().to_path_buf(), err))?;
    }

    Ok(stale.len())
}
