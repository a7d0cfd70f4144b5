//! The optional download cache: a single directory used to recognize artifacts that
//! have already been fetched, and the scratch-directory bookkeeping for in-flight
//! acquisitions (spec §3, §4.4.2 step 2).

use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A single directory that artifacts are downloaded into. Any artifact whose
/// realpath dirname equals this directory is treated as already-downloaded and is
/// not re-fetched (spec §3).
#[derive(Debug, Clone)]
pub struct DownloadCache {
    root: PathBuf,
}

impl DownloadCache {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let root = root.into();
        fs_err::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Has `path` already been downloaded into this cache? True iff the realpath of
    /// `path`'s parent directory equals the cache root.
    pub fn contains(&self, path: &Path) -> bool {
        let Some(parent) = path.parent() else {
            return false;
        };
        match (distil_fs::realpath(parent), distil_fs::realpath(&self.root)) {
            (Ok(parent), Ok(root)) => parent == root,
            _ => false,
        }
    }
}

/// A scratch directory scoped to a single acquisition: either a subdirectory of the
/// download cache (so the fetched artifact is recognized as cached on a later run),
/// or a fresh temporary directory that is removed when dropped.
#[derive(Debug)]
pub enum ScratchDir {
    Cached(PathBuf),
    Temporary(TempDir),
}

impl ScratchDir {
    /// Use the download cache's root as the scratch directory, if one is configured;
    /// otherwise allocate a fresh temporary directory.
    pub fn acquire(cache: Option<&DownloadCache>) -> Result<Self, CacheError> {
        match cache {
            Some(cache) => {
                debug!(root = %cache.root().display(), "using download cache as scratch directory");
                Ok(Self::Cached(cache.root().to_path_buf()))
            }
            None => Ok(Self::Temporary(tempfile::tempdir()?)),
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Cached(path) => path,
            Self::Temporary(dir) => dir.path(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_inside_cache_root_is_recognized() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DownloadCache::new(dir.path()).unwrap();
        let artifact = dir.path().join("demo-1.0.egg");
        std::fs::write(&artifact, b"").unwrap();
        assert!(cache.contains(&artifact));
    }

    #[test]
    fn artifact_outside_cache_root_is_not_recognized() {
        let cache_dir = tempfile::tempdir().unwrap();
        let other_dir = tempfile::tempdir().unwrap();
        let cache = DownloadCache::new(cache_dir.path()).unwrap();
        let artifact = other_dir.path().join("demo-1.0.egg");
        std::fs::write(&artifact, b"").unwrap();
        assert!(!cache.contains(&artifact));
    }

    #[test]
    fn scratch_dir_without_cache_is_temporary_and_unique() {
        let a = ScratchDir::acquire(None).unwrap();
        let b = ScratchDir::acquire(None).unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn scratch_dir_with_cache_reuses_cache_root() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DownloadCache::new(dir.path()).unwrap();
        let scratch = ScratchDir::acquire(Some(&cache)).unwrap();
        assert_eq!(scratch.path(), cache.root());
    }
}
