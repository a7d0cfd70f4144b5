use std::fmt;
use std::path::{Path, PathBuf};

/// Where a distribution lives: on disk, or at a remote URL.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum Location {
    Path(PathBuf),
    Url(String),
}

impl Location {
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Path(path) => Some(path),
            Self::Url(_) => None,
        }
    }

    /// `true` for any `file://` URL or bare filesystem path, used by the index
    /// client's host allow-list exemption (spec §4.2: "URLs with the `file://` scheme
    /// are always permitted").
    pub fn is_file(&self) -> bool {
        match self {
            Self::Path(_) => true,
            Self::Url(url) => url.starts_with("file://"),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => write!(f, "{}", path.display()),
            Self::Url(url) => write!(f, "{url}"),
        }
    }
}

impl From<PathBuf> for Location {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}
