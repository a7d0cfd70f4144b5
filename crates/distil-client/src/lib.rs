//! Discovering and fetching candidate distributions (spec §4.2).
//!
//! [`IndexClient`] is the seam between the resolver and "the outside world" — a
//! find-links directory today, potentially a package index over HTTP tomorrow.
//! [`ClientRegistry`] replaces what the teacher models as a process-wide
//! `(interpreter, index-url, find-links)`-keyed singleton with an explicit value the
//! caller owns and threads through.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::debug;

use distil_distribution::{DistMetadata, Distribution, Location, Precedence};
use distil_normalize::ProjectKey;
use distil_requirement::Requirement;
use distil_version::{Version, VersionError};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("url is not permitted by the configured allow-list: {0}")]
    UrlNotAllowed(String),
    #[error("could not parse a project/version pair out of filename: {0}")]
    UnparsableFilename(String),
    #[error(transparent)]
    Version(#[from] VersionError),
}

/// Placeholder metadata for a candidate that has only been discovered, not yet
/// fetched and unpacked. The resolver rescans `eggs-dir` with real metadata after
/// acquisition (spec §4.4.2 step 6); until then, nothing is known beyond identity.
#[derive(Debug, Default)]
pub struct UndiscoveredMetadata;

impl DistMetadata for UndiscoveredMetadata {
    fn has_metadata(&self, _name: &str) -> bool {
        false
    }

    fn get_metadata_lines(&self, _name: &str) -> Vec<String> {
        Vec::new()
    }
}

/// A URL/host allow-list: `file://` sources are always permitted; everything else
/// must match one of the allowed hosts (spec §4.2 Policy).
#[derive(Debug, Clone, Default)]
pub struct HostAllowList {
    hosts: Vec<String>,
}

impl HostAllowList {
    pub fn new(hosts: impl IntoIterator<Item = String>) -> Self {
        Self {
            hosts: hosts.into_iter().collect(),
        }
    }

    pub fn permits(&self, url: &str) -> bool {
        if url.starts_with("file://") {
            return true;
        }
        let Ok(parsed) = url::Url::parse(url) else {
            return false;
        };
        parsed
            .host_str()
            .is_some_and(|host| self.hosts.iter().any(|allowed| allowed == host))
    }
}

/// The seam between the resolver and artifact discovery/fetching.
pub trait IndexClient {
    /// Candidates discovered so far for `project`.
    fn lookup(&self, project: &ProjectKey) -> Vec<Distribution>;

    /// The best available candidate satisfying `requirement`'s constraint, performing
    /// remote discovery if the implementation supports it.
    fn obtain(&self, requirement: &Requirement) -> Option<Distribution>;

    /// Materialize the artifact at `location` into `scratch_dir`, returning its local
    /// path. For `file://` sources this may return the source path directly without
    /// copying.
    fn download(&self, location: &Location, scratch_dir: &Path) -> Result<PathBuf, ClientError>;

    /// Extend the search set with additional find-links sources.
    fn add_find_links(&mut self, urls: Vec<String>);
}

/// An `IndexClient` backed by a flat find-links directory, modeled on the teacher's
/// flat-index scan: every file in the directory is parsed into a project/version
/// pair and indexed, with no network access at all.
#[derive(Debug, Default)]
pub struct FileIndexClient {
    find_links: Vec<PathBuf>,
    by_project: FxHashMap<ProjectKey, BTreeMap<Version, Distribution>>,
}

impl FileIndexClient {
    pub fn new(find_links: Vec<PathBuf>) -> Result<Self, ClientError> {
        let mut client = Self {
            find_links: Vec::new(),
            by_project: FxHashMap::default(),
        };
        client.add_find_links_dirs(find_links)?;
        Ok(client)
    }

    fn add_find_links_dirs(&mut self, dirs: Vec<PathBuf>) -> Result<(), ClientError> {
        for dir in dirs {
            if !self.find_links.contains(&dir) {
                self.scan_directory(&dir)?;
                self.find_links.push(dir);
            }
        }
        Ok(())
    }

    fn scan_directory(&mut self, dir: &Path) -> Result<(), ClientError> {
        let Ok(entries) = fs_err::read_dir(dir) else {
            debug!(dir = %dir.display(), "find-links directory does not exist, skipping");
            return Ok(());
        };
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                continue;
            }
            match parse_artifact_filename(&path) {
                Ok((project, version, precedence)) => {
                    let dist = Distribution::new(
                        project.clone(),
                        version.clone(),
                        Location::Path(path),
                        precedence,
                        Arc::new(UndiscoveredMetadata),
                    );
                    self.by_project
                        .entry(project)
                        .or_default()
                        .insert(version, dist);
                }
                Err(err) => {
                    debug!(path = %path.display(), %err, "skipping unrecognized find-links entry");
                }
            }
        }
        Ok(())
    }
}

impl IndexClient for FileIndexClient {
    fn lookup(&self, project: &ProjectKey) -> Vec<Distribution> {
        self.by_project
            .get(project)
            .map(|versions| versions.values().rev().cloned().collect())
            .unwrap_or_default()
    }

    fn obtain(&self, requirement: &Requirement) -> Option<Distribution> {
        self.by_project
            .get(&requirement.project)
            .and_then(|versions| {
                versions
                    .iter()
                    .rev()
                    .find(|(version, _)| requirement.constraint.contains(version))
            })
            .map(|(_, dist)| dist.clone())
    }

    fn download(&self, location: &Location, scratch_dir: &Path) -> Result<PathBuf, ClientError> {
        match location {
            Location::Path(path) => {
                if location.is_file() {
                    return Ok(path.clone());
                }
                let dest = scratch_dir.join(path.file_name().unwrap_or_default());
                fs_err::copy(path, &dest)?;
                Ok(dest)
            }
            Location::Url(url) => Err(ClientError::UrlNotAllowed(url.clone())),
        }
    }

    fn add_find_links(&mut self, urls: Vec<String>) {
        let dirs = urls
            .into_iter()
            .filter_map(|url| url.strip_prefix("file://").map(PathBuf::from).or(Some(PathBuf::from(url))))
            .collect();
        let _ = self.add_find_links_dirs(dirs);
    }
}

/// Parse `{project}-{version}[-pyX.Y].{egg,tar.gz,tgz,zip}` into a project key,
/// version, and the precedence implied by the extension (`.egg` is a pre-built
/// binary archive; everything else is a source archive awaiting a build step).
fn parse_artifact_filename(path: &Path) -> Result<(ProjectKey, Version, Precedence), ClientError> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| ClientError::UnparsableFilename(path.display().to_string()))?;

    let (stem, precedence) = if let Some(stem) = name.strip_suffix(".egg") {
        (stem, Precedence::BinaryArchive)
    } else if let Some(stem) = name.strip_suffix(".tar.gz") {
        (stem, Precedence::SourceArchive)
    } else if let Some(stem) = name.strip_suffix(".tgz") {
        (stem, Precedence::SourceArchive)
    } else if let Some(stem) = name.strip_suffix(".zip") {
        (stem, Precedence::SourceArchive)
    } else {
        return Err(ClientError::UnparsableFilename(name));
    };

    let (project, version) = distil_distribution::parse_versioned_stem(stem)?;
    Ok((project, version, precedence))
}

/// Keys a collection of already-constructed `IndexClient`s the same way the
/// teacher's process-wide cache would, but as an explicit value a caller owns
/// instead of a global: `(interpreter executable, index-url, find-links)`.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: FxHashMap<ClientKey, Arc<FileIndexClient>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ClientKey {
    interpreter: PathBuf,
    index_url: Option<String>,
    find_links: Vec<PathBuf>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the existing client for this key, or build and insert a new one.
    pub fn get_or_init(
        &mut self,
        interpreter: PathBuf,
        index_url: Option<String>,
        find_links: Vec<PathBuf>,
    ) -> Result<Arc<FileIndexClient>, ClientError> {
        let key = ClientKey {
            interpreter,
            index_url,
            find_links: find_links.clone(),
        };
        if let Some(existing) = self.clients.get(&key) {
            return Ok(Arc::clone(existing));
        }
        let client = Arc::new(FileIndexClient::new(find_links)?);
        self.clients.insert(key, Arc::clone(&client));
        Ok(client)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_allow_list_always_permits_file_urls() {
        let allow_list = HostAllowList::new([]);
        assert!(allow_list.permits("file:///tmp/demo-1.0.egg"));
    }

    #[test]
    fn host_allow_list_rejects_unlisted_hosts() {
        let allow_list = HostAllowList::new(["pypi.org".to_string()]);
        assert!(!allow_list.permits("https://evil.example/demo-1.0.egg"));
        assert!(allow_list.permits("https://pypi.org/demo-1.0.egg"));
    }

    #[test]
    fn parses_egg_filename() {
        let (project, version, precedence) =
            parse_artifact_filename(Path::new("Demo-1.2.3-py3.11.egg")).unwrap();
        assert_eq!(project.as_str(), "demo");
        assert_eq!(version.as_str(), "1.2.3");
        assert_eq!(precedence, Precedence::BinaryArchive);
    }

    #[test]
    fn parses_sdist_filename() {
        let (project, version, precedence) =
            parse_artifact_filename(Path::new("demo-0.9.tar.gz")).unwrap();
        assert_eq!(project.as_str(), "demo");
        assert_eq!(version.as_str(), "0.9");
        assert_eq!(precedence, Precedence::SourceArchive);
    }

    #[test]
    fn scans_find_links_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("demo-1.0-py3.11.egg"), b"").unwrap();
        std::fs::write(dir.path().join("demo-2.0.tar.gz"), b"").unwrap();
        std::fs::write(dir.path().join("not-a-distribution.txt"), b"").unwrap();

        let client = FileIndexClient::new(vec![dir.path().to_path_buf()]).unwrap();
        let best = client
            .obtain(&Requirement::unconstrained("demo"))
            .unwrap();
        assert_eq!(best.version.as_str(), "2.0");
        assert_eq!(client.lookup(&ProjectKey::new("demo")).len(), 2);
    }

    #[test]
    fn obtain_respects_the_requirement_constraint() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("demo-1.0.tar.gz"), b"").unwrap();
        std::fs::write(dir.path().join("demo-3.0.tar.gz"), b"").unwrap();

        let client = FileIndexClient::new(vec![dir.path().to_path_buf()]).unwrap();
        let requirement: Requirement = "demo<2".parse().unwrap();
        let best = client.obtain(&requirement).unwrap();
        assert_eq!(best.version.as_str(), "1.0");
    }

    #[test]
    fn obtain_returns_none_when_nothing_satisfies() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("demo-3.0.tar.gz"), b"").unwrap();

        let client = FileIndexClient::new(vec![dir.path().to_path_buf()]).unwrap();
        let requirement: Requirement = "demo<2".parse().unwrap();
        assert!(client.obtain(&requirement).is_none());
    }

    #[test]
    fn registry_reuses_client_for_identical_key() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = ClientRegistry::new();
        let a = registry
            .get_or_init(PathBuf::from("/usr/bin/python3"), None, vec![dir.path().to_path_buf()])
            .unwrap();
        let b = registry
            .get_or_init(PathBuf::from("/usr/bin/python3"), None, vec![dir.path().to_path_buf()])
            .unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
