//! End-to-end resolver scenarios (S1-S6) and the data-model invariants from spec §8,
//! driven entirely through `Resolver::new` and `Resolver::resolve` with a
//! pre-populated `eggs-dir` so no external interpreter or build tool is invoked.

use std::fs;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSetBuilder};

use distil_client::{ClientError, FileIndexClient, IndexClient};
use distil_distribution::{DistributionError, Location, WorkingSet};
use distil_interpreter::{InterpreterInfo, PythonVersion};
use distil_normalize::ProjectKey;
use distil_requirement::Requirement;
use distil_resolver::{Resolver, ResolverConfigBuilder, ResolverError};
use distil_warnings::WarningSink;

fn interpreter() -> InterpreterInfo {
    InterpreterInfo::new(
        PathBuf::from("/usr/bin/python3"),
        PythonVersion { major: 3, minor: 11 },
        Vec::new(),
        Vec::new(),
    )
}

fn interpreter_with_site(site_paths: &[PathBuf]) -> InterpreterInfo {
    InterpreterInfo::new(
        PathBuf::from("/usr/bin/python3"),
        PythonVersion { major: 3, minor: 11 },
        Vec::new(),
        site_paths.to_vec(),
    )
}

/// Write a directory-shaped egg (`{project}-{version}-py3.11.egg/EGG-INFO/...`) so
/// `rescan_eggs_dir` picks it up without needing a real archive.
fn write_egg(
    eggs_dir: &Path,
    project: &str,
    version: &str,
    requires: Option<&str>,
    namespace_packages: bool,
) {
    let egg_dir = eggs_dir.join(format!("{project}-{version}-py3.11.egg"));
    let egg_info = egg_dir.join("EGG-INFO");
    fs::create_dir_all(&egg_info).unwrap();
    if let Some(requires) = requires {
        fs::write(egg_info.join("requires.txt"), requires).unwrap();
    }
    if namespace_packages {
        fs::write(egg_info.join("namespace_packages.txt"), format!("{project}\n")).unwrap();
    }
}

struct EmptyClient;
impl IndexClient for EmptyClient {
    fn lookup(&self, _project: &ProjectKey) -> Vec<distil_distribution::Distribution> {
        Vec::new()
    }
    fn obtain(&self, _requirement: &Requirement) -> Option<distil_distribution::Distribution> {
        None
    }
    fn download(&self, _location: &Location, _scratch_dir: &Path) -> Result<PathBuf, ClientError> {
        unreachable!("these scenarios never need to fetch from the index")
    }
    fn add_find_links(&mut self, _urls: Vec<String>) {}
}

/// S1: a simple top-level requirement satisfied by a single locally available
/// distribution resolves to a working set containing exactly that distribution.
#[test]
fn scenario_simple_satisfaction() {
    let eggs_dir = tempfile::tempdir().unwrap();
    write_egg(eggs_dir.path(), "demo", "1.0", None, false);

    let mut resolver = Resolver::new(
        ResolverConfigBuilder::new().build(),
        Default::default(),
        Box::new(EmptyClient),
        interpreter(),
        eggs_dir.path().to_path_buf(),
        None,
        None,
        WarningSink::new(),
    )
    .unwrap();

    let req: Requirement = "demo".parse().unwrap();
    let ws = resolver.resolve(vec![req], WorkingSet::new()).unwrap();

    assert_eq!(ws.len(), 1);
    assert_eq!(ws.get(&ProjectKey::new("demo")).unwrap().version.as_str(), "1.0");
}

/// S2: a dependency declared in `requires.txt` is pulled transitively into the
/// working set without being named as a top-level requirement.
#[test]
fn scenario_dependency_expansion() {
    let eggs_dir = tempfile::tempdir().unwrap();
    write_egg(eggs_dir.path(), "demo", "1.0", Some("demoneeded>=1.0\n"), false);
    write_egg(eggs_dir.path(), "demoneeded", "1.2", None, false);

    let mut resolver = Resolver::new(
        ResolverConfigBuilder::new().build(),
        Default::default(),
        Box::new(EmptyClient),
        interpreter(),
        eggs_dir.path().to_path_buf(),
        None,
        None,
        WarningSink::new(),
    )
    .unwrap();

    let req: Requirement = "demo".parse().unwrap();
    let ws = resolver.resolve(vec![req], WorkingSet::new()).unwrap();

    assert_eq!(ws.len(), 2);
    assert!(ws.contains(&ProjectKey::new("demoneeded")));
}

/// S3: a develop-installed distribution always wins over a newer binary archive.
#[test]
fn scenario_develop_installation_wins() {
    let eggs_dir = tempfile::tempdir().unwrap();
    write_egg(eggs_dir.path(), "demo", "2.0", None, false);

    let mut resolver = Resolver::new(
        ResolverConfigBuilder::new().build(),
        Default::default(),
        Box::new(EmptyClient),
        interpreter(),
        eggs_dir.path().to_path_buf(),
        None,
        None,
        WarningSink::new(),
    )
    .unwrap();

    // Simulate a prior `develop` install by seeding the working set directly, the way
    // `DevelopInstaller` would after linking a source checkout into place.
    let mut ws = WorkingSet::new();
    ws.add(distil_distribution::Distribution::new(
        ProjectKey::new("demo"),
        distil_version::Version::parse("1.0").unwrap(),
        Location::Path(PathBuf::from("/src/demo")),
        distil_distribution::Precedence::Develop,
        std::sync::Arc::new(NoMetadata),
    ));

    let req: Requirement = "demo".parse().unwrap();
    let ws = resolver.resolve(vec![req], ws).unwrap();
    assert_eq!(ws.get(&ProjectKey::new("demo")).unwrap().precedence, distil_distribution::Precedence::Develop);
}

#[derive(Debug, Default)]
struct NoMetadata;
impl distil_distribution::DistMetadata for NoMetadata {
    fn has_metadata(&self, _name: &str) -> bool {
        false
    }
    fn get_metadata_lines(&self, _name: &str) -> Vec<String> {
        Vec::new()
    }
}

/// S4: a distribution reachable only via the interpreter's site paths is invisible to
/// resolution unless its project key is on the allow-list.
#[test]
fn scenario_site_filtering() {
    let eggs_dir = tempfile::tempdir().unwrap();
    write_egg(eggs_dir.path(), "demo", "1.0", None, false);

    let site_path = eggs_dir.path().to_path_buf();
    let mut blocked = Resolver::new(
        ResolverConfigBuilder::new().include_site_packages(true).build(),
        Default::default(),
        Box::new(EmptyClient),
        interpreter_with_site(&[site_path.clone()]),
        eggs_dir.path().to_path_buf(),
        None,
        None,
        WarningSink::new(),
    )
    .unwrap();

    let req: Requirement = "demo".parse().unwrap();
    assert!(matches!(
        blocked.resolve(vec![req.clone()], WorkingSet::new()),
        Err(ResolverError::MissingDistribution { .. })
    ));

    let mut allow = GlobSetBuilder::new();
    allow.add(Glob::new("demo").unwrap());
    let mut allowed = Resolver::new(
        ResolverConfigBuilder::new()
            .include_site_packages(true)
            .allowed_eggs_from_site_packages(allow.build().unwrap())
            .build(),
        Default::default(),
        Box::new(EmptyClient),
        interpreter_with_site(&[site_path]),
        eggs_dir.path().to_path_buf(),
        None,
        None,
        WarningSink::new(),
    )
    .unwrap();

    let ws = allowed.resolve(vec![req], WorkingSet::new()).unwrap();
    assert!(ws.contains(&ProjectKey::new("demo")));
}

/// S6: a requirement that conflicts with an entry already in the working set is a
/// fatal version conflict, not a silent pick.
#[test]
fn scenario_version_conflict_is_fatal() {
    let eggs_dir = tempfile::tempdir().unwrap();
    write_egg(eggs_dir.path(), "demo", "1.0", None, false);

    let mut resolver = Resolver::new(
        ResolverConfigBuilder::new().build(),
        Default::default(),
        Box::new(EmptyClient),
        interpreter(),
        eggs_dir.path().to_path_buf(),
        None,
        None,
        WarningSink::new(),
    )
    .unwrap();

    let mut ws = WorkingSet::new();
    ws.add(distil_distribution::Distribution::new(
        ProjectKey::new("demo"),
        distil_version::Version::parse("1.0").unwrap(),
        Location::Path(PathBuf::from("/eggs/demo-1.0.egg")),
        distil_distribution::Precedence::BinaryArchive,
        std::sync::Arc::new(NoMetadata),
    ));

    let req: Requirement = "demo>=2.0".parse().unwrap();
    assert!(matches!(
        resolver.resolve(vec![req], ws),
        Err(ResolverError::Distribution(DistributionError::VersionConflict { .. }))
    ));
}

/// Invariant: find-links discovery and resolution compose — a project only available
/// through a find-links directory (not pre-scanned into `eggs-dir`) still fails with
/// `MissingDistribution` once the index has nothing for it either.
#[test]
fn missing_distribution_without_any_source_is_fatal() {
    let eggs_dir = tempfile::tempdir().unwrap();
    let find_links = tempfile::tempdir().unwrap();
    let client = FileIndexClient::new(vec![find_links.path().to_path_buf()]).unwrap();

    let mut resolver = Resolver::new(
        ResolverConfigBuilder::new().build(),
        Default::default(),
        Box::new(client),
        interpreter(),
        eggs_dir.path().to_path_buf(),
        None,
        None,
        WarningSink::new(),
    )
    .unwrap();

    let req: Requirement = "nonexistent".parse().unwrap();
    assert!(matches!(
        resolver.resolve(vec![req], WorkingSet::new()),
        Err(ResolverError::MissingDistribution { .. })
    ));
}

/// A fixed set of remote candidates, each a directory-shaped egg on disk so the
/// resolver's binary-archive acquisition path can materialize it without a real
/// archive. `obtain` returns the highest version satisfying the requirement's
/// constraint, matching `FileIndexClient`'s own rule.
struct FakeRemoteClient(Vec<distil_distribution::Distribution>);
impl IndexClient for FakeRemoteClient {
    fn lookup(&self, project: &ProjectKey) -> Vec<distil_distribution::Distribution> {
        self.0.iter().filter(|d| d.project == *project).cloned().collect()
    }
    fn obtain(&self, requirement: &Requirement) -> Option<distil_distribution::Distribution> {
        self.0
            .iter()
            .filter(|d| d.project == requirement.project && requirement.constraint.contains(&d.version))
            .max_by(|a, b| a.version.cmp(&b.version))
            .cloned()
    }
    fn download(&self, location: &Location, _scratch_dir: &Path) -> Result<PathBuf, ClientError> {
        match location {
            Location::Path(path) => Ok(path.clone()),
            Location::Url(url) => Err(ClientError::UrlNotAllowed(url.clone())),
        }
    }
    fn add_find_links(&mut self, _urls: Vec<String>) {}
}

fn remote_egg(root: &Path, project: &str, version: &str) -> distil_distribution::Distribution {
    let dir = root.join(format!("source-{project}-{version}"));
    fs::create_dir_all(dir.join("EGG-INFO")).unwrap();
    distil_distribution::Distribution::new(
        project,
        distil_version::Version::parse(version).unwrap(),
        Location::Path(dir),
        distil_distribution::Precedence::BinaryArchive,
        std::sync::Arc::new(NoMetadata),
    )
}

/// Invariant 3: a constrained requirement with no local candidate is satisfied by
/// fetching a version that actually satisfies the constraint, not unconditionally
/// the newest one the index carries.
#[test]
fn scenario_fetch_honors_the_requested_constraint() {
    let eggs_dir = tempfile::tempdir().unwrap();
    let sources = tempfile::tempdir().unwrap();
    let client = FakeRemoteClient(vec![
        remote_egg(sources.path(), "demo", "1.0"),
        remote_egg(sources.path(), "demo", "3.0"),
    ]);

    let mut resolver = Resolver::new(
        ResolverConfigBuilder::new().build(),
        Default::default(),
        Box::new(client),
        interpreter(),
        eggs_dir.path().to_path_buf(),
        None,
        None,
        WarningSink::new(),
    )
    .unwrap();

    let req: Requirement = "demo<2".parse().unwrap();
    let ws = resolver.resolve(vec![req], WorkingSet::new()).unwrap();
    assert_eq!(ws.get(&ProjectKey::new("demo")).unwrap().version.as_str(), "1.0");
}
