//! Breadth-first dependency resolution over a mutable working set (spec §4.4).
//!
//! [`Resolver`] ties together an [`Environment`] of locally reachable distributions,
//! an [`distil_client::IndexClient`] for remote/find-links discovery, and the
//! acquisition machinery in [`acquisition`] that materializes a chosen candidate into
//! `eggs-dir`. It enforces the version-pin map, the site-package visibility policy,
//! and the develop-precedence and packaging-support heuristics along the way.

mod acquisition;
mod egg_metadata;
mod site_filter;

use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;

use globset::GlobSet;

use distil_build::BuildError;
use distil_cache::{CacheError, DownloadCache};
use distil_client::{ClientError, IndexClient};
use distil_distribution::{Distribution, DistributionError, Environment, Precedence, VersionPinMap, WorkingSet};
use distil_extract::ExtractError;
use distil_interpreter::InterpreterInfo;
use distil_normalize::ProjectKey;
use distil_requirement::Requirement;
use distil_version::{Version, VersionError};
use distil_warnings::{Warning, WarningSink};

pub use acquisition::{acquire, rescan_eggs_dir, AcquisitionContext};
pub use egg_metadata::EggMetadata;
pub use site_filter::SiteFilter;

#[derive(Debug, thiserror::Error)]
pub enum ResolverError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Version(#[from] VersionError),
    #[error(transparent)]
    Distribution(#[from] DistributionError),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error("pin map requires {project} outside its requested constraint")]
    IncompatibleVersion { project: ProjectKey },
    #[error("no distribution is available for {project}")]
    MissingDistribution { project: ProjectKey },
    #[error("a version was picked for {project} {version} with no exact pin, and picked versions are disallowed")]
    PickedVersionNotAllowed { project: ProjectKey, version: Version },
    #[error("source tree at {path} is ambiguous: {reason}")]
    AmbiguousSourceTree { path: PathBuf, reason: String },
}

/// The literal project key for the packaging-support distribution the auto-add
/// heuristic (spec §4.4.5) looks for and, if missing, injects.
const PACKAGING_SUPPORT_PROJECT: &str = "setuptools";

/// Immutable resolver policy (spec §4.4.1, §4.4.4, §4.4.6). Built via
/// [`ResolverConfigBuilder`].
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub prefer_final: bool,
    pub newest: bool,
    pub source_only: bool,
    pub include_site_packages: bool,
    pub allowed_eggs_from_site_packages: GlobSet,
    pub use_dependency_links: bool,
    pub allow_picked_versions: bool,
    pub always_unzip: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            prefer_final: true,
            newest: true,
            source_only: false,
            include_site_packages: false,
            allowed_eggs_from_site_packages: GlobSet::empty(),
            use_dependency_links: false,
            allow_picked_versions: true,
            always_unzip: false,
        }
    }
}

/// Builds a [`ResolverConfig`] via `with_*` calls over sensible defaults, mirroring the
/// facade's `Config`/`ConfigBuilder` pattern at this crate's narrower scope.
#[derive(Debug, Clone, Default)]
pub struct ResolverConfigBuilder {
    config: ResolverConfig,
}

impl ResolverConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prefer_final(mut self, value: bool) -> Self {
        self.config.prefer_final = value;
        self
    }

    pub fn newest(mut self, value: bool) -> Self {
        self.config.newest = value;
        self
    }

    pub fn source_only(mut self, value: bool) -> Self {
        self.config.source_only = value;
        self
    }

    pub fn include_site_packages(mut self, value: bool) -> Self {
        self.config.include_site_packages = value;
        self
    }

    pub fn allowed_eggs_from_site_packages(mut self, globs: GlobSet) -> Self {
        self.config.allowed_eggs_from_site_packages = globs;
        self
    }

    pub fn use_dependency_links(mut self, value: bool) -> Self {
        self.config.use_dependency_links = value;
        self
    }

    pub fn allow_picked_versions(mut self, value: bool) -> Self {
        self.config.allow_picked_versions = value;
        self
    }

    pub fn always_unzip(mut self, value: bool) -> Self {
        self.config.always_unzip = value;
        self
    }

    pub fn build(self) -> ResolverConfig {
        self.config
    }
}

/// Which path a satisfied requirement takes: already present locally, or a remote
/// candidate that still needs to be fetched and materialized.
enum Satisfaction {
    Local(Distribution),
    Fetch(Distribution),
}

/// Breadth-first dependency resolver (spec §4.4).
pub struct Resolver {
    config: ResolverConfig,
    pins: VersionPinMap,
    client: Box<dyn IndexClient>,
    interpreter: InterpreterInfo,
    environment: Environment,
    site_filter: SiteFilter,
    eggs_dir: PathBuf,
    cache: Option<DownloadCache>,
    packaging_support_path: Option<PathBuf>,
    warnings: WarningSink,
}

impl Resolver {
    pub fn new(
        config: ResolverConfig,
        pins: VersionPinMap,
        client: Box<dyn IndexClient>,
        interpreter: InterpreterInfo,
        eggs_dir: PathBuf,
        cache: Option<DownloadCache>,
        packaging_support_path: Option<PathBuf>,
        warnings: WarningSink,
    ) -> Result<Self, ResolverError> {
        let environment = rescan_eggs_dir(&eggs_dir, interpreter.version().to_string())?;
        let site_filter = SiteFilter::new(
            config.include_site_packages,
            config.allowed_eggs_from_site_packages.clone(),
        );
        Ok(Self {
            config,
            pins,
            client,
            interpreter,
            environment,
            site_filter,
            eggs_dir,
            cache,
            packaging_support_path,
            warnings,
        })
    }

    pub fn warnings(&self) -> &WarningSink {
        &self.warnings
    }

    fn refresh_environment(&mut self) -> Result<(), ResolverError> {
        self.environment = rescan_eggs_dir(&self.eggs_dir, self.interpreter.version().to_string())?;
        Ok(())
    }

    /// The satisfaction check (spec §4.4.1): decide whether `requirement` is already
    /// met locally, or must be fetched, raising `IncompatibleVersion` if the pin map
    /// contradicts it.
    fn satisfy(&self, requirement: &Requirement) -> Result<(Requirement, Satisfaction), ResolverError> {
        let constrained = match self.pins.constrain(requirement) {
            Some(constrained) => constrained,
            None if self.pins.get(&requirement.project).is_some() => {
                return Err(ResolverError::IncompatibleVersion {
                    project: requirement.project.clone(),
                });
            }
            None => requirement.clone(),
        };

        let mut candidates: Vec<Distribution> = self
            .environment
            .candidates(&constrained.project)
            .iter()
            .filter(|dist| dist.satisfies(&constrained))
            .filter(|dist| self.site_filter.permits(dist, &self.interpreter))
            .filter(|dist| !self.config.source_only || dist.precedence != Precedence::BinaryArchive)
            .cloned()
            .collect();

        if let Some(develop) = candidates.iter().find(|d| d.precedence == Precedence::Develop) {
            return Ok((constrained, Satisfaction::Local(develop.clone())));
        }

        if candidates.is_empty() {
            let fetched = self
                .client
                .obtain(&constrained)
                .ok_or_else(|| ResolverError::MissingDistribution {
                    project: constrained.project.clone(),
                })?;
            return Ok((constrained, Satisfaction::Fetch(fetched)));
        }

        if constrained.constraint.as_exact().is_some() {
            return Ok((constrained, Satisfaction::Local(candidates.remove(0))));
        }

        if self.config.prefer_final && candidates.iter().any(|d| d.version.is_final()) {
            candidates.retain(|d| d.version.is_final());
        }

        let local_best = self.tie_break(candidates);

        if !self.config.newest {
            return Ok((constrained, Satisfaction::Local(local_best)));
        }

        match self.client.obtain(&constrained) {
            None => Ok((constrained, Satisfaction::Local(local_best))),
            Some(remote) => {
                let remote_wins = if self.config.prefer_final {
                    (remote.version.is_final() && !local_best.version.is_final())
                        || remote.version > local_best.version
                } else {
                    remote.version > local_best.version
                };
                if remote_wins {
                    Ok((constrained, Satisfaction::Fetch(remote)))
                } else {
                    Ok((constrained, Satisfaction::Local(local_best)))
                }
            }
        }
    }

    /// Tie-break among the best-ranked candidates (spec §4.4.1 step 9): prefer the one
    /// whose directory sits inside the download cache; otherwise the lexicographically
    /// last location.
    fn tie_break(&self, candidates: Vec<Distribution>) -> Distribution {
        let top_version = candidates[0].version.clone();
        let top_precedence = candidates[0].precedence;
        let mut tied: Vec<Distribution> = candidates
            .into_iter()
            .filter(|d| d.version == top_version && d.precedence == top_precedence)
            .collect();

        if tied.len() == 1 {
            return tied.remove(0);
        }

        if let Some(cache) = &self.cache {
            if let Some(index) = tied
                .iter()
                .position(|d| d.location.path().is_some_and(|p| cache.contains(p)))
            {
                return tied.remove(index);
            }
        }

        tied.into_iter()
            .max_by(|a, b| a.location.to_string().cmp(&b.location.to_string()))
            .expect("tied is non-empty")
    }

    fn check_picked_version(&self, project: &ProjectKey, version: &Version) -> Result<(), ResolverError> {
        if self.pins.get(project).is_some() {
            return Ok(());
        }
        if self.config.allow_picked_versions {
            self.warnings.push(Warning::PickedVersion {
                project: project.to_string(),
                version: version.to_string(),
            });
            Ok(())
        } else {
            Err(ResolverError::PickedVersionNotAllowed {
                project: project.clone(),
                version: version.clone(),
            })
        }
    }

    /// Fetch and materialize `candidate`, refresh the Environment, and return the real
    /// distribution reconstructed from the materialized artifact's metadata.
    fn acquire(&mut self, candidate: &Distribution, requested_project: &ProjectKey) -> Result<Distribution, ResolverError> {
        let ctx = AcquisitionContext {
            eggs_dir: &self.eggs_dir,
            cache: self.cache.as_ref(),
            client: self.client.as_ref(),
            interpreter: &self.interpreter,
            packaging_support_path: self.packaging_support_path.as_deref(),
            always_unzip: self.config.always_unzip,
            warnings: &self.warnings,
        };
        let materialized = acquisition::acquire(candidate, requested_project, &ctx)?;
        self.refresh_environment()?;

        if self.config.use_dependency_links {
            let links = materialized.dependency_links();
            if !links.is_empty() {
                self.client.add_find_links(links);
            }
        }

        Ok(materialized)
    }

    /// If `dist` declares namespace packages but not a dependency on the
    /// packaging-support distribution, queue an implicit requirement for it (spec
    /// §4.4.5), warning when the triggering distribution is develop-installed.
    fn maybe_add_setuptools(&self, dist: &Distribution, queue: &mut VecDeque<Requirement>) {
        let setuptools = ProjectKey::new(PACKAGING_SUPPORT_PROJECT);
        if !dist.declares_namespace_packages() || dist.requires_project(&setuptools) {
            return;
        }
        if dist.precedence == Precedence::Develop {
            acquisition::warn_develop_without_packaging_dependency(&dist.project, &self.warnings);
        }
        queue.push_back(Requirement::unconstrained(setuptools));
    }

    /// Resolve `requirements` against (and into) `working_set`, breadth-first (spec
    /// §4.4.3). Requirements already satisfied in an incoming working set are
    /// respected as-is; cycles terminate via the `processed` set.
    pub fn resolve(
        &mut self,
        requirements: Vec<Requirement>,
        mut working_set: WorkingSet,
    ) -> Result<WorkingSet, ResolverError> {
        let mut queue: VecDeque<Requirement> = requirements.into_iter().collect();
        let mut processed: HashSet<Requirement> = HashSet::new();

        while let Some(req) = queue.pop_front() {
            let (constrained, satisfaction) = self.satisfy(&req)?;

            if processed.contains(&constrained) {
                continue;
            }

            if let Some(existing) = working_set.get(&constrained.project) {
                if !existing.satisfies(&constrained) {
                    return Err(ResolverError::Distribution(DistributionError::VersionConflict {
                        project: constrained.project.clone(),
                        existing: existing.version.clone(),
                    }));
                }
                processed.insert(constrained);
                continue;
            }

            let dist = match satisfaction {
                Satisfaction::Local(dist) => dist,
                Satisfaction::Fetch(candidate) => {
                    self.check_picked_version(&candidate.project, &candidate.version)?;
                    let materialized = self.acquire(&candidate, &constrained.project)?;
                    working_set.add(materialized.clone());
                    self.maybe_add_setuptools(&materialized, &mut queue);
                    materialized
                }
            };

            if !dist.satisfies(&constrained) {
                return Err(ResolverError::Distribution(DistributionError::VersionConflict {
                    project: constrained.project.clone(),
                    existing: dist.version.clone(),
                }));
            }

            if !working_set.contains(&dist.project) {
                working_set.add(dist.clone());
                self.maybe_add_setuptools(&dist, &mut queue);
            }

            for sub_requirement in dist.requires(&constrained.extras).into_iter().rev() {
                queue.push_front(sub_requirement);
            }
            processed.insert(constrained);
        }

        Ok(working_set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use distil_distribution::{DistMetadata, Location};
    use std::collections::HashMap;
    use std::sync::Arc;

    #[derive(Debug, Default)]
    struct FakeMetadata {
        files: HashMap<&'static str, Vec<String>>,
    }

    impl DistMetadata for FakeMetadata {
        fn has_metadata(&self, name: &str) -> bool {
            self.files.contains_key(name)
        }

        fn get_metadata_lines(&self, name: &str) -> Vec<String> {
            self.files.get(name).cloned().unwrap_or_default()
        }
    }

    fn dist(project: &str, version: &str, precedence: Precedence, metadata: FakeMetadata) -> Distribution {
        Distribution::new(
            project,
            Version::parse(version).unwrap(),
            Location::Path(PathBuf::from(format!("/eggs/{project}-{version}.egg"))),
            precedence,
            Arc::new(metadata),
        )
    }

    struct EmptyClient;
    impl IndexClient for EmptyClient {
        fn lookup(&self, _project: &ProjectKey) -> Vec<Distribution> {
            Vec::new()
        }
        fn obtain(&self, _requirement: &Requirement) -> Option<Distribution> {
            None
        }
        fn download(&self, _location: &distil_distribution::Location, _scratch_dir: &std::path::Path) -> Result<PathBuf, ClientError> {
            unreachable!("test fixtures never need to download")
        }
        fn add_find_links(&mut self, _urls: Vec<String>) {}
    }

    /// A fixed set of remote candidates for exercising the fetch path without a real
    /// find-links directory: `obtain` mirrors `FileIndexClient`'s "highest version
    /// satisfying the requirement's constraint" rule.
    struct FakeRemoteClient(Vec<Distribution>);
    impl IndexClient for FakeRemoteClient {
        fn lookup(&self, project: &ProjectKey) -> Vec<Distribution> {
            self.0.iter().filter(|d| d.project == *project).cloned().collect()
        }
        fn obtain(&self, requirement: &Requirement) -> Option<Distribution> {
            self.0
                .iter()
                .filter(|d| d.project == requirement.project && requirement.constraint.contains(&d.version))
                .max_by(|a, b| a.version.cmp(&b.version))
                .cloned()
        }
        fn download(&self, location: &distil_distribution::Location, _scratch_dir: &std::path::Path) -> Result<PathBuf, ClientError> {
            match location {
                distil_distribution::Location::Path(path) => Ok(path.clone()),
                distil_distribution::Location::Url(url) => Err(ClientError::UrlNotAllowed(url.clone())),
            }
        }
        fn add_find_links(&mut self, _urls: Vec<String>) {}
    }

    fn fake_interpreter() -> InterpreterInfo {
        InterpreterInfo::new(
            PathBuf::from("/usr/bin/python3"),
            distil_interpreter::PythonVersion { major: 3, minor: 11 },
            Vec::new(),
            Vec::new(),
        )
    }

    fn resolver_with_environment(distributions: Vec<Distribution>) -> Resolver {
        Resolver {
            config: ResolverConfig::default(),
            pins: VersionPinMap::new(),
            client: Box::new(EmptyClient),
            interpreter: fake_interpreter(),
            environment: Environment::from_distributions("3.11", distributions),
            site_filter: SiteFilter::new(false, GlobSet::empty()),
            eggs_dir: PathBuf::from("/nonexistent/eggs-dir"),
            cache: None,
            packaging_support_path: None,
            warnings: WarningSink::new(),
        }
    }

    #[test]
    fn develop_precedence_wins_unconditionally() {
        let resolver = resolver_with_environment(vec![
            dist("demo", "2.0", Precedence::BinaryArchive, FakeMetadata::default()),
            dist("demo", "1.0", Precedence::Develop, FakeMetadata::default()),
        ]);
        let req: Requirement = "demo".parse().unwrap();
        let (_, satisfaction) = resolver.satisfy(&req).unwrap();
        match satisfaction {
            Satisfaction::Local(d) => assert_eq!(d.precedence, Precedence::Develop),
            Satisfaction::Fetch(_) => panic!("expected a local develop distribution"),
        }
    }

    #[test]
    fn fetch_only_considers_candidates_satisfying_the_constraint() {
        let mut resolver = resolver_with_environment(vec![]);
        resolver.client = Box::new(FakeRemoteClient(vec![
            dist("demo", "1.0", Precedence::BinaryArchive, FakeMetadata::default()),
            dist("demo", "3.0", Precedence::BinaryArchive, FakeMetadata::default()),
        ]));
        let req: Requirement = "demo<2".parse().unwrap();
        let (_, satisfaction) = resolver.satisfy(&req).unwrap();
        match satisfaction {
            Satisfaction::Fetch(d) => assert_eq!(d.version.as_str(), "1.0"),
            Satisfaction::Local(_) => panic!("expected a fetch from the index"),
        }
    }

    #[test]
    fn missing_distribution_is_fatal_when_index_has_nothing() {
        let resolver = resolver_with_environment(vec![]);
        let req: Requirement = "demo".parse().unwrap();
        assert!(matches!(
            resolver.satisfy(&req),
            Err(ResolverError::MissingDistribution { .. })
        ));
    }

    #[test]
    fn incompatible_pin_is_fatal() {
        let mut resolver = resolver_with_environment(vec![dist(
            "demo",
            "2.0",
            Precedence::BinaryArchive,
            FakeMetadata::default(),
        )]);
        resolver.pins.set("demo", Version::parse("3.0").unwrap());
        let req: Requirement = "demo<2.0".parse().unwrap();
        assert!(matches!(
            resolver.satisfy(&req),
            Err(ResolverError::IncompatibleVersion { .. })
        ));
    }

    #[test]
    fn exact_constraint_returns_unique_candidate_even_if_not_newest() {
        let resolver = resolver_with_environment(vec![
            dist("demo", "1.0", Precedence::BinaryArchive, FakeMetadata::default()),
            dist("demo", "2.0", Precedence::BinaryArchive, FakeMetadata::default()),
        ]);
        let req: Requirement = "demo==1.0".parse().unwrap();
        let (_, satisfaction) = resolver.satisfy(&req).unwrap();
        match satisfaction {
            Satisfaction::Local(d) => assert_eq!(d.version.as_str(), "1.0"),
            Satisfaction::Fetch(_) => panic!("expected a local match"),
        }
    }

    #[test]
    fn site_filter_excludes_site_package_candidates_not_on_the_allow_list() {
        let mut dist_in_site = dist("demo", "1.0", Precedence::BinaryArchive, FakeMetadata::default());
        dist_in_site.location = Location::Path(PathBuf::from("/usr/lib/python3.11/site-packages/demo-1.0.egg"));
        let mut resolver = resolver_with_environment(vec![dist_in_site]);
        resolver.config.include_site_packages = true;
        resolver.site_filter = SiteFilter::new(true, GlobSet::empty());
        resolver.interpreter = InterpreterInfo::new(
            PathBuf::from("/usr/bin/python3"),
            distil_interpreter::PythonVersion { major: 3, minor: 11 },
            Vec::new(),
            vec![PathBuf::from("/usr/lib/python3.11/site-packages")],
        );
        let req: Requirement = "demo".parse().unwrap();
        assert!(matches!(
            resolver.satisfy(&req),
            Err(ResolverError::MissingDistribution { .. })
        ));
    }

    #[test]
    fn site_filter_excludes_site_package_candidates_by_default() {
        let mut dist_in_site = dist("demo", "1.0", Precedence::BinaryArchive, FakeMetadata::default());
        dist_in_site.location = Location::Path(PathBuf::from("/usr/lib/python3.11/site-packages/demo-1.0.egg"));
        // `resolver_with_environment` already builds its resolver with the default
        // policy (`include_site_packages: false`); this test leaves that untouched.
        let mut resolver = resolver_with_environment(vec![dist_in_site]);
        resolver.interpreter = InterpreterInfo::new(
            PathBuf::from("/usr/bin/python3"),
            distil_interpreter::PythonVersion { major: 3, minor: 11 },
            Vec::new(),
            vec![PathBuf::from("/usr/lib/python3.11/site-packages")],
        );
        let req: Requirement = "demo".parse().unwrap();
        assert!(matches!(
            resolver.satisfy(&req),
            Err(ResolverError::MissingDistribution { .. })
        ));
    }

    #[test]
    fn resolve_expands_transitive_requirements() {
        let mut requires_demoneeded = FakeMetadata::default();
        requires_demoneeded
            .files
            .insert("requires.txt", vec!["demoneeded>=1.0".to_string()]);

        let mut resolver = resolver_with_environment(vec![
            dist("demo", "1.0", Precedence::BinaryArchive, requires_demoneeded),
            dist("demoneeded", "1.2", Precedence::BinaryArchive, FakeMetadata::default()),
        ]);

        let req: Requirement = "demo".parse().unwrap();
        let ws = resolver.resolve(vec![req], WorkingSet::new()).unwrap();

        assert!(ws.contains(&ProjectKey::new("demo")));
        assert!(ws.contains(&ProjectKey::new("demoneeded")));
    }

    #[test]
    fn resolve_detects_conflict_with_preexisting_working_set_entry() {
        let resolver_env = vec![dist("demo", "2.0", Precedence::BinaryArchive, FakeMetadata::default())];
        let mut resolver = resolver_with_environment(resolver_env);

        let mut ws = WorkingSet::new();
        ws.add(dist("demo", "1.0", Precedence::BinaryArchive, FakeMetadata::default()));

        let req: Requirement = "demo>=2.0".parse().unwrap();
        assert!(matches!(
            resolver.resolve(vec![req], ws),
            Err(ResolverError::Distribution(DistributionError::VersionConflict { .. }))
        ));
    }
}
