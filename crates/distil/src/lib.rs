//! The installer facade (spec §6): the public surface a caller drives instead of
//! wiring the resolver, script generator, and develop-installer crates together
//! itself.
//!
//! [`Installer`] owns the one piece of long-lived state this crate needs — a
//! [`ClientRegistry`] and an [`InterpreterProbe`] cache — so that repeated calls
//! against the same interpreter and find-links set don't re-probe or re-scan. Every
//! other concern (pins, site-package visibility, tie-breaking) is immutable
//! [`Config`], built once through [`ConfigBuilder`] and never mutated in place: the
//! teacher's process-wide getter/setter singletons (spec §5, §6) become an explicit
//! value the caller owns and threads through instead.

mod client;
mod error;

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use globset::GlobSet;
use tracing::instrument;

use client::ClientHandle;
pub use error::Error;

pub use distil_build::BuildExtConfig;
use distil_cache::DownloadCache;
use distil_client::{ClientRegistry, FileIndexClient};
use distil_distribution::{VersionPinMap, WorkingSet};
pub use distil_installer::BuildExtOptions as DevelopBuildExtOptions;
use distil_installer::DevelopInstaller;
use distil_interpreter::{InterpreterInfo, InterpreterProbe};
use distil_requirement::Requirement;
use distil_resolver::{Resolver, ResolverConfigBuilder};
pub use distil_script::{ClassicConfig, SiteSafeConfig};
use distil_warnings::WarningSink;

/// Immutable policy for every resolve/install call an [`Installer`] makes, built via
/// [`ConfigBuilder`] (spec §3, §6).
#[derive(Debug, Clone)]
pub struct Config {
    pub default_versions: VersionPinMap,
    pub download_cache: Option<PathBuf>,
    pub install_from_cache: bool,
    pub prefer_final: bool,
    pub include_site_packages: bool,
    pub allowed_eggs_from_site_packages: GlobSet,
    pub use_dependency_links: bool,
    pub allow_picked_versions: bool,
    pub always_unzip: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_versions: VersionPinMap::new(),
            download_cache: None,
            install_from_cache: false,
            prefer_final: true,
            include_site_packages: false,
            allowed_eggs_from_site_packages: GlobSet::empty(),
            use_dependency_links: false,
            allow_picked_versions: true,
            always_unzip: false,
        }
    }
}

/// Builds a [`Config`] via `with_*` calls over sensible defaults.
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn default_versions(mut self, value: VersionPinMap) -> Self {
        self.config.default_versions = value;
        self
    }

    pub fn download_cache(mut self, value: Option<PathBuf>) -> Self {
        self.config.download_cache = value;
        self
    }

    pub fn install_from_cache(mut self, value: bool) -> Self {
        self.config.install_from_cache = value;
        self
    }

    pub fn prefer_final(mut self, value: bool) -> Self {
        self.config.prefer_final = value;
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

    pub fn build(self) -> Config {
        self.config
    }
}

/// Installs a `tracing-subscriber` `EnvFilter` subscriber reading `RUST_LOG` (or
/// `info` if unset). A helper the caller opts into — this crate never installs a
/// subscriber on its own, since owning the logging sink is the orchestration
/// wrapper's job, not this library's (spec §6 ambient addition).
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Ties the resolver, script generator, and develop-installer together behind one
/// configuration (spec §3 "Config"). Long-lived: construct one `Installer` and reuse
/// it across calls so interpreter probes and find-links scans amortize.
pub struct Installer {
    config: Config,
    clients: ClientRegistry,
    probe: InterpreterProbe,
    warnings: Vec<String>,
}

impl Installer {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            clients: ClientRegistry::new(),
            probe: InterpreterProbe::new(),
            warnings: Vec::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Warnings accumulated across every call made so far (spec §7 "Warnings"),
    /// deduplicated by message within each individual call's own resolve.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    fn interpreter(&self, executable: &Path) -> Result<InterpreterInfo, Error> {
        let resolved = InterpreterProbe::resolve_executable(executable)?;
        Ok((*self.probe.probe(&resolved)?).clone())
    }

    /// Reduce `(index, links)` to the effective `(index-url, find-links-dirs)` pair a
    /// client should be built from, applying `install_from_cache`'s override (spec
    /// §6: "forces index = file://{download_cache} and clears find-links").
    fn effective_find_links(
        &self,
        index: Option<&str>,
        links: &[PathBuf],
    ) -> Result<(Option<String>, Vec<PathBuf>), Error> {
        if self.config.install_from_cache {
            let cache = self
                .config
                .download_cache
                .as_deref()
                .ok_or(Error::MissingDownloadCache)?;
            return Ok((Some(format!("file://{}", cache.display())), vec![cache.to_path_buf()]));
        }

        let mut dirs = links.to_vec();
        if let Some(url) = index.and_then(|url| url.strip_prefix("file://")) {
            dirs.push(PathBuf::from(url));
        }
        Ok((index.map(str::to_string), dirs))
    }

    /// Build the `IndexClient` this call should use: an owned client when dependency
    /// links can grow its search set mid-resolve, or a registry-shared one otherwise
    /// (see [`client::ClientHandle`]).
    fn client_for(
        &mut self,
        executable: &Path,
        index: Option<&str>,
        links: &[PathBuf],
    ) -> Result<ClientHandle, Error> {
        let (index, dirs) = self.effective_find_links(index, links)?;

        if self.config.use_dependency_links {
            return Ok(ClientHandle::Owned(FileIndexClient::new(dirs)?));
        }

        let shared: Arc<FileIndexClient> = self
            .clients
            .get_or_init(executable.to_path_buf(), index, dirs)?;
        Ok(ClientHandle::Shared(shared))
    }

    /// Overlay per-call `versions` pins over `self.config.default_versions`,
    /// preferring the caller's override where both name the same project.
    fn merged_pins(&self, versions: &VersionPinMap) -> VersionPinMap {
        let mut merged = self.config.default_versions.clone();
        for (project, version) in versions.iter() {
            merged.set(project.clone(), version.clone());
        }
        merged
    }

    /// Resolve `specs` into `working_set`, fetching and materializing whatever isn't
    /// already present in `eggs_dir`, and return the resulting working set (spec §6
    /// `install`).
    ///
    /// `extra_search_paths` is accepted for parity with the external interface's
    /// full parameter list but has no effect on resolution itself: interpreter
    /// search-path extension only matters at script-generation time, where
    /// [`Self::generate_scripts`] already takes its own `extra_paths`.
    #[allow(clippy::too_many_arguments)]
    #[instrument(skip(self, specs, working_set), fields(dest = %dest.display()))]
    pub fn install(
        &mut self,
        specs: Vec<Requirement>,
        dest: &Path,
        links: Vec<PathBuf>,
        index: Option<&str>,
        executable: &Path,
        always_unzip: bool,
        extra_search_paths: &[PathBuf],
        working_set: WorkingSet,
        newest: bool,
        versions: VersionPinMap,
        use_dependency_links: bool,
        include_site_packages: bool,
        allowed_eggs_from_site_packages: GlobSet,
        allow_hosts: Vec<String>,
    ) -> Result<WorkingSet, Error> {
        let _ = extra_search_paths;
        if let Some(url) = index {
            if !distil_client::HostAllowList::new(allow_hosts).permits(url) {
                return Err(distil_client::ClientError::UrlNotAllowed(url.to_string()).into());
            }
        }

        let interpreter = self.interpreter(executable)?;
        let resolved_executable = interpreter.executable().to_path_buf();
        let client = self.client_for(&resolved_executable, index, &links)?;

        let cache = match &self.config.download_cache {
            Some(root) => Some(DownloadCache::new(root)?),
            None => None,
        };

        let resolver_config = ResolverConfigBuilder::new()
            .prefer_final(self.config.prefer_final)
            .newest(newest)
            .include_site_packages(include_site_packages)
            .allowed_eggs_from_site_packages(allowed_eggs_from_site_packages)
            .use_dependency_links(use_dependency_links)
            .allow_picked_versions(self.config.allow_picked_versions)
            .always_unzip(always_unzip)
            .build();

        let mut resolver = Resolver::new(
            resolver_config,
            self.merged_pins(&versions),
            Box::new(client),
            interpreter,
            dest.to_path_buf(),
            cache,
            None,
            WarningSink::new(),
        )?;

        let resolved = resolver.resolve(specs, working_set)?;
        self.warnings.extend(resolver.warnings().messages());
        Ok(resolved)
    }

    /// Run the external build tool against `source_dir`, returning the binary archive
    /// paths it produced under `dist_dir` (spec §6 `build`).
    #[instrument(skip(self, build_ext))]
    pub fn build(
        &self,
        source_dir: &Path,
        dist_dir: &Path,
        executable: &Path,
        build_ext: &BuildExtConfig,
        packaging_support_path: Option<&Path>,
    ) -> Result<Vec<PathBuf>, Error> {
        let interpreter = self.interpreter(executable)?;
        Ok(distil_build::build(
            source_dir,
            dist_dir,
            &interpreter,
            packaging_support_path,
            build_ext,
        )?)
    }

    /// Link a source checkout at `setup` into `dest` without copying it, returning
    /// the path of the `.egg-link` now living there (spec §6 `develop`).
    #[instrument(skip(self, build_ext))]
    pub fn develop(
        &self,
        setup: &Path,
        dest: &Path,
        build_ext: Option<&DevelopBuildExtOptions>,
        executable: &Path,
        packaging_support_path: Option<&Path>,
        verbose: bool,
    ) -> Result<PathBuf, Error> {
        let interpreter = self.interpreter(executable)?;
        let installer = DevelopInstaller {
            dest,
            interpreter: &interpreter,
            packaging_support_path,
            verbose,
        };

        if let Some(options) = build_ext {
            let directory = if setup.is_dir() {
                setup
            } else {
                setup.parent().unwrap_or(setup)
            };
            let mut finalizer = distil_fs::Finalizer::new();
            installer.with_build_ext(directory, options, &mut finalizer)?;
            let result = installer.develop(setup);
            finalizer.run();
            Ok(result?)
        } else {
            Ok(installer.develop(setup)?)
        }
    }

    /// Generate classic-mode (Mode A) launcher scripts for `projects`' console entry
    /// points against `working_set` (spec §4.7).
    #[allow(clippy::too_many_arguments)]
    pub fn generate_scripts(
        &self,
        working_set: &WorkingSet,
        projects: &[distil_normalize::ProjectKey],
        extras: &BTreeSet<String>,
        extra_paths: &[PathBuf],
        dest: &Path,
        executable: &Path,
        config: &ClassicConfig,
        rename: Option<&HashMap<String, String>>,
    ) -> Result<Vec<PathBuf>, Error> {
        Ok(distil_script::generate_classic_scripts(
            working_set,
            projects,
            extras,
            extra_paths,
            dest,
            executable,
            config,
            rename,
        )?)
    }

    /// Generate site-safe-mode (Mode B) launcher scripts: a rewritten `site` module
    /// plus launchers that disable the interpreter's own site initialization (spec
    /// §4.7 "Mode B").
    #[allow(clippy::too_many_arguments)]
    pub fn generate_site_safe_scripts(
        &self,
        working_set: &WorkingSet,
        projects: &[distil_normalize::ProjectKey],
        extras: &BTreeSet<String>,
        extra_paths: &[PathBuf],
        dest: &Path,
        executable: &Path,
        config: &SiteSafeConfig,
        rename: Option<&HashMap<String, String>>,
        interpreter_script_name: Option<&str>,
    ) -> Result<Vec<PathBuf>, Error> {
        let interpreter = self.interpreter(executable)?;
        Ok(distil_script::generate_site_safe(
            working_set,
            projects,
            extras,
            extra_paths,
            dest,
            executable,
            &interpreter,
            config,
            rename,
            interpreter_script_name,
        )?)
    }
}
