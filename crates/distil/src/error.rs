use distil_build::BuildError;
use distil_cache::CacheError;
use distil_client::ClientError;
use distil_distribution::DistributionError;
use distil_installer::InstallerError;
use distil_interpreter::ProbeError;
use distil_requirement::RequirementError;
use distil_resolver::ResolverError;
use distil_script::ScriptError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Probe(#[from] ProbeError),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Resolver(#[from] ResolverError),
    #[error(transparent)]
    Script(#[from] ScriptError),
    #[error(transparent)]
    Installer(#[from] InstallerError),
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Requirement(#[from] RequirementError),
    #[error(transparent)]
    Distribution(#[from] DistributionError),
    #[error("install_from_cache is enabled but no download_cache directory is configured")]
    MissingDownloadCache,
}
