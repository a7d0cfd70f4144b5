use distil_normalize::ProjectKey;
use distil_version::Version;

/// Errors raised while reasoning about the shared distribution data model.
#[derive(Debug, thiserror::Error)]
pub enum DistributionError {
    /// The working set already has a distribution for this project, and it does not
    /// satisfy a later requirement for the same project.
    #[error("version conflict for {project}: already have {existing}, which does not satisfy the new requirement")]
    VersionConflict {
        project: ProjectKey,
        existing: Version,
    },
}
