use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("entry point value is not of the form 'module:attrs[extras]': {0}")]
    InvalidEntryPoint(String),
    #[error("entry_points.txt is invalid: {0}")]
    InvalidEntryPointsFile(String),
    #[error("no distribution for project {project} is present in the working set")]
    MissingDistribution { project: String },
    #[error("could not locate the real 'site' module for {0}")]
    SiteModuleNotFound(PathBuf),
    #[error("failed to rewrite site.py: the addsitepackages marker was not found")]
    SiteRewriteFailed,
    #[error(transparent)]
    Probe(#[from] distil_interpreter::ProbeError),
}
