//! Non-fatal resolution and installation warnings.
//!
//! These mirror the warning taxonomy in spec §7: none of them abort resolution, but
//! all of them are worth surfacing to whoever is driving the installer. Core crates
//! never print directly — warnings are pushed onto a [`WarningSink`] and the caller
//! (the out-of-scope recipe/orchestration wrapper) decides how to render them.

use std::fmt;
use std::sync::Mutex;

use tracing::debug;

/// A single non-fatal condition encountered during resolution or installation.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Warning {
    /// A single source build produced more than one binary archive.
    MultipleBuildOutputs { requested: String, count: usize },
    /// A build's output project name or version didn't match what was requested.
    BuildOutputMismatch {
        requested: String,
        produced_name: String,
        produced_version: String,
    },
    /// A develop-installed distribution declares namespace packages but not a
    /// dependency on the packaging-support distribution.
    DevelopMissingPackagingSupport { project: String },
    /// A version was picked (no exact pin available) but picked versions are allowed.
    PickedVersion { project: String, version: String },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MultipleBuildOutputs { requested, count } => write!(
                f,
                "building {requested} produced {count} distributions; using the first"
            ),
            Self::BuildOutputMismatch {
                requested,
                produced_name,
                produced_version,
            } => write!(
                f,
                "building {requested} produced {produced_name}-{produced_version}, which does not match the request"
            ),
            Self::DevelopMissingPackagingSupport { project } => write!(
                f,
                "{project} declares namespace packages but is develop-installed without a dependency on the packaging-support distribution"
            ),
            Self::PickedVersion { project, version } => {
                write!(f, "picked {project} {version} (no exact pin was available)")
            }
        }
    }
}

/// A process-local collector of [`Warning`]s, deduplicated by their rendered message.
///
/// This replaces ad hoc logging calls scattered through the resolver: every warning
/// path in spec §4.4.6/§7 pushes here, and the caller drains it once resolution
/// finishes.
#[derive(Default)]
pub struct WarningSink {
    seen: Mutex<Vec<String>>,
}

impl WarningSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning, skipping it if an identical message was already recorded.
    pub fn push(&self, warning: Warning) {
        let message = warning.to_string();
        let mut seen = self.seen.lock().unwrap();
        if seen.iter().any(|existing| existing == &message) {
            return;
        }
        debug!(%message, "warning");
        seen.push(message);
    }

    /// Return every distinct warning message recorded so far, in the order first seen.
    pub fn messages(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.lock().unwrap().is_empty()
    }
}
