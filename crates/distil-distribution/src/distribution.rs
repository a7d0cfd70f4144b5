use std::collections::BTreeSet;
use std::sync::Arc;

use distil_normalize::ProjectKey;
use distil_requirement::Requirement;
use distil_version::Version;

use crate::metadata::requires_from_metadata;
use crate::{DistMetadata, Location, Precedence};

/// `(project-key, version, location, precedence, metadata)`, per spec §3.
#[derive(Clone, Debug)]
pub struct Distribution {
    pub project: ProjectKey,
    pub version: Version,
    pub location: Location,
    pub precedence: Precedence,
    pub metadata: Arc<dyn DistMetadata + Send + Sync>,
}

impl Distribution {
    pub fn new(
        project: impl Into<ProjectKey>,
        version: Version,
        location: Location,
        precedence: Precedence,
        metadata: Arc<dyn DistMetadata + Send + Sync>,
    ) -> Self {
        Self {
            project: project.into(),
            version,
            location,
            precedence,
            metadata,
        }
    }

    /// The requirements this distribution declares for the given set of active
    /// extras, parsed from its `requires.txt`-format metadata.
    pub fn requires(&self, extras: &BTreeSet<String>) -> Vec<Requirement> {
        if !self.metadata.has_metadata("requires.txt") {
            return Vec::new();
        }
        requires_from_metadata(&self.metadata.get_metadata_lines("requires.txt"), extras)
    }

    /// Does this distribution declare a namespace package (spec §4.4.5)?
    pub fn declares_namespace_packages(&self) -> bool {
        self.metadata.has_metadata("namespace_packages.txt")
    }

    /// Does this distribution declare a dependency on the named project, ignoring
    /// version constraints? Used by the auto-add heuristic to check for an existing
    /// dependency on the packaging-support distribution.
    pub fn requires_project(&self, project: &ProjectKey) -> bool {
        self.requires(&BTreeSet::new())
            .iter()
            .any(|r| &r.project == project)
    }

    /// The `dependency_links.txt` entries this distribution advertises, if any
    /// (spec §4.4.2 step 7).
    pub fn dependency_links(&self) -> Vec<String> {
        if !self.metadata.has_metadata("dependency_links.txt") {
            return Vec::new();
        }
        self.metadata
            .get_metadata_lines("dependency_links.txt")
            .into_iter()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect()
    }

    /// Does this distribution satisfy `requirement`?
    pub fn satisfies(&self, requirement: &Requirement) -> bool {
        self.project == requirement.project && requirement.constraint.contains(&self.version)
    }
}
