use rustc_hash::FxHashMap;

use distil_normalize::ProjectKey;
use distil_requirement::Requirement;

use crate::{Distribution, DistributionError, WorkingSet};

/// A mapping `project-key -> sorted sequence<Distribution>`, sorted by
/// `(version DESC, precedence DESC)`, built from a path list and an interpreter
/// version tag (spec §3, §4.3).
#[derive(Debug, Default, Clone)]
pub struct Environment {
    interpreter_version: String,
    by_project: FxHashMap<ProjectKey, Vec<Distribution>>,
}

impl Environment {
    /// Build an environment from a set of distributions discovered on a path list.
    /// Scanning the filesystem into `Distribution`s is the caller's job (it requires
    /// the archive/metadata machinery this crate intentionally doesn't depend on);
    /// this constructor only establishes the sorted, project-keyed index.
    pub fn from_distributions(
        interpreter_version: impl Into<String>,
        distributions: impl IntoIterator<Item = Distribution>,
    ) -> Self {
        let mut by_project: FxHashMap<ProjectKey, Vec<Distribution>> = FxHashMap::default();
        for dist in distributions {
            by_project.entry(dist.project.clone()).or_default().push(dist);
        }
        for group in by_project.values_mut() {
            group.sort_by(|a, b| {
                b.version
                    .cmp(&a.version)
                    .then(b.precedence.cmp(&a.precedence))
            });
        }
        Self {
            interpreter_version: interpreter_version.into(),
            by_project,
        }
    }

    pub fn interpreter_version(&self) -> &str {
        &self.interpreter_version
    }

    /// Every known distribution for a project, best-to-worst.
    pub fn candidates(&self, project: &ProjectKey) -> &[Distribution] {
        self.by_project.get(project).map_or(&[], Vec::as_slice)
    }

    /// The highest-version distribution satisfying `requirement` that does not
    /// conflict with any entry already in `working_set`.
    ///
    /// If `working_set` already has an entry for this project, that entry is
    /// authoritative: it is returned if it satisfies the requirement, otherwise this
    /// raises [`DistributionError::VersionConflict`] rather than silently picking a
    /// different distribution for the same key.
    pub fn best_match(
        &self,
        requirement: &Requirement,
        working_set: &WorkingSet,
    ) -> Result<Option<Distribution>, DistributionError> {
        if let Some(existing) = working_set.get(&requirement.project) {
            return if existing.satisfies(requirement) {
                Ok(Some(existing.clone()))
            } else {
                Err(DistributionError::VersionConflict {
                    project: requirement.project.clone(),
                    existing: existing.version.clone(),
                })
            };
        }

        Ok(self
            .candidates(&requirement.project)
            .iter()
            .find(|dist| dist.satisfies(requirement))
            .cloned())
    }
}
