use rustc_hash::FxHashMap;

use distil_normalize::ProjectKey;
use distil_requirement::Requirement;

use crate::Distribution;

/// An ordered mapping `project-key -> Distribution`, with at most one entry per key.
///
/// Insertion order is preserved independently of the hash map used for key lookup, so
/// that the working set can be replayed or displayed in the order distributions were
/// added (invariant: "the working set preserves insertion order", spec §5).
#[derive(Debug, Default, Clone)]
pub struct WorkingSet {
    by_key: FxHashMap<ProjectKey, usize>,
    entries: Vec<Distribution>,
}

impl WorkingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the distribution currently selected for `project`, if any.
    pub fn get(&self, project: &ProjectKey) -> Option<&Distribution> {
        self.by_key.get(project).map(|&i| &self.entries[i])
    }

    pub fn contains(&self, project: &ProjectKey) -> bool {
        self.by_key.contains_key(project)
    }

    /// Insert or replace the distribution for its project key.
    ///
    /// Replacing an existing entry keeps it at its original position in insertion
    /// order, matching the working set's "at most one entry per key" invariant without
    /// disturbing the order already established for every other entry.
    pub fn add(&mut self, distribution: Distribution) {
        match self.by_key.get(&distribution.project).copied() {
            Some(index) => self.entries[index] = distribution,
            None => {
                self.by_key
                    .insert(distribution.project.clone(), self.entries.len());
                self.entries.push(distribution);
            }
        }
    }

    /// Does any already-selected distribution conflict with `requirement`? A conflict
    /// is an entry for the same project key that does not satisfy the requirement.
    pub fn conflicts_with(&self, requirement: &Requirement) -> bool {
        self.get(&requirement.project)
            .is_some_and(|dist| !dist.satisfies(requirement))
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Distribution> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a WorkingSet {
    type Item = &'a Distribution;
    type IntoIter = std::slice::Iter<'a, Distribution>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
