use rustc_hash::FxHashMap;

use distil_normalize::ProjectKey;
use distil_requirement::Requirement;
use distil_version::Version;

/// A `project-key -> exact Version` mapping consulted by the resolver to narrow
/// requirements to a single pinned version before acquisition (spec §3, §4.4.2).
#[derive(Debug, Default, Clone)]
pub struct VersionPinMap {
    pins: FxHashMap<ProjectKey, Version>,
}

impl VersionPinMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pins(pins: impl IntoIterator<Item = (ProjectKey, Version)>) -> Self {
        Self {
            pins: pins.into_iter().collect(),
        }
    }

    pub fn set(&mut self, project: impl Into<ProjectKey>, version: Version) {
        self.pins.insert(project.into(), version);
    }

    pub fn get(&self, project: &ProjectKey) -> Option<&Version> {
        self.pins.get(project)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ProjectKey, &Version)> {
        self.pins.iter()
    }

    /// Narrow `requirement` to its pinned version, preserving extras, if a pin exists
    /// and it satisfies the requirement's existing constraint.
    ///
    /// Returns `None` both when there is no pin for this project, and when a pin
    /// exists but conflicts with the requirement's constraint (the caller reports
    /// that as a version conflict rather than silently ignoring the pin).
    pub fn constrain(&self, requirement: &Requirement) -> Option<Requirement> {
        let pin = self.pins.get(&requirement.project)?;
        requirement.constrained_to(pin)
    }

    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pins.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unpinned_project_is_left_unconstrained() {
        let pins = VersionPinMap::new();
        let req: Requirement = "demo".parse().unwrap();
        assert!(pins.constrain(&req).is_none());
    }

    #[test]
    fn pin_within_constraint_narrows_requirement() {
        let mut pins = VersionPinMap::new();
        pins.set("demo", Version::parse("1.5").unwrap());
        let req: Requirement = "demo>=1.0,<2.0".parse().unwrap();
        let constrained = pins.constrain(&req).unwrap();
        assert_eq!(constrained.constraint.as_exact().unwrap().as_str(), "1.5");
        assert_eq!(constrained.project.as_str(), "demo");
    }

    #[test]
    fn pin_outside_constraint_yields_no_requirement() {
        let mut pins = VersionPinMap::new();
        pins.set("demo", Version::parse("3.0").unwrap());
        let req: Requirement = "demo>=1.0,<2.0".parse().unwrap();
        assert!(pins.constrain(&req).is_none());
    }

    #[test]
    fn pin_preserves_extras() {
        let mut pins = VersionPinMap::new();
        pins.set("demo", Version::parse("1.0").unwrap());
        let req: Requirement = "demo[tests]".parse().unwrap();
        let constrained = pins.constrain(&req).unwrap();
        assert!(constrained.extras.contains("tests"));
    }
}
