//! Requirements: `(project-key, extras-set, version-constraint)` triples.
//!
//! A [`Requirement`] is the unit the resolver works over. Two requirements with the
//! same canonical form — the same normalized project key, the same extras, and an
//! equivalent version constraint — are interchangeable in resolution, per the data
//! model's invariant.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use distil_normalize::ProjectKey;
use distil_version::{Version, VersionError};

#[derive(Debug, thiserror::Error)]
pub enum RequirementError {
    #[error("invalid requirement: {0}")]
    Malformed(String),
    #[error(transparent)]
    Version(#[from] VersionError),
}

/// One of the six PEP 440-style comparison operators this crate supports.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Operator {
    Equal,
    NotEqual,
    LessThan,
    LessThanEqual,
    GreaterThan,
    GreaterThanEqual,
}

impl Operator {
    fn as_str(self) -> &'static str {
        match self {
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::LessThan => "<",
            Self::LessThanEqual => "<=",
            Self::GreaterThan => ">",
            Self::GreaterThanEqual => ">=",
        }
    }

    fn matches(self, candidate: &Version, pin: &Version) -> bool {
        match self {
            Self::Equal => candidate == pin,
            Self::NotEqual => candidate != pin,
            Self::LessThan => candidate < pin,
            Self::LessThanEqual => candidate <= pin,
            Self::GreaterThan => candidate > pin,
            Self::GreaterThanEqual => candidate >= pin,
        }
    }
}

/// A single comparison: an operator paired with the version it compares against.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VersionSpecifier {
    pub operator: Operator,
    pub version: Version,
}

impl fmt::Display for VersionSpecifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.operator.as_str(), self.version)
    }
}

/// A conjunction of [`VersionSpecifier`]s. An empty constraint matches every version.
#[derive(Debug, Clone, Default, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VersionConstraint(Vec<VersionSpecifier>);

impl VersionConstraint {
    pub fn any() -> Self {
        Self(Vec::new())
    }

    pub fn new(mut specifiers: Vec<VersionSpecifier>) -> Self {
        // Canonical form: sorted by operator then version so that structurally
        // equivalent constraints compare equal regardless of declaration order.
        specifiers.sort_by(|a, b| a.operator.cmp(&b.operator).then(a.version.cmp(&b.version)));
        Self(specifiers)
    }

    pub fn specifiers(&self) -> &[VersionSpecifier] {
        &self.0
    }

    pub fn contains(&self, version: &Version) -> bool {
        self.0.iter().all(|spec| spec.operator.matches(version, &spec.version))
    }

    /// If this constraint is a single `==` pin, return the pinned version.
    pub fn as_exact(&self) -> Option<&Version> {
        match self.0.as_slice() {
            [spec] if spec.operator == Operator::Equal => Some(&spec.version),
            _ => None,
        }
    }

    /// Constrain this constraint to an exact pinned version, as the resolver's pin map
    /// does in step 1 of the satisfaction check (spec §4.4.1). Fails if `pin` does not
    /// already satisfy the existing constraint.
    pub fn pin(&self, pin: &Version) -> Option<Self> {
        if !self.contains(pin) {
            return None;
        }
        Some(Self(vec![VersionSpecifier {
            operator: Operator::Equal,
            version: pin.clone(),
        }]))
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "{}", rendered.join(","))
    }
}

/// `(project-key, extras-set, version-constraint)`.
///
/// Equality is structural over the canonical form: two requirements with the same
/// project key, the same extras, and an equivalent constraint are the same requirement.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Requirement {
    pub project: ProjectKey,
    pub extras: BTreeSet<String>,
    pub constraint: VersionConstraint,
}

impl Requirement {
    pub fn new(
        project: impl Into<ProjectKey>,
        extras: impl IntoIterator<Item = String>,
        constraint: VersionConstraint,
    ) -> Self {
        Self {
            project: project.into(),
            extras: extras.into_iter().collect(),
            constraint,
        }
    }

    /// A bare requirement on a project with no extras and no constraint.
    pub fn unconstrained(project: impl Into<ProjectKey>) -> Self {
        Self::new(project, [], VersionConstraint::any())
    }

    /// Return a copy of this requirement constrained to `pin`, preserving extras, as
    /// used by the resolver's pin-map constraint step.
    pub fn constrained_to(&self, pin: &Version) -> Option<Self> {
        Some(Self {
            project: self.project.clone(),
            extras: self.extras.clone(),
            constraint: self.constraint.pin(pin)?,
        })
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.project)?;
        if !self.extras.is_empty() {
            write!(f, "[{}]", self.extras.iter().cloned().collect::<Vec<_>>().join(","))?;
        }
        if !self.constraint.specifiers().is_empty() {
            write!(f, "{}", self.constraint)?;
        }
        Ok(())
    }
}

/// Parse a requirement string of the form `project[extra1,extra2]>=1.0,<2.0`.
impl FromStr for Requirement {
    type Err = RequirementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(RequirementError::Malformed("empty requirement".to_string()));
        }

        let name_end = s
            .find(|c: char| !(c.is_alphanumeric() || matches!(c, '-' | '_' | '.')))
            .unwrap_or(s.len());
        if name_end == 0 {
            return Err(RequirementError::Malformed(format!(
                "missing project name in '{s}'"
            )));
        }
        let (name, mut rest) = s.split_at(name_end);

        let mut extras = BTreeSet::new();
        rest = rest.trim_start();
        if let Some(stripped) = rest.strip_prefix('[') {
            let Some(end) = stripped.find(']') else {
                return Err(RequirementError::Malformed(format!(
                    "unterminated extras list in '{s}'"
                )));
            };
            let (extras_str, after) = stripped.split_at(end);
            for extra in extras_str.split(',') {
                let extra = extra.trim();
                if !extra.is_empty() {
                    extras.insert(extra.to_string());
                }
            }
            rest = &after[1..];
        }

        let rest = rest.trim();
        let specifiers = if rest.is_empty() {
            Vec::new()
        } else {
            parse_specifiers(rest)?
        };

        Ok(Self {
            project: ProjectKey::new(name),
            extras,
            constraint: VersionConstraint::new(specifiers),
        })
    }
}

fn parse_specifiers(s: &str) -> Result<Vec<VersionSpecifier>, RequirementError> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(parse_specifier)
        .collect()
}

fn parse_specifier(part: &str) -> Result<VersionSpecifier, RequirementError> {
    const OPERATORS: &[(&str, Operator)] = &[
        ("==", Operator::Equal),
        ("!=", Operator::NotEqual),
        ("<=", Operator::LessThanEqual),
        (">=", Operator::GreaterThanEqual),
        ("<", Operator::LessThan),
        (">", Operator::GreaterThan),
    ];
    for (token, operator) in OPERATORS {
        if let Some(version_str) = part.strip_prefix(token) {
            let version = Version::parse(version_str.trim())?;
            return Ok(VersionSpecifier { operator: *operator, version });
        }
    }
    Err(RequirementError::Malformed(format!(
        "unrecognized comparison operator in '{part}'"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_requirement() {
        let req: Requirement = "demo".parse().unwrap();
        assert_eq!(req.project.as_str(), "demo");
        assert!(req.extras.is_empty());
        assert!(req.constraint.specifiers().is_empty());
    }

    #[test]
    fn parses_extras_and_constraint() {
        let req: Requirement = "Demo[foo, bar]>=1.0,<2.0".parse().unwrap();
        assert_eq!(req.project.as_str(), "demo");
        assert_eq!(req.extras, BTreeSet::from(["foo".to_string(), "bar".to_string()]));
        assert_eq!(req.constraint.specifiers().len(), 2);
    }

    #[test]
    fn canonical_form_is_interchangeable() {
        let a: Requirement = "demo==0.3".parse().unwrap();
        let b: Requirement = "Demo == 0.3".parse().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn constraint_matches_versions() {
        let req: Requirement = "demo>=1.0,<2.0".parse().unwrap();
        assert!(req.constraint.contains(&Version::parse("1.5").unwrap()));
        assert!(!req.constraint.contains(&Version::parse("2.0").unwrap()));
        assert!(!req.constraint.contains(&Version::parse("0.9").unwrap()));
    }

    #[test]
    fn pin_outside_constraint_fails() {
        let req: Requirement = "demo>=1.0".parse().unwrap();
        let pin = Version::parse("0.5").unwrap();
        assert!(req.constrained_to(&pin).is_none());
    }

    #[test]
    fn pin_within_constraint_narrows_to_exact() {
        let req: Requirement = "demo>=1.0,<2.0".parse().unwrap();
        let pin = Version::parse("1.5").unwrap();
        let constrained = req.constrained_to(&pin).unwrap();
        assert_eq!(constrained.constraint.as_exact(), Some(&pin));
        assert_eq!(constrained.extras, req.extras);
    }
}
