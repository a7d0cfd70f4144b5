//! Project-key normalization.
//!
//! A distribution's name is an arbitrary human-chosen string, but for resolution
//! purposes two spellings of the same project must compare equal. [`ProjectKey`]
//! canonicalizes a raw name by lowercasing it and collapsing runs of `-`, `_` and `.`
//! into a single `-`, mirroring the normalization rule distribution indexes use for
//! project identifiers.

use std::fmt;
use std::str::FromStr;

/// A canonicalized, comparable project identifier.
///
/// Two [`ProjectKey`]s compare equal if and only if their canonical forms are equal,
/// regardless of the punctuation or casing of the strings they were built from.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProjectKey(String);

impl ProjectKey {
    /// Normalize a raw project name into its canonical key.
    ///
    /// The canonical form is lowercase ASCII with every maximal run of `-`, `_`, or `.`
    /// replaced by a single `-`.
    pub fn new(raw: impl AsRef<str>) -> Self {
        let raw = raw.as_ref();
        let mut canonical = String::with_capacity(raw.len());
        let mut last_was_separator = false;
        for ch in raw.chars() {
            if matches!(ch, '-' | '_' | '.') {
                if !last_was_separator && !canonical.is_empty() {
                    canonical.push('-');
                }
                last_was_separator = true;
            } else {
                canonical.push(ch.to_ascii_lowercase());
                last_was_separator = false;
            }
        }
        // Drop a trailing separator produced by trailing punctuation in the input.
        if canonical.ends_with('-') {
            canonical.pop();
        }
        Self(canonical)
    }

    /// Return the canonical form as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume this key, returning the canonical form.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ProjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ProjectKey {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl AsRef<str> for ProjectKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ProjectKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ProjectKey {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&String> for ProjectKey {
    fn from(value: &String) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_folding() {
        assert_eq!(ProjectKey::new("Demo"), ProjectKey::new("demo"));
    }

    #[test]
    fn punctuation_canonicalization() {
        assert_eq!(ProjectKey::new("Foo_Bar.Baz"), ProjectKey::new("foo-bar-baz"));
        assert_eq!(ProjectKey::new("foo--bar"), ProjectKey::new("foo-bar"));
        assert_eq!(ProjectKey::new("foo...bar"), ProjectKey::new("foo-bar"));
    }

    #[test]
    fn interchangeable_requirement_keys() {
        // Two requirements written differently but referring to the same project must
        // canonicalize to the same key, per the spec's equivalence invariant.
        let a = ProjectKey::new("zc.buildout");
        let b = ProjectKey::new("zc-buildout");
        let c = ProjectKey::new("ZC_Buildout");
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn trailing_punctuation_is_trimmed() {
        assert_eq!(ProjectKey::new("demo-").as_str(), "demo");
    }
}
