//! A structured, totally ordered version token sequence.
//!
//! `Version` reimplements the classic `pkg_resources`-style version parsing: a version
//! string is split into alternating numeric and alphabetic runs, numeric runs are
//! zero-padded so they compare correctly as strings, and non-numeric runs are prefixed
//! with `*` so that, by plain lexicographic tuple comparison, pre-release markers sort
//! before the numeric parts that follow them. A trailing `*final` sentinel is appended
//! to every version so that e.g. `1.0` (which becomes `..., *final`) sorts after
//! `1.0a1` (`..., *a, 00000001, *final`).
//!
//! This is a deliberately pre-PEP-440 scheme: it is the version algorithm the
//! buildout/easy_install family of tools used, and it is what this crate's data model
//! (spec §3) describes: "a version is final iff none of its non-sentinel tokens begins
//! with `*` other than the two sentinels `*final` and `*final-`".

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

const FINAL: &str = "*final";
const FINAL_DASH: &str = "*final-";

/// A single parsed version token: either a zero-padded numeric run, or an alphabetic
/// run prefixed with `*`.
type Token = String;

/// A structured, totally ordered version.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Version {
    raw: String,
    tokens: Vec<Token>,
}

#[derive(Debug, thiserror::Error)]
pub enum VersionError {
    #[error("empty version string")]
    Empty,
}

impl Version {
    /// Parse a version string into its canonical token sequence.
    pub fn parse(raw: &str) -> Result<Self, VersionError> {
        if raw.trim().is_empty() {
            return Err(VersionError::Empty);
        }
        Ok(Self {
            raw: raw.to_string(),
            tokens: tokenize(raw),
        })
    }

    /// The original, unparsed version string.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// A version is final iff none of its non-sentinel tokens begins with `*` other
    /// than the two sentinels `*final` and `*final-`.
    pub fn is_final(&self) -> bool {
        !self
            .tokens
            .iter()
            .any(|t| t.starts_with('*') && t != FINAL && t != FINAL_DASH)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.tokens.cmp(&other.tokens)
    }
}

/// Tags that are synonyms for a well known pre/post-release marker.
fn replace_part(part: &str) -> String {
    match part {
        "pre" | "preview" => "c".to_string(),
        "-" => "final-".to_string(),
        "rc" => "c".to_string(),
        "dev" => "@".to_string(),
        other => other.to_string(),
    }
}

fn tokenize(raw: &str) -> Vec<Token> {
    let lowered = raw.to_ascii_lowercase();
    let parts = split_components(&lowered);

    let mut tokens: Vec<Token> = Vec::new();
    for part in parts {
        let part = replace_part(&part);
        if part.is_empty() || part == "." {
            continue;
        }
        let token = if part.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            format!("{part:0>8}")
        } else {
            format!("*{part}")
        };

        if token.starts_with('*') && token.as_str() < FINAL {
            // A pre-release tag: drop a preceding "post release" separator, it doesn't
            // apply across a pre-release boundary.
            while tokens.last().map(String::as_str) == Some(FINAL_DASH) {
                tokens.pop();
            }
        }
        // Trailing zero components within a numeric run don't affect ordering once a
        // new component starts; drop them so `1.0` and `1.0.0` compare equal.
        while tokens.last().map(String::as_str) == Some("00000000") {
            tokens.pop();
        }
        tokens.push(token);
    }
    tokens.push(FINAL.to_string());
    tokens
}

/// Split a lowercased version string into alternating digit runs, alpha runs, and the
/// `.`/`-` separators, discarding any other punctuation.
fn split_components(s: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut chars = s.chars().peekable();
    let mut current = String::new();
    let mut current_kind: Option<Kind> = None;

    #[derive(PartialEq, Eq, Clone, Copy)]
    enum Kind {
        Digit,
        Alpha,
    }

    while let Some(&c) = chars.peek() {
        if c == '.' || c == '-' {
            if !current.is_empty() {
                parts.push(std::mem::take(&mut current));
                current_kind = None;
            }
            parts.push(c.to_string());
            chars.next();
            continue;
        }
        let kind = if c.is_ascii_digit() {
            Kind::Digit
        } else if c.is_ascii_alphabetic() {
            Kind::Alpha
        } else {
            // Skip stray punctuation entirely (mirrors the original regex, which only
            // recognizes digits, letters, `.` and `-`).
            chars.next();
            continue;
        };
        if current_kind.is_some() && current_kind != Some(kind) {
            parts.push(std::mem::take(&mut current));
        }
        current_kind = Some(kind);
        current.push(c);
        chars.next();
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}
