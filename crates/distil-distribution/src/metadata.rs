//! The narrow metadata interface a [`crate::Distribution`] exposes.
//!
//! Per the design notes, duck-typed metadata access (`has_metadata`,
//! `get_metadata_lines`) becomes a trait with exactly those two operations — nothing
//! else about a distribution's on-disk metadata format leaks into the resolver.

use std::collections::BTreeSet;
use std::fmt::Debug;

use distil_requirement::Requirement;

/// Query interface over a distribution's metadata files (e.g. an `EGG-INFO`
/// directory): "does this named metadata file exist" and "what are its lines".
pub trait DistMetadata: Debug {
    /// Does a metadata file with this name exist for this distribution?
    fn has_metadata(&self, name: &str) -> bool;

    /// The (non-empty, trimmed) lines of the named metadata file, or an empty vector
    /// if it doesn't exist.
    fn get_metadata_lines(&self, name: &str) -> Vec<String>;
}

/// Parse a classic `requires.txt`-format dependency listing into the requirements
/// active for a given extras set.
///
/// The format lists unconditional requirements first, then zero or more
/// `[extra-name]` sections whose requirements only apply when that extra is
/// requested:
///
/// ```text
/// demoneeded>=1.0
///
/// [tests]
/// pytest>=7.0
/// ```
pub fn requires_from_metadata(lines: &[String], extras: &BTreeSet<String>) -> Vec<Requirement> {
    let mut active_section: Option<String> = None;
    let mut requirements = Vec::new();

    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(section) = line.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            active_section = Some(section.to_string());
            continue;
        }
        let applies = match &active_section {
            None => true,
            Some(section) => extras.contains(section),
        };
        if !applies {
            continue;
        }
        match line.parse::<Requirement>() {
            Ok(requirement) => requirements.push(requirement),
            Err(err) => {
                tracing::debug!(%line, %err, "skipping unparsable requirement line");
            }
        }
    }

    requirements
}
