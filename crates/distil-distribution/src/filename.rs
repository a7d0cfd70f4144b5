//! Parsing the classic `{project}-{version}[-pyX.Y[-platform]]` filename convention
//! shared by find-links artifacts and `eggs-dir` entries.

use distil_normalize::ProjectKey;
use distil_version::{Version, VersionError};

/// Strip a trailing `-pyX.Y` (optionally followed by `-platform`) tag, then split the
/// remaining `{project}-{version}` stem at the first token that looks like the start
/// of a version (a token beginning with an ASCII digit).
pub fn parse_versioned_stem(stem: &str) -> Result<(ProjectKey, Version), VersionError> {
    let stem = match stem.find("-py") {
        Some(index) => &stem[..index],
        None => stem,
    };

    let parts: Vec<&str> = stem.split('-').collect();
    let version_index = parts
        .iter()
        .position(|part| part.chars().next().is_some_and(|c| c.is_ascii_digit()))
        .unwrap_or(parts.len().saturating_sub(1).max(1));

    let project = ProjectKey::new(parts[..version_index].join("-"));
    let version = Version::parse(&parts[version_index..].join("-"))?;
    Ok((project, version))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_project_and_version() {
        let (project, version) = parse_versioned_stem("Demo-1.2.3-py3.11").unwrap();
        assert_eq!(project.as_str(), "demo");
        assert_eq!(version.as_str(), "1.2.3");
    }

    #[test]
    fn handles_hyphenated_project_names() {
        let (project, version) = parse_versioned_stem("my-demo-pkg-0.9").unwrap();
        assert_eq!(project.as_str(), "my-demo-pkg");
        assert_eq!(version.as_str(), "0.9");
    }
}
