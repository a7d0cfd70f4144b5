use globset::GlobSet;

use distil_distribution::Distribution;
use distil_interpreter::InterpreterInfo;

/// The site-package policy (spec §4.4.4): a distribution whose location lies inside
/// one of the interpreter's site paths is filtered out of every candidate set unless
/// its project key matches the allow-list. Applies even when site paths are present
/// in the search path, since indirect link files may surface them.
#[derive(Debug, Clone)]
pub struct SiteFilter {
    include_site_packages: bool,
    allowed: GlobSet,
}

impl SiteFilter {
    pub fn new(include_site_packages: bool, allowed: GlobSet) -> Self {
        Self {
            include_site_packages,
            allowed,
        }
    }

    pub fn permits(&self, dist: &Distribution, interpreter: &InterpreterInfo) -> bool {
        let Some(path) = dist.location.path() else {
            return true;
        };
        let in_site_paths = interpreter
            .site_paths()
            .iter()
            .any(|site_path| path.starts_with(site_path));
        if !in_site_paths {
            return true;
        }
        self.include_site_packages && self.allowed.is_match(dist.project.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use distil_distribution::{DistMetadata, Location, Precedence};
    use distil_normalize::ProjectKey;
    use distil_version::Version;
    use globset::GlobSetBuilder;
    use std::path::PathBuf;
    use std::sync::Arc;

    #[derive(Debug, Default)]
    struct NoMetadata;
    impl DistMetadata for NoMetadata {
        fn has_metadata(&self, _name: &str) -> bool {
            false
        }
        fn get_metadata_lines(&self, _name: &str) -> Vec<String> {
            Vec::new()
        }
    }

    fn dist(project: &str, path: &str) -> Distribution {
        Distribution::new(
            ProjectKey::new(project),
            Version::parse("1.0").unwrap(),
            Location::Path(PathBuf::from(path)),
            Precedence::BinaryArchive,
            Arc::new(NoMetadata),
        )
    }

    #[test]
    fn permits_outside_site_paths_unconditionally() {
        let filter = SiteFilter::new(true, GlobSetBuilder::new().build().unwrap());
        let d = dist("demo", "/eggs/demo-1.0.egg");
        assert!(filter.permits(&d, &fake_interpreter(&["/site"])));
    }

    #[test]
    fn blocks_site_path_entries_not_on_allow_list() {
        let filter = SiteFilter::new(true, GlobSetBuilder::new().build().unwrap());
        let d = dist("demo", "/site/demo-1.0.egg");
        assert!(!filter.permits(&d, &fake_interpreter(&["/site"])));
    }

    #[test]
    fn allow_list_permits_matching_project() {
        let mut builder = GlobSetBuilder::new();
        builder.add(globset::Glob::new("demo").unwrap());
        let filter = SiteFilter::new(true, builder.build().unwrap());
        let d = dist("demo", "/site/demo-1.0.egg");
        assert!(filter.permits(&d, &fake_interpreter(&["/site"])));
    }

    #[test]
    fn disabled_policy_excludes_site_path_entries_by_default() {
        let filter = SiteFilter::new(false, GlobSetBuilder::new().build().unwrap());
        let d = dist("demo", "/site/demo-1.0.egg");
        assert!(!filter.permits(&d, &fake_interpreter(&["/site"])));
    }

    #[test]
    fn disabled_policy_still_permits_entries_outside_site_paths() {
        let filter = SiteFilter::new(false, GlobSetBuilder::new().build().unwrap());
        let d = dist("demo", "/eggs/demo-1.0.egg");
        assert!(filter.permits(&d, &fake_interpreter(&["/site"])));
    }

    fn fake_interpreter(site_paths: &[&str]) -> InterpreterInfo {
        InterpreterInfo::new(
            PathBuf::from("/usr/bin/python3"),
            distil_interpreter::PythonVersion { major: 3, minor: 11 },
            Vec::new(),
            site_paths.iter().map(PathBuf::from).collect(),
        )
    }
}
