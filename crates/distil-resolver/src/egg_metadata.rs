//! Reading `EGG-INFO`-style metadata back off a materialized distribution, so it can
//! be rescanned into the [`distil_distribution::Environment`] after acquisition
//! (spec §4.4.2 step 6). Grounded in the same "the metadata files are just named
//! text files in a directory" shape that `install-wheel-rs`'s `find_dist_info` reads
//! off a wheel's `.dist-info` directory, adapted to the classic `EGG-INFO` layout.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use distil_distribution::DistMetadata;

#[derive(Debug, Default)]
pub struct EggMetadata {
    files: HashMap<String, Vec<String>>,
}

impl EggMetadata {
    /// Read every file directly under `egg_info_dir` (an unpacked `EGG-INFO`
    /// directory, or an egg directory's own `EGG-INFO` subdirectory).
    pub fn from_directory(egg_info_dir: &Path) -> std::io::Result<Self> {
        let mut files = HashMap::new();
        if !egg_info_dir.is_dir() {
            return Ok(Self { files });
        }
        for entry in fs_err::read_dir(egg_info_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            let contents = fs_err::read_to_string(entry.path()).unwrap_or_default();
            files.insert(name, contents.lines().map(str::to_string).collect());
        }
        Ok(Self { files })
    }

    /// Read the `EGG-INFO/*` entries directly out of a zipped egg without
    /// extracting the rest of the archive.
    pub fn from_zip(path: &Path) -> Result<Self, std::io::Error> {
        let mut files = HashMap::new();
        let file = fs_err::File::open(path)?;
        let mut archive = match zip::ZipArchive::new(file) {
            Ok(archive) => archive,
            Err(_) => return Ok(Self { files }),
        };
        for index in 0..archive.len() {
            let mut entry = archive.by_index(index)?;
            let Some(name) = entry
                .name()
                .strip_prefix("EGG-INFO/")
                .filter(|rest| !rest.is_empty() && !rest.contains('/'))
            else {
                continue;
            };
            let mut contents = String::new();
            if entry.read_to_string(&mut contents).is_ok() {
                files.insert(name.to_string(), contents.lines().map(str::to_string).collect());
            }
        }
        Ok(Self { files })
    }
}

impl DistMetadata for EggMetadata {
    fn has_metadata(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    fn get_metadata_lines(&self, name: &str) -> Vec<String> {
        self.files.get(name).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_files_from_unpacked_directory() {
        let dir = tempfile::tempdir().unwrap();
        let egg_info = dir.path().join("EGG-INFO");
        std::fs::create_dir(&egg_info).unwrap();
        std::fs::write(egg_info.join("requires.txt"), "demoneeded>=1.0\n").unwrap();

        let metadata = EggMetadata::from_directory(&egg_info).unwrap();
        assert!(metadata.has_metadata("requires.txt"));
        assert_eq!(metadata.get_metadata_lines("requires.txt"), vec!["demoneeded>=1.0"]);
        assert!(!metadata.has_metadata("namespace_packages.txt"));
    }

    #[test]
    fn missing_directory_yields_empty_metadata() {
        let metadata = EggMetadata::from_directory(Path::new("/does/not/exist")).unwrap();
        assert!(!metadata.has_metadata("requires.txt"));
    }
}
