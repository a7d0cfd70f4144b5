//! Materializing a newly chosen candidate into `eggs-dir` (spec §4.4.2) and
//! rescanning the directory back into an [`Environment`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use distil_build::BuildExtConfig;
use distil_cache::{DownloadCache, ScratchDir};
use distil_client::IndexClient;
use distil_distribution::{parse_versioned_stem, Distribution, Environment, Location, Precedence};
use distil_interpreter::InterpreterInfo;
use distil_normalize::ProjectKey;
use distil_version::Version;
use distil_warnings::{Warning, WarningSink};

use crate::egg_metadata::EggMetadata;
use crate::ResolverError;

pub struct AcquisitionContext<'a> {
    pub eggs_dir: &'a Path,
    pub cache: Option<&'a DownloadCache>,
    pub client: &'a dyn IndexClient,
    pub interpreter: &'a InterpreterInfo,
    pub packaging_support_path: Option<&'a Path>,
    pub always_unzip: bool,
    pub warnings: &'a WarningSink,
}

fn egg_filename(project: &ProjectKey, version: &Version, tag: &str) -> String {
    format!("{project}-{version}-{tag}.egg")
}

/// Fetch and materialize `candidate` into `ctx.eggs_dir`, returning the real
/// Distribution reconstructed from the metadata the materialized artifact carries.
pub fn acquire(
    candidate: &Distribution,
    requested_project: &ProjectKey,
    ctx: &AcquisitionContext<'_>,
) -> Result<Distribution, ResolverError> {
    fs_err::create_dir_all(ctx.eggs_dir)?;
    let scratch = ScratchDir::acquire(ctx.cache)?;

    let downloaded = ctx.client.download(&candidate.location, scratch.path())?;

    let tag = ctx.interpreter.version().to_string();
    let tag = format!("py{tag}");

    let materialized = match candidate.precedence {
        Precedence::BinaryArchive => {
            materialize_binary_archive(&downloaded, candidate, ctx, &tag)?
        }
        Precedence::SourceArchive | Precedence::Checkout | Precedence::Develop => {
            materialize_from_build(&downloaded, candidate, requested_project, ctx, &tag)?
        }
    };

    Ok(materialized)
}

fn materialize_binary_archive(
    downloaded: &Path,
    candidate: &Distribution,
    ctx: &AcquisitionContext<'_>,
    tag: &str,
) -> Result<Distribution, ResolverError> {
    if downloaded.is_dir() {
        let dest = ctx
            .eggs_dir
            .join(egg_filename(&candidate.project, &candidate.version, tag));
        distil_extract::copy_recursive(downloaded, &dest)?;
        let metadata = EggMetadata::from_directory(&dest.join("EGG-INFO"))?;
        distil_extract::recompile_bytecode(&dest, ctx.interpreter)?;
        return Ok(Distribution::new(
            candidate.project.clone(),
            candidate.version.clone(),
            Location::Path(dest),
            Precedence::BinaryArchive,
            Arc::new(metadata),
        ));
    }

    let zip_metadata = EggMetadata::from_zip(downloaded)?;
    let declares_not_zip_safe = zip_metadata.has_metadata("not-zip-safe");
    let declares_zip_safe = zip_metadata.has_metadata("zip-safe");
    let unzip = distil_extract::should_unzip(declares_not_zip_safe, declares_zip_safe, ctx.always_unzip);

    if unzip {
        let dest = ctx
            .eggs_dir
            .join(egg_filename(&candidate.project, &candidate.version, tag));
        distil_extract::unpack(downloaded, &dest)?;
        let metadata = EggMetadata::from_directory(&dest.join("EGG-INFO"))?;
        distil_extract::recompile_bytecode(&dest, ctx.interpreter)?;
        Ok(Distribution::new(
            candidate.project.clone(),
            candidate.version.clone(),
            Location::Path(dest),
            Precedence::BinaryArchive,
            Arc::new(metadata),
        ))
    } else {
        let dest = ctx
            .eggs_dir
            .join(egg_filename(&candidate.project, &candidate.version, tag));
        fs_err::copy(downloaded, &dest)?;
        Ok(Distribution::new(
            candidate.project.clone(),
            candidate.version.clone(),
            Location::Path(dest),
            Precedence::BinaryArchive,
            Arc::new(zip_metadata),
        ))
    }
}

fn materialize_from_build(
    downloaded: &Path,
    candidate: &Distribution,
    requested_project: &ProjectKey,
    ctx: &AcquisitionContext<'_>,
    tag: &str,
) -> Result<Distribution, ResolverError> {
    let source_root = if downloaded.is_dir() {
        downloaded.to_path_buf()
    } else {
        let extracted = downloaded
            .parent()
            .unwrap_or(downloaded)
            .join(format!("{}-extracted", candidate.project));
        fs_err::create_dir_all(&extracted)?;
        distil_extract::unpack(downloaded, &extracted)?;
        first_subdirectory(&extracted)?
    };

    let dist_dir = source_root.join("distil-dist");
    let outputs = distil_build::build(
        &source_root,
        &dist_dir,
        ctx.interpreter,
        ctx.packaging_support_path,
        &BuildExtConfig::default(),
    )?;

    if outputs.len() > 1 {
        ctx.warnings.push(Warning::MultipleBuildOutputs {
            requested: requested_project.to_string(),
            count: outputs.len(),
        });
    }

    let mut produced = Vec::new();
    for output in &outputs {
        let filename = output
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let stem = filename.strip_suffix(".egg").unwrap_or(&filename);
        let (project, version) = parse_versioned_stem(stem)?;

        if &project != requested_project {
            ctx.warnings.push(Warning::BuildOutputMismatch {
                requested: requested_project.to_string(),
                produced_name: project.to_string(),
                produced_version: version.to_string(),
            });
        }

        let dest = ctx.eggs_dir.join(egg_filename(&project, &version, tag));
        fs_err::rename(output, &dest).or_else(|_| fs_err::copy(output, &dest).map(|_| ()))?;
        let metadata = EggMetadata::from_zip(&dest).unwrap_or_default();
        distil_extract::recompile_bytecode(&dest, ctx.interpreter).ok();
        produced.push(Distribution::new(
            project,
            version,
            Location::Path(dest),
            candidate.precedence,
            Arc::new(metadata),
        ));
    }

    produced
        .into_iter()
        .find(|d| &d.project == requested_project)
        .ok_or_else(|| ResolverError::MissingDistribution {
            project: requested_project.clone(),
        })
}

fn first_subdirectory(dir: &Path) -> Result<PathBuf, ResolverError> {
    let entries: Vec<_> = fs_err::read_dir(dir)?.filter_map(|e| e.ok()).collect();
    match entries.as_slice() {
        [single] => Ok(single.path()),
        _ => Err(ResolverError::AmbiguousSourceTree {
            path: dir.to_path_buf(),
            reason: format!("expected exactly one top-level directory, found {}", entries.len()),
        }),
    }
}

/// Rebuild an [`Environment`] by scanning `eggs_dir` for entries matching the
/// `{project}-{version}-{tag}.egg[/]` naming convention.
pub fn rescan_eggs_dir(
    eggs_dir: &Path,
    interpreter_version: impl Into<String>,
) -> Result<Environment, ResolverError> {
    let mut distributions = Vec::new();
    if eggs_dir.is_dir() {
        for entry in fs_err::read_dir(eggs_dir)? {
            let entry = entry?;
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();
            let Some(stem) = name.strip_suffix(".egg") else {
                continue;
            };
            let Ok((project, version)) = parse_versioned_stem(stem) else {
                debug!(entry = %name, "skipping unparsable eggs-dir entry");
                continue;
            };
            let metadata = if path.is_dir() {
                EggMetadata::from_directory(&path.join("EGG-INFO")).unwrap_or_default()
            } else {
                EggMetadata::from_zip(&path).unwrap_or_default()
            };
            distributions.push(Distribution::new(
                project,
                version,
                Location::Path(path),
                Precedence::BinaryArchive,
                Arc::new(metadata),
            ));
        }
    }
    Ok(Environment::from_distributions(interpreter_version, distributions))
}

pub fn warn_develop_without_packaging_dependency(project: &ProjectKey, warnings: &WarningSink) {
    warn!(%project, "develop-installed distribution declares namespace packages but not a packaging-support dependency");
    warnings.push(Warning::DevelopMissingPackagingSupport {
        project: project.to_string(),
    });
}
