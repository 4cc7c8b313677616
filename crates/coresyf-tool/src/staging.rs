//! Input staging
//!
//! Every bound `data` path must exist. Zip archives are extracted into the
//! invocation's scratch directory and the binding is rewritten to point at
//! what was extracted; directories and plain files are used in place.

use crate::errors::StagingError;
use coresyf_manifest::{Bindings, Manifest};
use std::fs::{self, File};
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};
use zip::ZipArchive;

/// Local file header, empty archive and spanned archive signatures
const ZIP_SIGNATURES: [[u8; 4]; 3] = [
    [0x50, 0x4b, 0x03, 0x04],
    [0x50, 0x4b, 0x05, 0x06],
    [0x50, 0x4b, 0x07, 0x08],
];

/// A binding element rewritten during staging
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rebinding {
    pub identifier: String,
    pub original: PathBuf,
    pub staged: PathBuf,
}

pub fn stage_inputs(
    manifest: &Manifest,
    bindings: &mut Bindings,
    scratch: &Path,
) -> Result<Vec<Rebinding>, StagingError> {
    let mut rebindings = Vec::new();

    for spec in manifest.inputs() {
        let Some(value) = bindings.get_mut(&spec.identifier) else {
            continue;
        };

        for (index, element) in value.values_mut().iter_mut().enumerate() {
            let original = PathBuf::from(element.as_str());
            if !original.exists() {
                return Err(StagingError::InputNotFound {
                    identifier: spec.identifier.clone(),
                    path: original,
                });
            }
            if original.is_dir() || !is_zip_file(&original)? {
                continue;
            }

            let target = scratch.join(format!("{}-{}", spec.identifier, index));
            let staged = extract_archive(&original, &target)?;
            info!(
                "Rebinding '{}' from {} to {}",
                spec.identifier,
                original.display(),
                staged.display()
            );
            *element = staged.to_string_lossy().into_owned();
            rebindings.push(Rebinding {
                identifier: spec.identifier.clone(),
                original,
                staged,
            });
        }
    }

    Ok(rebindings)
}

fn is_zip_file(path: &Path) -> Result<bool, StagingError> {
    let mut magic = [0u8; 4];
    let mut file = File::open(path)?;
    let mut read = 0;
    while read < magic.len() {
        let n = file.read(&mut magic[read..])?;
        if n == 0 {
            return Ok(false);
        }
        read += n;
    }
    Ok(ZIP_SIGNATURES.contains(&magic))
}

/// Extract `archive` into `target` and return the top-level path of its
/// first member
fn extract_archive(archive_path: &Path, target: &Path) -> Result<PathBuf, StagingError> {
    let archive_error = |source| StagingError::Archive {
        path: archive_path.to_path_buf(),
        source,
    };

    debug!("Extracting {} into {}", archive_path.display(), target.display());
    let mut archive = ZipArchive::new(File::open(archive_path)?).map_err(archive_error)?;
    if archive.len() == 0 {
        return Err(StagingError::EmptyArchive(archive_path.to_path_buf()));
    }

    let first = archive
        .by_index(0)
        .map_err(archive_error)?
        .enclosed_name()
        .map(PathBuf::from);
    let top_level = first
        .as_deref()
        .and_then(|name| {
            name.components()
                .find(|c| matches!(c, Component::Normal(_)))
        })
        .map(|c| PathBuf::from(c.as_os_str()))
        .ok_or_else(|| StagingError::UnsafeArchiveEntry(archive_path.to_path_buf()))?;

    fs::create_dir_all(target)?;
    archive.extract(target).map_err(archive_error)?;
    Ok(target.join(top_level))
}
