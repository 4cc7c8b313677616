//! Tool bundle packaging
//!
//! `pack` runs four stages, each a precondition for the next: structural
//! check, manifest load, example tests, archive. The archive is written to a
//! temporary file in the target directory and only renamed into place once
//! complete, so a failed run never leaves a partial `{name}.zip` behind.

use crate::examples::ExampleParseError;
use crate::tester::{Credentials, TestReport, ToolTester};
use coresyf_config::{Config, DEFAULT_ENTRY_SCRIPT, DEFAULT_EXAMPLES_FILE};
use coresyf_manifest::{find_manifest_files, Manifest, ManifestError};
use std::fs::{self, File, Metadata};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

#[derive(Error, Debug)]
pub enum PackageError {
    #[error("Tool directory not found: {}", .0.display())]
    ToolDirectoryNotFound(PathBuf),

    #[error("Target directory not found: {}", .0.display())]
    TargetDirectoryNotFound(PathBuf),

    #[error("Entry script not found: {}", .0.display())]
    MissingEntryScript(PathBuf),

    #[error("No *manifest.json file in {}", .0.display())]
    MissingManifest(PathBuf),

    #[error("More than one manifest file: {}", display_paths(.0))]
    AmbiguousManifest(Vec<PathBuf>),

    #[error("Examples file not found: {}", .0.display())]
    MissingExamplesFile(PathBuf),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Examples(#[from] ExampleParseError),

    #[error("Tool examples failed: {0}")]
    TestsFailed(TestReport),

    #[error("Failed to write archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Failed to walk tool directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Files of a bundle that passed the structural check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleLayout {
    pub tool_dir: PathBuf,
    pub entry_script: PathBuf,
    pub manifest: PathBuf,
    pub examples: PathBuf,
}

#[derive(Debug, Clone)]
pub struct Packager {
    tool_dir: PathBuf,
    target_dir: PathBuf,
    entry_script: String,
    examples_file: String,
    credentials: Credentials,
    example_timeout: Option<Duration>,
}

impl Packager {
    pub fn new(tool_dir: impl Into<PathBuf>, target_dir: impl Into<PathBuf>) -> Self {
        Packager {
            tool_dir: tool_dir.into(),
            target_dir: target_dir.into(),
            entry_script: DEFAULT_ENTRY_SCRIPT.to_string(),
            examples_file: DEFAULT_EXAMPLES_FILE.to_string(),
            credentials: Credentials::default(),
            example_timeout: None,
        }
    }

    /// Bundle file names and the example timeout come from the user config
    pub fn from_config(
        tool_dir: impl Into<PathBuf>,
        target_dir: impl Into<PathBuf>,
        config: &Config,
    ) -> Self {
        let mut packager = Self::new(tool_dir, target_dir);
        packager.entry_script = config.entry_script().to_string();
        packager.examples_file = config.examples_file().to_string();
        packager.example_timeout = config.example_timeout();
        packager
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_example_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.example_timeout = timeout;
        self
    }

    pub fn tool_dir(&self) -> &Path {
        &self.tool_dir
    }

    /// Full structural check run before packaging
    pub fn check_structure(&self) -> Result<BundleLayout, PackageError> {
        if !self.tool_dir.is_dir() {
            return Err(PackageError::ToolDirectoryNotFound(self.tool_dir.clone()));
        }
        if !self.target_dir.is_dir() {
            return Err(PackageError::TargetDirectoryNotFound(self.target_dir.clone()));
        }
        self.check_bundle()
    }

    /// Structural check of the bundle alone, ignoring the target directory
    pub fn check_bundle(&self) -> Result<BundleLayout, PackageError> {
        if !self.tool_dir.is_dir() {
            return Err(PackageError::ToolDirectoryNotFound(self.tool_dir.clone()));
        }

        let entry_script = self.tool_dir.join(&self.entry_script);
        if !entry_script.is_file() {
            return Err(PackageError::MissingEntryScript(entry_script));
        }

        let mut manifests = find_manifest_files(&self.tool_dir)?;
        let manifest = match manifests.len() {
            0 => return Err(PackageError::MissingManifest(self.tool_dir.clone())),
            1 => manifests.remove(0),
            _ => return Err(PackageError::AmbiguousManifest(manifests)),
        };

        let examples = self.tool_dir.join(&self.examples_file);
        if !examples.is_file() {
            return Err(PackageError::MissingExamplesFile(examples));
        }

        Ok(BundleLayout {
            tool_dir: self.tool_dir.clone(),
            entry_script,
            manifest,
            examples,
        })
    }

    /// Check the bundle, load its manifest and run its examples
    pub fn test(&self) -> Result<(Manifest, TestReport), PackageError> {
        let layout = self.check_bundle()?;
        self.test_layout(&layout)
    }

    fn test_layout(&self, layout: &BundleLayout) -> Result<(Manifest, TestReport), PackageError> {
        let manifest = Manifest::load(&layout.manifest)?;
        info!("Testing tool '{}' in {}", manifest.name, layout.tool_dir.display());

        let report = ToolTester::new(&layout.tool_dir, &self.examples_file)?
            .with_credentials(self.credentials.clone())
            .with_timeout(self.example_timeout)
            .run_all();
        if !report.is_success() {
            return Err(PackageError::TestsFailed(report));
        }
        Ok((manifest, report))
    }

    /// Test the bundle and archive it to `{target_dir}/{name}.zip`
    pub fn pack(&self) -> Result<PathBuf, PackageError> {
        let layout = self.check_structure()?;
        let (manifest, _) = self.test_layout(&layout)?;
        let archive = self
            .target_dir
            .join(format!("{}.zip", archive_stem(&manifest.name)));
        archive_directory(&self.tool_dir, &archive)?;
        info!("Packaged '{}' into {}", manifest.name, archive.display());
        Ok(archive)
    }
}

fn archive_stem(name: &str) -> String {
    name.replace(['/', '\\'], "_")
}

/// Zip the contents of `source` into `archive`, entries relative to
/// `source` in sorted order
pub fn archive_directory(source: &Path, archive: &Path) -> Result<(), PackageError> {
    let source = fs::canonicalize(source)?;
    let target_dir = match archive.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let target_dir = fs::canonicalize(target_dir)?;

    let temp = tempfile::Builder::new()
        .prefix(".coresyf-pack-")
        .suffix(".zip")
        .tempfile_in(&target_dir)?;

    let mut excluded = vec![temp.path().to_path_buf()];
    if let Some(file_name) = archive.file_name() {
        excluded.push(target_dir.join(file_name));
    }

    let mut writer = ZipWriter::new(temp.as_file());
    let base = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in WalkDir::new(&source)
        .min_depth(1)
        .sort_by_file_name()
        .follow_links(false)
    {
        let entry = entry?;
        let path = entry.path();
        if excluded.iter().any(|ex| ex == path) {
            continue;
        }
        let Some(name) = entry_name(&source, path) else {
            continue;
        };
        let metadata = fs::metadata(path)?;
        let options = base.unix_permissions(file_mode(&metadata));

        if metadata.is_dir() {
            debug!("Adding directory {}", name);
            writer.add_directory(name, options)?;
        } else {
            debug!("Adding {}", name);
            writer.start_file(name, options)?;
            let mut file = File::open(path)?;
            io::copy(&mut file, &mut writer)?;
        }
    }
    writer.finish()?;

    temp.persist(archive).map_err(|e| e.error)?;
    Ok(())
}

fn entry_name(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

#[cfg(unix)]
fn file_mode(metadata: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn file_mode(metadata: &Metadata) -> u32 {
    if metadata.is_dir() {
        0o755
    } else {
        0o644
    }
}
