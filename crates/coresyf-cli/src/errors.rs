//! Errors raised by the CLI itself, outside the library crates

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("No *manifest.json file in {}", .0.display())]
    ManifestNotFound(PathBuf),

    #[error("More than one manifest file in {}: {}", .dir.display(), .files.join(", "))]
    AmbiguousManifest { dir: PathBuf, files: Vec<String> },

    #[error("Tool directory not found: {}", .0.display())]
    ToolDirectoryNotFound(PathBuf),
}
