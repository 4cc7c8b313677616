use crate::template::TemplateError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading a manifest or building a tool from it.
/// All of them abort tool construction.
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Manifest not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to parse manifest: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid manifest: {0}")]
    Schema(String),

    #[error("Invalid command template: {0}")]
    Template(#[from] TemplateError),

    #[error("Output argument '{0}' does not appear in the command template")]
    MissingCommandPlaceholder(String),

    #[error("Manifest for '{0}' has no command template")]
    MissingCommand(String),
}

impl ManifestError {
    pub(crate) fn schema(message: impl Into<String>) -> Self {
        ManifestError::Schema(message.into())
    }
}
