use crate::process::ProcessError;
use coresyf_config::ConfigError;
use coresyf_manifest::{ManifestError, TemplateError};
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Lifecycle of one tool invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationState {
    Parsed,
    InputsStaged,
    Running,
    OutputsChecked,
    Cleaned,
    InputError,
    RunError,
    OutputError,
}

impl InvocationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvocationState::Parsed => "parsed",
            InvocationState::InputsStaged => "inputs_staged",
            InvocationState::Running => "running",
            InvocationState::OutputsChecked => "outputs_checked",
            InvocationState::Cleaned => "cleaned",
            InvocationState::InputError => "input_error",
            InvocationState::RunError => "run_error",
            InvocationState::OutputError => "output_error",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            InvocationState::InputError | InvocationState::RunError | InvocationState::OutputError
        )
    }
}

impl fmt::Display for InvocationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum BindError {
    #[error("{0}")]
    Usage(#[from] clap::Error),

    #[error("Input '{identifier}' does not exist: {}", .path.display())]
    InputNotFound { identifier: String, path: PathBuf },
}

#[derive(Error, Debug)]
pub enum StagingError {
    #[error("Input '{identifier}' does not exist: {}", .path.display())]
    InputNotFound { identifier: String, path: PathBuf },

    #[error("Input zip file '{}' is empty", .0.display())]
    EmptyArchive(PathBuf),

    #[error("Archive '{}' has no safe entry to bind to", .0.display())]
    UnsafeArchiveEntry(PathBuf),

    #[error("Failed to read archive '{}': {source}", .path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Error, Debug)]
pub enum RunError {
    #[error("Command exited with {}: {stderr}", exit_label(.code.as_ref()))]
    NonZeroExit { code: Option<i32>, stderr: String },

    #[error("Command timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Failed to launch command: {0}")]
    Launch(String),

    #[error("Failed to render command: {0}")]
    Template(#[from] TemplateError),

    #[error("{0}")]
    Failed(String),
}

impl From<ProcessError> for RunError {
    fn from(err: ProcessError) -> Self {
        match err {
            ProcessError::Timeout(after) => RunError::Timeout(after),
            other => RunError::Launch(other.to_string()),
        }
    }
}

fn exit_label(code: Option<&i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "no status (killed by signal)".to_string(),
    }
}

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Output '{identifier}' was not created: {}", .path.display())]
    MissingOutputFile { identifier: String, path: PathBuf },

    #[error("Output '{identifier}' is empty: {}", .path.display())]
    EmptyOutputFile { identifier: String, path: PathBuf },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Everything that can stop a tool from being built or invoked
#[derive(Error, Debug)]
pub enum ToolError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Bind(#[from] BindError),

    #[error(transparent)]
    Staging(#[from] StagingError),

    #[error(transparent)]
    Run(#[from] RunError),

    #[error(transparent)]
    Output(#[from] OutputError),

    #[error("Scratch directory error: {0}")]
    Scratch(io::Error),
}

impl ToolError {
    /// Terminal state reached by a failed invocation, if it got that far
    pub fn state(&self) -> Option<InvocationState> {
        match self {
            ToolError::Staging(_) => Some(InvocationState::InputError),
            ToolError::Run(_) => Some(InvocationState::RunError),
            ToolError::Output(_) => Some(InvocationState::OutputError),
            _ => None,
        }
    }
}
