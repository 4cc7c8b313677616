//! Common types and utilities shared across commands

use crate::errors::CliError;
use clap::Parser;
use coresyf_manifest::find_manifest_files;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const CRATE_TARGETS: &[&str] = &[
    "coresyf",
    "coresyf_config",
    "coresyf_manifest",
    "coresyf_tool",
    "coresyf_packager",
];

/// Global CLI options available to all commands
#[derive(Parser, Debug, Clone, Default)]
pub struct GlobalOpts {
    #[arg(short, long, global = true, help = "Decrease verbosity")]
    pub quiet: bool,

    #[arg(short, long, global = true, action = clap::ArgAction::Count, help = "Increase verbosity (-v for debug, -vv for trace)")]
    pub verbose: u8,
}

impl GlobalOpts {
    /// Get the effective verbosity level
    /// - 0: quiet/warn only
    /// - 1: debug (-v)
    /// - 2: trace (-vv)
    pub fn verbosity_level(&self) -> u8 {
        if self.quiet {
            0
        } else {
            self.verbose
        }
    }

    fn default_filter(&self) -> String {
        let level = if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "warn",
                1 => "debug",
                _ => "trace",
            }
        };
        CRATE_TARGETS
            .iter()
            .map(|target| format!("{}={}", target, level))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Where structured diagnostics are written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceOutput {
    Stdout,
    Stderr,
}

/// Install the tracing subscriber. `RUST_LOG` wins over the verbosity flags.
pub fn init_tracing(opts: &GlobalOpts, output: TraceOutput) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(opts.default_filter()));
    let layer = fmt::layer().compact().with_target(false);

    let _ = match output {
        TraceOutput::Stdout => tracing_subscriber::registry()
            .with(filter)
            .with(layer.with_writer(std::io::stdout))
            .try_init(),
        TraceOutput::Stderr => tracing_subscriber::registry()
            .with(filter)
            .with(layer.with_writer(std::io::stderr))
            .try_init(),
    };
}

/// The single `*manifest.json` of a tool directory
pub fn locate_manifest(tool_dir: &Path) -> Result<PathBuf, CliError> {
    if !tool_dir.is_dir() {
        return Err(CliError::ToolDirectoryNotFound(tool_dir.to_path_buf()));
    }
    let mut manifests = find_manifest_files(tool_dir)
        .map_err(|_| CliError::ToolDirectoryNotFound(tool_dir.to_path_buf()))?;
    match manifests.len() {
        0 => Err(CliError::ManifestNotFound(tool_dir.to_path_buf())),
        1 => Ok(manifests.remove(0)),
        _ => Err(CliError::AmbiguousManifest {
            dir: tool_dir.to_path_buf(),
            files: manifests
                .iter()
                .filter_map(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned())
                .collect(),
        }),
    }
}
