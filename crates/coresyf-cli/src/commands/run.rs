//! `coresyf run`: the generic entry point a bundle's `run` script delegates to
//!
//! Structured diagnostics go to stdout in this mode; standard error carries
//! only failures.

use crate::common::locate_manifest;
use crate::GlobalOpts;
use anyhow::Context;
use clap::Args;
use coresyf_config::Config;
use coresyf_logger as logger;
use coresyf_tool::{ExecutionSettings, Tool};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Args, Debug, Clone)]
pub struct RunCommand {
    /// Tool bundle directory holding the manifest
    #[arg(long = "tool-dir", alias = "tool_dir", default_value = ".")]
    pub tool_dir: PathBuf,

    /// Kill the wrapped command after this many seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Parent directory for per-invocation scratch directories
    #[arg(long = "scratch-root")]
    pub scratch_root: Option<PathBuf>,

    /// Arguments for the tool itself (after `--`)
    #[arg(last = true, allow_hyphen_values = true)]
    pub tool_args: Vec<String>,
}

pub fn handle_run(cmd: RunCommand, _opts: &GlobalOpts) -> anyhow::Result<()> {
    let config = Config::load().context("Failed to load config")?;
    let manifest_path = locate_manifest(&cmd.tool_dir)?;

    let mut settings = ExecutionSettings::from_config(&config)?;
    if let Some(secs) = cmd.timeout {
        settings = settings.with_timeout(Some(Duration::from_secs(secs)));
    }
    if let Some(root) = cmd.scratch_root {
        settings = settings.with_scratch_root(root);
    }

    let mut tool = Tool::load(&manifest_path, settings)
        .with_context(|| format!("Failed to load tool from {}", manifest_path.display()))?;
    logger::set_current_tool(Some(tool.manifest().name.clone()));

    let bindings = match tool.binder().bind(&cmd.tool_args) {
        Ok(bindings) => bindings,
        Err(e) => tool.binder().exit(e),
    };

    let report = tool.invoke(bindings)?;
    let command = report.rendered_command.as_deref().unwrap_or(&report.tool);
    let mut stdout = std::io::stdout().lock();
    for output in &report.outputs {
        logger::capture_output(command, output.code, &output.stdout, &output.stderr);
        stdout.write_all(output.stdout.as_bytes())?;
    }
    stdout.flush()?;
    tracing::info!("'{}' finished: {}", report.tool, report.state);
    Ok(())
}
