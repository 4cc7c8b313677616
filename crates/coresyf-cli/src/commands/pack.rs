use crate::GlobalOpts;
use clap::Args;
use coresyf_config::Config;
use coresyf_logger as logger;
use coresyf_packager::{Credentials, PackageError, Packager, TestReport};
use std::path::PathBuf;

#[derive(Args, Debug, Clone)]
pub struct PackCommand {
    /// Tool bundle directory
    #[arg(long = "tool_dir", default_value = ".")]
    pub tool_dir: PathBuf,

    /// Directory the archive is written to
    #[arg(long = "target_dir", default_value = "..")]
    pub target_dir: PathBuf,

    /// SciHub user exported to examples as SCIHUB_USER
    #[arg(long = "scihub_user")]
    pub scihub_user: Option<String>,

    /// SciHub password exported to examples as SCIHUB_PASS
    #[arg(long = "scihub_pass")]
    pub scihub_pass: Option<String>,
}

pub fn handle_pack(cmd: PackCommand, _opts: &GlobalOpts) -> anyhow::Result<()> {
    let config = Config::load()?;
    let packager = Packager::from_config(&cmd.tool_dir, &cmd.target_dir, &config)
        .with_credentials(Credentials::new(cmd.scihub_user, cmd.scihub_pass));

    logger::info(&format!(
        "Packaging {} to {}",
        cmd.tool_dir.display(),
        cmd.target_dir.display()
    ));
    logger::spinner_start("Testing examples");
    match packager.pack() {
        Ok(archive) => {
            logger::spinner_success("Packaging finished");
            println!("{}", archive.display());
            Ok(())
        }
        Err(PackageError::TestsFailed(report)) => {
            logger::spinner_error(&report.to_string());
            report_failures(&report);
            anyhow::bail!("Packaging of {} aborted", cmd.tool_dir.display())
        }
        Err(e) => {
            logger::spinner_stop();
            Err(e.into())
        }
    }
}

/// One error line per failed example
pub fn report_failures(report: &TestReport) {
    for outcome in &report.outcomes {
        if let Some(ref failure) = outcome.failure {
            logger::error(&format!(
                "Example '{}' (line {}) {}",
                outcome.example.title, outcome.example.line, failure
            ));
        } else {
            logger::debug(&format!("Example '{}' passed", outcome.example.title));
        }
    }
}
