use crate::common::locate_manifest;
use crate::GlobalOpts;
use clap::Args;
use colored::Colorize;
use coresyf_logger as logger;
use coresyf_manifest::Manifest;
use std::path::PathBuf;

#[derive(Args, Debug, Clone)]
pub struct ValidateCommand {
    /// Tool bundle directory holding the manifest
    #[arg(long = "tool-dir", alias = "tool_dir", default_value = ".")]
    pub tool_dir: PathBuf,
}

/// Load the manifest, compile its command template and print the argument
/// table
pub fn handle_validate(cmd: ValidateCommand, opts: &GlobalOpts) -> anyhow::Result<()> {
    let path = locate_manifest(&cmd.tool_dir)?;
    let manifest = Manifest::load(&path)?;
    let template = manifest.compile_command(true)?;

    println!("{} {}", manifest.name.bold().green(), format!("({})", path.display()).dimmed());
    if !manifest.description.is_empty() {
        println!("  {}", manifest.description);
    }
    println!();

    for arg in &manifest.arguments {
        let mut flags = Vec::new();
        if arg.is_required() {
            flags.push("required".to_string());
        }
        if arg.is_multiple() {
            flags.push("multiple".to_string());
        }
        if let Some(ref default) = arg.default {
            flags.push(format!("default={}", default));
        }
        if !arg.options.is_empty() {
            flags.push(format!("options={}", arg.options.join("|")));
        }
        println!(
            "  --{:<20} {:<18} {}",
            arg.identifier.cyan(),
            arg.kind.label(),
            flags.join(", ")
        );
        if opts.verbosity_level() > 0 {
            println!("      {}", arg.description.dimmed());
        }
    }
    println!();

    match template {
        Some(template) => println!("{} {}", "command:".bold(), template.source()),
        None => logger::warn("Manifest has no command template; it can only be run with custom logic"),
    }
    logger::success(&format!("Manifest '{}' is valid", manifest.name));
    Ok(())
}
