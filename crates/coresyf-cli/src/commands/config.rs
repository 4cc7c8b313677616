use crate::logger;
use crate::GlobalOpts;
use clap::Subcommand;
use colored::Colorize;
use coresyf_config::{Config, KEYS};

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Print every key that has a value
    Show,
    /// Set a key and save the config file
    Set { key: String, value: String },
    /// Print the path of the config file
    Path,
}

pub fn handle_config(action: Option<ConfigAction>, opts: &GlobalOpts) -> anyhow::Result<()> {
    match action.unwrap_or(ConfigAction::Show) {
        ConfigAction::Show => {
            let config = Config::load()?;
            println!("{}", "Configuration:".bold().green());
            if config.is_empty() {
                if opts.verbosity_level() > 0 {
                    println!("  {}", "(empty)".yellow());
                }
            } else {
                for (key, value) in config.values_iter() {
                    println!("  {}: {}", key.cyan(), value);
                }
            }
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            if !KEYS.contains(&key.as_str()) {
                anyhow::bail!(
                    "Unknown config key: {}. Supported keys: {}",
                    key,
                    KEYS.join(", ")
                );
            }
            config.set(&key, value.clone())?;
            config.save()?;
            logger::success(&format!("Set {} = {}", key, value));
        }
        ConfigAction::Path => {
            let config_path = Config::path();
            logger::debug(&format!("Reading config from: {}", config_path.display()));
            println!("{}", config_path.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    }

    #[test]
    fn test_parse_set() {
        let parsed = Harness::try_parse_from(["config", "set", "shell", "bash"]);
        assert!(parsed.is_ok());
        let Ok(harness) = parsed else {
            return;
        };
        assert!(matches!(
            harness.action,
            Some(ConfigAction::Set { ref key, ref value }) if key == "shell" && value == "bash"
        ));
    }

    #[test]
    fn test_action_is_optional() {
        assert!(Harness::try_parse_from(["config"]).is_ok_and(|h| h.action.is_none()));
    }
}
