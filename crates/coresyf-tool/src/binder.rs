//! Command-line surface generated from a manifest
//!
//! Each argument becomes one `--{identifier}` option. Multi-valued arguments
//! may repeat their flag and every occurrence takes one or more values, so
//! `--input a b --input c` binds `[a, b, c]`. Values are never split on a
//! delimiter.

use crate::errors::BindError;
use clap::builder::{NonEmptyStringValueParser, PossibleValuesParser};
use clap::error::ErrorKind;
use clap::{Arg, ArgAction, ArgMatches, Command};
use coresyf_manifest::{ArgumentKind, ArgumentSpec, BindingValue, Bindings, Manifest, ParameterType};
use std::ffi::OsString;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ArgumentBinder {
    command: Command,
    arguments: Vec<ArgumentSpec>,
}

impl ArgumentBinder {
    pub fn new(manifest: &Manifest) -> Self {
        let mut command = Command::new(manifest.name.clone())
            .no_binary_name(true)
            .disable_version_flag(true);
        if !manifest.description.is_empty() {
            command = command.about(manifest.description.clone());
        }
        for spec in &manifest.arguments {
            command = command.arg(build_arg(spec));
        }

        ArgumentBinder {
            command,
            arguments: manifest.arguments.clone(),
        }
    }

    pub fn command(&self) -> &Command {
        &self.command
    }

    /// Parse tool arguments (without the program name) into bindings
    pub fn bind<I, T>(&self, argv: I) -> Result<Bindings, BindError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = self.command.clone().try_get_matches_from(argv)?;

        let mut bindings = Bindings::new();
        for spec in &self.arguments {
            let Some(value) = collect_value(&matches, spec) else {
                continue;
            };
            if spec.check_exists_on_bind() {
                if let Some(missing) = value.values().iter().find(|v| !Path::new(v).exists()) {
                    return Err(BindError::InputNotFound {
                        identifier: spec.identifier.clone(),
                        path: missing.into(),
                    });
                }
            }
            bindings.insert(spec.identifier.clone(), value);
        }

        debug!("Bound {} argument(s): {:?}", bindings.len(), bindings);
        Ok(bindings)
    }

    /// Print a binding error with usage and terminate, as a CLI would.
    /// Help and usage errors keep clap's exit status.
    pub fn exit(&self, err: BindError) -> ! {
        match err {
            BindError::Usage(e) => e.exit(),
            other @ BindError::InputNotFound { .. } => self
                .command
                .clone()
                .error(ErrorKind::ValueValidation, other.to_string())
                .exit(),
        }
    }

    pub fn render_help(&self) -> String {
        self.command.clone().render_help().to_string()
    }
}

fn build_arg(spec: &ArgumentSpec) -> Arg {
    let mut arg = Arg::new(spec.identifier.clone())
        .long(spec.identifier.clone())
        .value_name(spec.name.clone())
        .help(format!("[{}] {}", spec.kind.label(), spec.description))
        .required(spec.is_required() && spec.default.is_none());

    arg = if spec.is_multiple() {
        arg.action(ArgAction::Append).num_args(1..)
    } else {
        arg.action(ArgAction::Set).num_args(1)
    };

    if let Some(ref default) = spec.default {
        arg = arg.default_value(default.clone());
    }

    match spec.kind {
        ArgumentKind::Data | ArgumentKind::Output => {
            arg.value_parser(NonEmptyStringValueParser::new())
        }
        ArgumentKind::Parameter(ParameterType::String) => arg,
        ArgumentKind::Parameter(ParameterType::Int) => arg.value_parser(parse_int),
        ArgumentKind::Parameter(ParameterType::Float) => arg.value_parser(parse_float),
        ArgumentKind::Parameter(ParameterType::Bool) => arg.value_parser(parse_bool),
        ArgumentKind::Parameter(ParameterType::Enum) => {
            arg.value_parser(PossibleValuesParser::new(spec.options.clone()))
        }
    }
}

fn collect_value(matches: &ArgMatches, spec: &ArgumentSpec) -> Option<BindingValue> {
    let values: Vec<String> = matches
        .get_many::<String>(&spec.identifier)?
        .cloned()
        .collect();
    if spec.is_multiple() {
        Some(BindingValue::Sequence(values))
    } else {
        values.into_iter().next().map(BindingValue::Scalar)
    }
}

fn parse_int(value: &str) -> Result<String, String> {
    value
        .trim()
        .parse::<i64>()
        .map(|n| n.to_string())
        .map_err(|e| format!("'{}' is not an integer: {}", value, e))
}

fn parse_float(value: &str) -> Result<String, String> {
    let trimmed = value.trim();
    match trimmed.parse::<f64>() {
        Ok(n) if n.is_finite() => Ok(trimmed.to_string()),
        Ok(_) => Err(format!("'{}' is not a finite number", value)),
        Err(e) => Err(format!("'{}' is not a number: {}", value, e)),
    }
}

fn parse_bool(value: &str) -> Result<String, String> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "y" | "1" | "on" => Ok("true".to_string()),
        "false" | "no" | "n" | "0" | "off" => Ok("false".to_string()),
        _ => Err(format!("'{}' is not a boolean (use true or false)", value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn binder() -> Option<ArgumentBinder> {
        let manifest = Manifest::from_value(json!({
            "name": "dummy tool",
            "description": "Test tool",
            "arguments": [
                {"identifier": "input", "type": "data"},
                {"identifier": "output", "type": "output"},
                {"identifier": "param", "type": "parameter", "parameterType": "string"}
            ]
        }));
        assert!(manifest.is_ok());
        manifest.ok().map(|manifest| ArgumentBinder::new(&manifest))
    }

    fn typed_binder() -> Option<ArgumentBinder> {
        let manifest = Manifest::from_value(json!({
            "name": "stack",
            "arguments": [
                {"identifier": "inputs", "type": "data", "multiple": true},
                {"identifier": "count", "type": "parameter", "parameterType": "int", "default": 2},
                {"identifier": "scale", "type": "parameter", "parameterType": "float", "required": false},
                {"identifier": "overwrite", "type": "parameter", "parameterType": "bool", "default": false},
                {"identifier": "mode", "type": "parameter", "parameterType": "enum",
                 "options": ["fast", "exact"], "default": "fast"}
            ]
        }));
        assert!(manifest.is_ok());
        manifest.ok().map(|manifest| ArgumentBinder::new(&manifest))
    }

    #[test]
    fn test_bind_exact_arguments() {
        let Some(binder) = binder() else {
            return;
        };
        let result = binder.bind("--input f1 --output f2 --param astr".split(' '));
        assert!(result.is_ok());
        let Ok(bindings) = result else {
            return;
        };
        assert_eq!(bindings.len(), 3);
        assert_eq!(bindings.scalar("input"), Some("f1"));
        assert_eq!(bindings.scalar("output"), Some("f2"));
        assert_eq!(bindings.scalar("param"), Some("astr"));
    }

    #[test]
    fn test_missing_required_argument() {
        let Some(binder) = binder() else {
            return;
        };
        let result = binder.bind(["--input", "f1", "--param", "x"]);
        assert!(matches!(
            result,
            Err(BindError::Usage(ref e)) if e.kind() == ErrorKind::MissingRequiredArgument
        ));
    }

    #[test]
    fn test_unknown_flag() {
        let Some(binder) = binder() else {
            return;
        };
        let result = binder.bind(["--input", "f1", "--output", "f2", "--param", "x", "--extra", "1"]);
        assert!(matches!(
            result,
            Err(BindError::Usage(ref e)) if e.kind() == ErrorKind::UnknownArgument
        ));
    }

    #[test]
    fn test_single_value_rejects_repetition() {
        let Some(binder) = binder() else {
            return;
        };
        let result = binder.bind([
            "--input", "a", "--input", "b", "--output", "o", "--param", "p",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_multiple_values_and_defaults() {
        let Some(binder) = typed_binder() else {
            return;
        };
        let result = binder.bind(["--inputs", "a", "b", "--inputs", "c"]);
        assert!(result.is_ok());
        let Ok(bindings) = result else {
            return;
        };
        assert_eq!(
            bindings.get("inputs"),
            Some(&BindingValue::Sequence(vec![
                "a".to_string(),
                "b".to_string(),
                "c".to_string()
            ]))
        );
        assert_eq!(bindings.scalar("count"), Some("2"));
        assert_eq!(bindings.scalar("overwrite"), Some("false"));
        assert_eq!(bindings.scalar("mode"), Some("fast"));
        assert!(!bindings.contains("scale"));
        assert_eq!(bindings.len(), 4);
    }

    #[test]
    fn test_type_coercion_failures() {
        let Some(binder) = typed_binder() else {
            return;
        };
        for bad in [
            ["--inputs", "a", "--count", "three"],
            ["--inputs", "a", "--scale", "wide"],
            ["--inputs", "a", "--overwrite", "maybe"],
            ["--inputs", "a", "--mode", "slow"],
        ] {
            let result = binder.bind(bad);
            assert!(
                matches!(result, Err(BindError::Usage(ref e))
                    if matches!(e.kind(), ErrorKind::ValueValidation | ErrorKind::InvalidValue)),
                "expected coercion failure for {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_typed_values_normalised() {
        let Some(binder) = typed_binder() else {
            return;
        };
        let result = binder.bind([
            "--inputs", "a", "--count", "7", "--scale", "0.5", "--overwrite", "yes", "--mode", "exact",
        ]);
        assert!(result.is_ok());
        let Ok(bindings) = result else {
            return;
        };
        assert_eq!(bindings.parse::<i64>("count"), Some(Ok(7)));
        assert_eq!(bindings.parse::<f64>("scale"), Some(Ok(0.5)));
        assert_eq!(bindings.parse::<bool>("overwrite"), Some(Ok(true)));
        assert_eq!(bindings.scalar("mode"), Some("exact"));
    }

    #[test]
    fn test_existence_checked_only_when_explicitly_required() {
        let Ok(dir) = TempDir::new() else {
            return;
        };
        let result = Manifest::from_value(json!({
            "name": "t",
            "arguments": [
                {"identifier": "strict", "type": "data", "required": true},
                {"identifier": "lazy", "type": "data"}
            ]
        }));
        assert!(result.is_ok());
        let Ok(manifest) = result else {
            return;
        };
        let binder = ArgumentBinder::new(&manifest);
        let present = dir.path().join("present");
        assert!(std::fs::write(&present, "x").is_ok());
        let present = present.to_string_lossy().into_owned();

        assert!(binder
            .bind(["--strict", present.as_str(), "--lazy", "not-there"])
            .is_ok());
        assert!(matches!(
            binder.bind(["--strict", "not-there", "--lazy", present.as_str()]),
            Err(BindError::InputNotFound { ref identifier, .. }) if identifier == "strict"
        ));
    }

    #[test]
    fn test_help_lists_arguments() {
        let Some(binder) = binder() else {
            return;
        };
        let help = binder.render_help();
        assert!(help.contains("Test tool"));
        assert!(help.contains("--input"));
        assert!(help.contains("[parameter:string]"));
        assert!(matches!(
            binder.bind(["--help"]),
            Err(BindError::Usage(ref e)) if e.kind() == ErrorKind::DisplayHelp
        ));
    }
}
