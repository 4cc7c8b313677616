//! Typed tool manifest
//!
//! A manifest is resolved once from its JSON form into these types. Argument
//! kinds and parameter types are closed enums, so everything downstream (CLI
//! generation, staging, output checks) works from the schema instead of
//! inspecting values at runtime.

use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Declared type of a `parameter` argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterType {
    String,
    Int,
    Float,
    Bool,
    Enum,
}

impl ParameterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterType::String => "string",
            ParameterType::Int => "int",
            ParameterType::Float => "float",
            ParameterType::Bool => "bool",
            ParameterType::Enum => "enum",
        }
    }
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParameterType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "string" | "str" => Ok(ParameterType::String),
            "int" | "integer" => Ok(ParameterType::Int),
            "float" | "double" | "number" => Ok(ParameterType::Float),
            "bool" | "boolean" => Ok(ParameterType::Bool),
            "enum" => Ok(ParameterType::Enum),
            other => Err(format!("unsupported parameterType '{}'", other)),
        }
    }
}

/// What an argument means to the framework
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgumentKind {
    /// Input path, staged before running
    Data,
    /// Output path, checked after running
    Output,
    Parameter(ParameterType),
}

impl ArgumentKind {
    pub fn label(&self) -> String {
        match self {
            ArgumentKind::Data => "data".to_string(),
            ArgumentKind::Output => "output".to_string(),
            ArgumentKind::Parameter(ty) => format!("parameter:{}", ty),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Multiplicity {
    #[default]
    Single,
    Multiple,
}

/// One entry of the manifest's `arguments` list
#[derive(Debug, Clone, PartialEq)]
pub struct ArgumentSpec {
    /// Binding key, CLI flag name and template placeholder name
    pub identifier: String,
    /// Display label
    pub name: String,
    pub description: String,
    pub kind: ArgumentKind,
    pub multiplicity: Multiplicity,
    /// `required` exactly as written in the manifest
    pub required: Option<bool>,
    /// Default for parameters, already rendered as a string
    pub default: Option<String>,
    /// Allowed values for `enum` parameters
    pub options: Vec<String>,
}

impl ArgumentSpec {
    pub fn is_data(&self) -> bool {
        self.kind == ArgumentKind::Data
    }

    pub fn is_output(&self) -> bool {
        self.kind == ArgumentKind::Output
    }

    pub fn parameter_type(&self) -> Option<ParameterType> {
        match self.kind {
            ArgumentKind::Parameter(ty) => Some(ty),
            _ => None,
        }
    }

    pub fn is_multiple(&self) -> bool {
        self.multiplicity == Multiplicity::Multiple
    }

    /// Data and output arguments are required unless the manifest says
    /// otherwise; parameters are required unless they carry a default.
    pub fn is_required(&self) -> bool {
        match (self.required, self.kind) {
            (Some(required), _) => required,
            (None, ArgumentKind::Parameter(_)) => self.default.is_none(),
            (None, _) => true,
        }
    }

    /// Data inputs explicitly marked `"required": true` are checked for
    /// existence while binding; every other input is checked during staging.
    pub fn check_exists_on_bind(&self) -> bool {
        self.is_data() && self.required == Some(true)
    }
}

/// Parsed tool manifest. Immutable once loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    pub name: String,
    pub description: String,
    pub arguments: Vec<ArgumentSpec>,
    pub command: Option<String>,
    pub operation: Option<Map<String, Value>>,
}

impl Manifest {
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.arguments.iter().map(|arg| arg.identifier.as_str())
    }

    pub fn argument(&self, identifier: &str) -> Option<&ArgumentSpec> {
        self.arguments
            .iter()
            .find(|arg| arg.identifier == identifier)
    }

    pub fn inputs(&self) -> impl Iterator<Item = &ArgumentSpec> {
        self.arguments.iter().filter(|arg| arg.is_data())
    }

    pub fn outputs(&self) -> impl Iterator<Item = &ArgumentSpec> {
        self.arguments.iter().filter(|arg| arg.is_output())
    }

    pub fn has_command(&self) -> bool {
        self.command.is_some()
    }
}
