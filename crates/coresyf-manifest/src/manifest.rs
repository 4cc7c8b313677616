use crate::errors::ManifestError;
use crate::template::CommandTemplate;
use crate::types::{ArgumentKind, ArgumentSpec, Manifest, Multiplicity, ParameterType};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name suffix that marks a tool manifest inside a bundle
pub const MANIFEST_SUFFIX: &str = "manifest.json";

#[derive(Debug, Deserialize)]
struct RawManifest {
    name: Option<String>,
    description: Option<String>,
    arguments: Option<Vec<RawArgument>>,
    command: Option<String>,
    operation: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawArgument {
    identifier: Option<String>,
    name: Option<String>,
    description: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(rename = "parameterType")]
    parameter_type: Option<String>,
    required: Option<bool>,
    multiple: Option<bool>,
    default: Option<Value>,
    options: Option<Vec<String>>,
}

impl Manifest {
    /// Load and validate a manifest file
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        if !path.is_file() {
            return Err(ManifestError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let manifest = Self::from_json_str(&content)?;
        debug!(
            "Loaded manifest '{}' from {} ({} arguments)",
            manifest.name,
            path.display(),
            manifest.arguments.len()
        );
        Ok(manifest)
    }

    pub fn from_json_str(content: &str) -> Result<Self, ManifestError> {
        let value: Value = serde_json::from_str(content)?;
        Self::from_value(value)
    }

    /// Resolve an already-parsed JSON document into a typed manifest
    pub fn from_value(value: Value) -> Result<Self, ManifestError> {
        if !value.is_object() {
            return Err(ManifestError::schema("top level must be an object"));
        }
        let raw: RawManifest =
            serde_json::from_value(value).map_err(|e| ManifestError::schema(e.to_string()))?;

        let name = raw
            .name
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| ManifestError::schema("missing required field 'name'"))?;
        let raw_arguments = raw
            .arguments
            .ok_or_else(|| ManifestError::schema("missing required field 'arguments'"))?;

        let mut seen = HashSet::new();
        let mut arguments = Vec::with_capacity(raw_arguments.len());
        for (index, raw_arg) in raw_arguments.into_iter().enumerate() {
            let spec = resolve_argument(index, raw_arg)?;
            if !seen.insert(spec.identifier.clone()) {
                return Err(ManifestError::schema(format!(
                    "duplicate argument identifier '{}'",
                    spec.identifier
                )));
            }
            arguments.push(spec);
        }

        let operation = match raw.operation {
            None | Some(Value::Null) => None,
            Some(Value::Object(map)) => Some(map),
            Some(_) => return Err(ManifestError::schema("'operation' must be an object")),
        };

        Ok(Manifest {
            name,
            description: raw.description.unwrap_or_default(),
            arguments,
            command: raw.command,
            operation,
        })
    }

    /// Parse the command template and check it against this manifest.
    ///
    /// Returns `None` when the manifest has no command. With
    /// `require_outputs`, every output argument must be a placeholder.
    pub fn compile_command(
        &self,
        require_outputs: bool,
    ) -> Result<Option<CommandTemplate>, ManifestError> {
        let Some(ref source) = self.command else {
            return Ok(None);
        };

        let template = CommandTemplate::compile(source, self.identifiers())?;
        if require_outputs {
            if let Some(output) = self.outputs().find(|out| !template.references(&out.identifier)) {
                return Err(ManifestError::MissingCommandPlaceholder(
                    output.identifier.clone(),
                ));
            }
        }
        Ok(Some(template))
    }
}

fn resolve_argument(index: usize, raw: RawArgument) -> Result<ArgumentSpec, ManifestError> {
    let identifier = raw
        .identifier
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ManifestError::schema(format!("argument #{} has no 'identifier'", index)))?;

    let kind_name = raw.kind.ok_or_else(|| {
        ManifestError::schema(format!("argument '{}' has no 'type'", identifier))
    })?;

    let kind = match kind_name.as_str() {
        "data" => ArgumentKind::Data,
        "output" => ArgumentKind::Output,
        "parameter" => {
            let declared = raw.parameter_type.ok_or_else(|| {
                ManifestError::schema(format!(
                    "parameter '{}' has no 'parameterType'",
                    identifier
                ))
            })?;
            let ty = declared
                .parse::<ParameterType>()
                .map_err(|e| ManifestError::schema(format!("argument '{}': {}", identifier, e)))?;
            ArgumentKind::Parameter(ty)
        }
        other => {
            return Err(ManifestError::schema(format!(
                "argument '{}' has unknown type '{}'",
                identifier, other
            )))
        }
    };

    let options = raw.options.unwrap_or_default();
    if kind == ArgumentKind::Parameter(ParameterType::Enum) && options.is_empty() {
        return Err(ManifestError::schema(format!(
            "enum parameter '{}' needs a non-empty 'options' list",
            identifier
        )));
    }

    let default = match raw.default {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(Value::Bool(b)) => Some(b.to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(_) => {
            return Err(ManifestError::schema(format!(
                "default of '{}' must be a string, number or boolean",
                identifier
            )))
        }
    };

    let multiplicity = if raw.multiple.unwrap_or(false) {
        Multiplicity::Multiple
    } else {
        Multiplicity::Single
    };

    Ok(ArgumentSpec {
        name: raw.name.unwrap_or_else(|| identifier.clone()),
        description: raw.description.unwrap_or_else(|| identifier.clone()),
        identifier,
        kind,
        multiplicity,
        required: raw.required,
        default,
        options,
    })
}

/// Every file in `dir` whose name ends in `manifest.json`, sorted
pub fn find_manifest_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_manifest = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(MANIFEST_SUFFIX));
        if is_manifest && path.is_file() {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}
