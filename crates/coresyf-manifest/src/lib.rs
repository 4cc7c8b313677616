//! CoReSyF Tool Manifests
//!
//! A tool is described by a single JSON manifest: its name, the arguments it
//! takes (input data, outputs and typed parameters) and, usually, a shell
//! command template that runs it. This crate resolves that document into a
//! typed [`Manifest`], parses and validates the command template, and holds
//! the per-invocation [`Bindings`] the template is rendered with.

pub mod bindings;
pub mod errors;
pub mod manifest;
pub mod template;
pub mod types;

pub use bindings::{BindingValue, Bindings};
pub use errors::ManifestError;
pub use manifest::{find_manifest_files, MANIFEST_SUFFIX};
pub use template::{validate, CommandTemplate, Segment, TemplateError};
pub use types::{ArgumentKind, ArgumentSpec, Manifest, Multiplicity, ParameterType};
