//! Command templates
//!
//! A template such as `gdal_translate {input} {output}` is parsed once into
//! literal and placeholder segments. Placeholders are checked against the
//! manifest's identifiers when the tool is built, so an unknown name is a
//! load-time error. Rendering quotes every bound value for a POSIX shell.
//!
//! `{{` and `}}` stand for literal braces.

use crate::bindings::Bindings;
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("Unclosed placeholder starting at offset {0}")]
    Unclosed(usize),

    #[error("Unmatched '}}' at offset {0}")]
    UnmatchedBrace(usize),

    #[error("Empty placeholder at offset {0}")]
    EmptyPlaceholder(usize),

    #[error("Placeholder '{name}' at offset {offset} contains whitespace")]
    InvalidPlaceholder { offset: usize, name: String },

    #[error("Unexpected command placeholder '{0}'")]
    UnexpectedCommandPlaceholder(String),

    #[error("Value bound to '{identifier}' cannot be quoted for the shell: {value:?}")]
    Unquotable { identifier: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Placeholder(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl CommandTemplate {
    /// Split a template into segments without checking placeholder names
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((offset, c)) = chars.next() {
            match c {
                '{' if chars.peek().is_some_and(|&(_, next)| next == '{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek().is_some_and(|&(_, next)| next == '}') => {
                    chars.next();
                    literal.push('}');
                }
                '}' => return Err(TemplateError::UnmatchedBrace(offset)),
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for (_, inner) in chars.by_ref() {
                        if inner == '}' {
                            closed = true;
                            break;
                        }
                        if inner == '{' {
                            return Err(TemplateError::Unclosed(offset));
                        }
                        name.push(inner);
                    }
                    if !closed {
                        return Err(TemplateError::Unclosed(offset));
                    }
                    if name.is_empty() {
                        return Err(TemplateError::EmptyPlaceholder(offset));
                    }
                    if name.chars().any(char::is_whitespace) {
                        return Err(TemplateError::InvalidPlaceholder { offset, name });
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder(name));
                }
                other => literal.push(other),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(CommandTemplate {
            source: source.to_string(),
            segments,
        })
    }

    /// Parse and check every placeholder against the known identifiers
    pub fn compile<'a, I>(source: &str, known_identifiers: I) -> Result<Self, TemplateError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let template = Self::parse(source)?;
        let known: BTreeSet<&str> = known_identifiers.into_iter().collect();
        for placeholder in template.placeholders() {
            if !known.contains(placeholder.as_str()) {
                return Err(TemplateError::UnexpectedCommandPlaceholder(placeholder));
            }
        }
        Ok(template)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Distinct placeholder names
    pub fn placeholders(&self) -> BTreeSet<String> {
        self.segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Placeholder(name) => Some(name.clone()),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    pub fn references(&self, identifier: &str) -> bool {
        self.segments
            .iter()
            .any(|segment| matches!(segment, Segment::Placeholder(name) if name == identifier))
    }

    /// Substitute bindings into the template.
    ///
    /// Each value becomes one shell-quoted token; sequences expand to
    /// space-separated tokens in argument order. A placeholder whose
    /// argument is unbound renders as nothing.
    pub fn render(&self, bindings: &Bindings) -> Result<String, TemplateError> {
        let mut rendered = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => rendered.push_str(text),
                Segment::Placeholder(name) => {
                    let Some(value) = bindings.get(name) else {
                        debug!("Placeholder '{}' has no binding, rendering empty", name);
                        continue;
                    };
                    let mut tokens = Vec::with_capacity(value.values().len());
                    for item in value.values() {
                        let quoted =
                            shlex::try_quote(item).map_err(|_| TemplateError::Unquotable {
                                identifier: name.clone(),
                                value: item.clone(),
                            })?;
                        tokens.push(quoted.into_owned());
                    }
                    rendered.push_str(&tokens.join(" "));
                }
            }
        }
        Ok(rendered)
    }
}

/// Check a template against the known identifiers, returning its placeholders
pub fn validate<'a, I>(template: &str, known_identifiers: I) -> Result<BTreeSet<String>, TemplateError>
where
    I: IntoIterator<Item = &'a str>,
{
    CommandTemplate::compile(template, known_identifiers).map(|t| t.placeholders())
}
