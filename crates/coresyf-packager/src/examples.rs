//! Examples script parsing
//!
//! An examples script documents a tool by sample invocations:
//!
//! ```text
//! # Crop an image
//! # Cuts the bounding box out of a GeoTIFF and writes it
//! # next to the input.
//! ./run --input image.tif --output crop.tif --bbox "0 0 10 10"
//! ```
//!
//! The first comment after a command (or the start of the file) is the
//! title; the following comments form the description. Each command needs
//! both.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExampleParseError {
    #[error("Example command on line {line} has no title comment")]
    TitleMissing { line: usize },

    #[error("Example command on line {line} has no description comment")]
    DescriptionMissing { line: usize },

    #[error("Cannot tokenize example command on line {line}: {text}")]
    InvalidCommand { line: usize, text: String },

    #[error("Failed to read examples file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolExampleCommand {
    pub title: String,
    pub description: String,
    /// argv, program first
    pub command: Vec<String>,
    /// 1-based line of the command in the script
    pub line: usize,
}

impl fmt::Display for ToolExampleCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command.join(" "))
    }
}

pub fn load_examples(path: &Path) -> Result<Vec<ToolExampleCommand>, ExampleParseError> {
    let content = fs::read_to_string(path).map_err(|source| ExampleParseError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_examples(&content)
}

pub fn parse_examples(content: &str) -> Result<Vec<ToolExampleCommand>, ExampleParseError> {
    let mut examples = Vec::new();
    let mut title: Option<String> = None;
    let mut description: Vec<String> = Vec::new();

    for (index, raw_line) in content.lines().enumerate() {
        let line_number = index + 1;
        let line = raw_line.trim();

        if line.is_empty() || (index == 0 && line.starts_with("#!")) {
            continue;
        }

        if let Some(comment) = line.strip_prefix('#') {
            let text = comment.trim();
            if text.is_empty() {
                continue;
            }
            if title.is_none() {
                title = Some(text.to_string());
            } else {
                description.push(text.to_string());
            }
            continue;
        }

        let Some(title_text) = title.take() else {
            return Err(ExampleParseError::TitleMissing { line: line_number });
        };
        if description.is_empty() {
            return Err(ExampleParseError::DescriptionMissing { line: line_number });
        }
        let command = match shlex::split(line) {
            Some(tokens) if !tokens.is_empty() => tokens,
            _ => {
                return Err(ExampleParseError::InvalidCommand {
                    line: line_number,
                    text: line.to_string(),
                })
            }
        };

        examples.push(ToolExampleCommand {
            title: title_text,
            description: description.join(" "),
            command,
            line: line_number,
        });
        description.clear();
    }

    Ok(examples)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_two_examples() {
        let script = "#!/bin/bash\n\
                      # Copy\n\
                      # Copies the sample file\n\
                      #   into a new one.\n\
                      ./run --input 'sample file.tif' --output out.tif\n\
                      \n\
                      # Stack\n\
                      # Builds a cube\n\
                      ./run --inputs a.nc b.nc\n";
        let result = parse_examples(script);
        assert!(result.is_ok());
        let Ok(examples) = result else {
            return;
        };
        assert_eq!(examples.len(), 2);
        assert_eq!(examples[0].title, "Copy");
        assert_eq!(examples[0].description, "Copies the sample file into a new one.");
        assert_eq!(
            examples[0].command,
            ["./run", "--input", "sample file.tif", "--output", "out.tif"]
        );
        assert_eq!(examples[0].line, 5);
        assert_eq!(examples[1].title, "Stack");
        assert_eq!(examples[1].line, 9);
    }

    #[test]
    fn test_command_before_title() {
        let script = "./run --input a\n# Title\n# Description\n./run --input b\n";
        assert!(matches!(
            parse_examples(script),
            Err(ExampleParseError::TitleMissing { line: 1 })
        ));
    }

    #[test]
    fn test_title_and_description_reset_after_command() {
        let script = "# Title\n# Description\n./run a\n# Only a title\n./run b\n";
        assert!(matches!(
            parse_examples(script),
            Err(ExampleParseError::DescriptionMissing { line: 5 })
        ));
    }

    #[test]
    fn test_unbalanced_quotes() {
        let script = "# Title\n# Description\n./run --input 'open\n";
        assert!(matches!(
            parse_examples(script),
            Err(ExampleParseError::InvalidCommand { line: 3, .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            load_examples(Path::new("/nonexistent/examples.sh")),
            Err(ExampleParseError::Io { .. })
        ));
    }
}
