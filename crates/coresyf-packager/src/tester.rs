use crate::examples::{load_examples, ExampleParseError, ToolExampleCommand};
use coresyf_tool::{run_process, ProcessError};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const SCIHUB_USER_VAR: &str = "SCIHUB_USER";
pub const SCIHUB_PASS_VAR: &str = "SCIHUB_PASS";

/// Why a single example did not pass
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TestFailure {
    #[error("exited with {code:?}: {stderr}")]
    NonZeroReturnCode { code: Option<i32>, stderr: String },

    #[error("wrote to stderr: {0}")]
    NonEmptyStderr(String),

    #[error("timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("could not be started: {0}")]
    LaunchFailed(String),
}

/// Copernicus SciHub credentials handed to examples through the environment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub user: Option<String>,
    pub pass: Option<String>,
}

impl Credentials {
    pub fn new(user: Option<String>, pass: Option<String>) -> Self {
        Credentials { user, pass }
    }

    fn apply(&self, command: &mut Command) {
        if let Some(ref user) = self.user {
            command.env(SCIHUB_USER_VAR, user);
        }
        if let Some(ref pass) = self.pass {
            command.env(SCIHUB_PASS_VAR, pass);
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExampleOutcome {
    pub example: ToolExampleCommand,
    pub stdout: String,
    pub failure: Option<TestFailure>,
}

impl ExampleOutcome {
    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }
}

/// Outcome of every example, in script order
#[derive(Debug, Clone, Default)]
pub struct TestReport {
    pub outcomes: Vec<ExampleOutcome>,
}

impl TestReport {
    pub fn failures(&self) -> Vec<&TestFailure> {
        self.outcomes
            .iter()
            .filter_map(|o| o.failure.as_ref())
            .collect()
    }

    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(ExampleOutcome::passed)
    }
}

impl fmt::Display for TestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let failed = self.failures().len();
        write!(
            f,
            "{} of {} example(s) failed",
            failed,
            self.outcomes.len()
        )
    }
}

/// Runs a bundle's examples one after another from the bundle directory
#[derive(Debug, Clone)]
pub struct ToolTester {
    tool_dir: PathBuf,
    examples: Vec<ToolExampleCommand>,
    credentials: Credentials,
    timeout: Option<Duration>,
}

impl ToolTester {
    pub fn new(tool_dir: &Path, examples_file: &str) -> Result<Self, ExampleParseError> {
        let examples = load_examples(&tool_dir.join(examples_file))?;
        debug!(
            "Loaded {} example(s) from {}",
            examples.len(),
            tool_dir.join(examples_file).display()
        );
        Ok(Self::with_examples(tool_dir, examples))
    }

    pub fn with_examples(tool_dir: &Path, examples: Vec<ToolExampleCommand>) -> Self {
        ToolTester {
            tool_dir: tool_dir.to_path_buf(),
            examples,
            credentials: Credentials::default(),
            timeout: None,
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn examples(&self) -> &[ToolExampleCommand] {
        &self.examples
    }

    /// Run every example; failures are collected, never fatal
    pub fn run_all(&self) -> TestReport {
        let mut report = TestReport::default();
        for example in &self.examples {
            info!("Running example '{}': {}", example.title, example);
            let outcome = self.run_example(example);
            if let Some(ref failure) = outcome.failure {
                warn!("Example '{}' failed: {}", example.title, failure);
            }
            report.outcomes.push(outcome);
        }
        report
    }

    fn run_example(&self, example: &ToolExampleCommand) -> ExampleOutcome {
        let mut outcome = ExampleOutcome {
            example: example.clone(),
            stdout: String::new(),
            failure: None,
        };
        let Some((program, args)) = example.command.split_first() else {
            outcome.failure = Some(TestFailure::LaunchFailed("empty command".to_string()));
            return outcome;
        };

        let mut command = Command::new(self.resolve_program(program));
        command.args(args).current_dir(&self.tool_dir);
        self.credentials.apply(&mut command);

        match run_process(command, self.timeout) {
            Ok(output) => {
                let success = output.success();
                let wrote_stderr = !output.stderr.is_empty();
                let stderr = output.stderr.trim_end().to_string();
                outcome.stdout = output.stdout;
                if !success {
                    outcome.failure = Some(TestFailure::NonZeroReturnCode {
                        code: output.code,
                        stderr,
                    });
                } else if wrote_stderr {
                    outcome.failure = Some(TestFailure::NonEmptyStderr(stderr));
                }
            }
            Err(ProcessError::Timeout(after)) => {
                outcome.failure = Some(TestFailure::Timeout(after));
            }
            Err(e) => outcome.failure = Some(TestFailure::LaunchFailed(e.to_string())),
        }
        outcome
    }

    /// `./run` style programs are relative to the bundle, not to our cwd
    fn resolve_program(&self, program: &str) -> PathBuf {
        let path = Path::new(program);
        if path.is_relative() && path.components().count() > 1 {
            self.tool_dir.join(path)
        } else {
            path.to_path_buf()
        }
    }
}
