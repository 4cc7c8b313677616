//! CoReSyF Tool Execution
//!
//! Turns a loaded [`Manifest`](coresyf_manifest::Manifest) into an executable
//! [`Tool`]: a command-line surface generated from its arguments, input
//! staging with transparent zip extraction, the command run through a shell,
//! output verification, and guaranteed removal of per-invocation scratch data.

pub mod binder;
pub mod errors;
pub mod outputs;
pub mod process;
pub mod scratch;
pub mod staging;
pub mod tool;

pub use binder::ArgumentBinder;
pub use errors::{BindError, InvocationState, OutputError, RunError, StagingError, ToolError};
pub use process::{run_process, CommandOutput, ProcessError, ShellRunner};
pub use scratch::ScratchDir;
pub use staging::Rebinding;
pub use tool::{ExecutionSettings, InvocationReport, RunContext, Tool, ToolLogic};
