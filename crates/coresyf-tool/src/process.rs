//! Child process execution with captured output and an optional timeout

use std::io::{self, Read};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Error waiting for process: {0}")]
    Wait(io::Error),

    #[error("Process timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

/// Exit status and captured streams of a finished child
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the child was terminated by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

fn drain<R: Read + Send + 'static>(source: Option<R>) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        if let Some(mut reader) = source {
            let _ = reader.read_to_end(&mut buffer);
        }
        buffer
    })
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<ExitStatus, ProcessError> {
    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) if start.elapsed() >= timeout => {
                warn!("Killing process group {} after {:?}", child.id(), timeout);
                kill_process_group(child);
                let _ = child.wait();
                return Err(ProcessError::Timeout(timeout));
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => return Err(ProcessError::Wait(e)),
        }
    }
}

/// The child leads its own process group when it runs under a timeout, so
/// everything it started goes down with it
fn kill_process_group(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        if let Ok(pgid) = i32::try_from(child.id()) {
            if killpg(Pid::from_raw(pgid), Signal::SIGKILL).is_ok() {
                return;
            }
        }
    }
    let _ = child.kill();
}

/// Run a command to completion, capturing stdout and stderr separately.
///
/// With a timeout the child and its process group are killed once it
/// expires. Reader threads are not joined in that case.
pub fn run_process(
    mut command: Command,
    timeout: Option<Duration>,
) -> Result<CommandOutput, ProcessError> {
    let program = command.get_program().to_string_lossy().into_owned();
    debug!("Spawning {:?}", command);

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        if timeout.is_some() {
            command.process_group(0);
        }
    }

    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| ProcessError::Spawn {
            program: program.clone(),
            source,
        })?;

    let stdout_handle = drain(child.stdout.take());
    let stderr_handle = drain(child.stderr.take());

    let status = match timeout {
        Some(limit) => wait_with_timeout(&mut child, limit)?,
        None => child.wait().map_err(ProcessError::Wait)?,
    };

    let stdout = stdout_handle.join().unwrap_or_default();
    let stderr = stderr_handle.join().unwrap_or_default();

    let output = CommandOutput {
        code: status.code(),
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
    };
    debug!("'{}' finished with {:?}", program, output.code);
    Ok(output)
}

/// Runs command lines through `<shell> -c`
#[derive(Debug, Clone)]
pub struct ShellRunner {
    shell: PathBuf,
    timeout: Option<Duration>,
}

impl ShellRunner {
    pub fn new(shell: impl Into<PathBuf>) -> Self {
        ShellRunner {
            shell: shell.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn run(&self, command_line: &str) -> Result<CommandOutput, ProcessError> {
        let mut command = Command::new(&self.shell);
        command.arg("-c").arg(command_line);
        run_process(command, self.timeout)
    }
}

impl Default for ShellRunner {
    fn default() -> Self {
        ShellRunner::new(coresyf_config::DEFAULT_SHELL)
    }
}
