//! Tool lifecycle
//!
//! An invocation moves through `parsed -> inputs_staged -> running ->
//! outputs_checked -> cleaned`. Staging, run and output failures end in the
//! matching error state. The scratch directory is removed on every path.

use crate::binder::ArgumentBinder;
use crate::errors::{InvocationState, RunError, ToolError};
use crate::outputs::check_outputs;
use crate::process::{CommandOutput, ShellRunner};
use crate::scratch::ScratchDir;
use crate::staging::{stage_inputs, Rebinding};
use coresyf_config::{Config, ConfigError};
use coresyf_manifest::{Bindings, CommandTemplate, Manifest, ManifestError};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Where and how invocations run
#[derive(Debug, Clone)]
pub struct ExecutionSettings {
    pub scratch_root: PathBuf,
    pub shell: PathBuf,
    pub timeout: Option<Duration>,
}

impl ExecutionSettings {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(ExecutionSettings {
            scratch_root: config.scratch_root(),
            shell: config.resolve_shell()?,
            timeout: config.command_timeout(),
        })
    }

    pub fn with_scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = root.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn shell_runner(&self) -> ShellRunner {
        ShellRunner::new(&self.shell).with_timeout(self.timeout)
    }
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        ExecutionSettings {
            scratch_root: std::env::temp_dir(),
            shell: PathBuf::from(coresyf_config::DEFAULT_SHELL),
            timeout: None,
        }
    }
}

/// What a custom-logic tool sees while running
pub struct RunContext<'a> {
    manifest: &'a Manifest,
    bindings: &'a Bindings,
    scratch: &'a Path,
    shell: ShellRunner,
    outputs: Vec<CommandOutput>,
}

impl<'a> RunContext<'a> {
    pub fn manifest(&self) -> &'a Manifest {
        self.manifest
    }

    pub fn bindings(&self) -> &'a Bindings {
        self.bindings
    }

    /// Private directory of this invocation, removed when it ends
    pub fn scratch_dir(&self) -> &'a Path {
        self.scratch
    }

    /// Render `template` with `bindings` and run it through the shell.
    /// Placeholders may name any manifest argument, bound or not, and any
    /// extra key of `bindings`. A non-zero exit is returned as
    /// [`RunError::NonZeroExit`].
    pub fn invoke_shell_command(
        &mut self,
        template: &str,
        bindings: &Bindings,
    ) -> Result<CommandOutput, RunError> {
        let known: Vec<&str> = self.manifest.identifiers().chain(bindings.keys()).collect();
        let template = CommandTemplate::compile(template, known)?;
        let rendered = template.render(bindings)?;
        let output = run_rendered(&self.shell, &rendered)?;
        self.outputs.push(output.clone());
        Ok(output)
    }
}

/// Execution logic for tools that do more than run one command template
pub trait ToolLogic {
    fn run(&mut self, ctx: &mut RunContext<'_>) -> Result<(), RunError>;
}

impl<F> ToolLogic for F
where
    F: FnMut(&mut RunContext<'_>) -> Result<(), RunError>,
{
    fn run(&mut self, ctx: &mut RunContext<'_>) -> Result<(), RunError> {
        self(ctx)
    }
}

enum Runner {
    Templated(CommandTemplate),
    Custom(Box<dyn ToolLogic>),
}

/// Result of a successful invocation
#[derive(Debug, Clone)]
pub struct InvocationReport {
    pub tool: String,
    pub state: InvocationState,
    pub history: Vec<InvocationState>,
    /// Bindings as the tool ran with them, after staging
    pub bindings: Bindings,
    pub rebindings: Vec<Rebinding>,
    pub rendered_command: Option<String>,
    /// Captured output of every shell command run, in order
    pub outputs: Vec<CommandOutput>,
}

impl InvocationReport {
    fn new(tool: &str, bindings: Bindings) -> Self {
        let mut report = InvocationReport {
            tool: tool.to_string(),
            state: InvocationState::Parsed,
            history: Vec::new(),
            bindings,
            rebindings: Vec::new(),
            rendered_command: None,
            outputs: Vec::new(),
        };
        report.transition(InvocationState::Parsed);
        report
    }

    fn transition(&mut self, state: InvocationState) {
        if state.is_failure() {
            warn!("[{}] -> {}", self.tool, state);
        } else {
            debug!("[{}] -> {}", self.tool, state);
        }
        self.state = state;
        self.history.push(state);
    }

    pub fn stdout(&self) -> String {
        self.outputs.iter().map(|o| o.stdout.as_str()).collect()
    }

    pub fn stderr(&self) -> String {
        self.outputs.iter().map(|o| o.stderr.as_str()).collect()
    }
}

/// A manifest-described tool ready to be invoked
pub struct Tool {
    manifest: Manifest,
    binder: ArgumentBinder,
    runner: Runner,
    settings: ExecutionSettings,
}

impl Tool {
    /// Build a tool that runs the manifest's command template.
    /// The template is validated here, before any invocation.
    pub fn new(manifest: Manifest, settings: ExecutionSettings) -> Result<Self, ManifestError> {
        let template = manifest
            .compile_command(true)?
            .ok_or_else(|| ManifestError::MissingCommand(manifest.name.clone()))?;
        Ok(Self::build(manifest, Runner::Templated(template), settings))
    }

    /// Build a tool whose running phase is `logic`. A command template, if
    /// present, is still validated.
    pub fn with_logic(
        manifest: Manifest,
        settings: ExecutionSettings,
        logic: impl ToolLogic + 'static,
    ) -> Result<Self, ManifestError> {
        manifest.compile_command(false)?;
        Ok(Self::build(manifest, Runner::Custom(Box::new(logic)), settings))
    }

    pub fn load(manifest_path: &Path, settings: ExecutionSettings) -> Result<Self, ManifestError> {
        Self::new(Manifest::load(manifest_path)?, settings)
    }

    fn build(manifest: Manifest, runner: Runner, settings: ExecutionSettings) -> Self {
        let binder = ArgumentBinder::new(&manifest);
        Tool {
            manifest,
            binder,
            runner,
            settings,
        }
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn binder(&self) -> &ArgumentBinder {
        &self.binder
    }

    pub fn settings(&self) -> &ExecutionSettings {
        &self.settings
    }

    /// Bind `argv` and run the full lifecycle
    pub fn execute<I, T>(&mut self, argv: I) -> Result<InvocationReport, ToolError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let bindings = self.binder.bind(argv)?;
        self.invoke(bindings)
    }

    /// Run the lifecycle for already-bound arguments
    pub fn invoke(&mut self, bindings: Bindings) -> Result<InvocationReport, ToolError> {
        info!("Executing '{}'", self.manifest.name);
        let mut report = InvocationReport::new(&self.manifest.name, bindings);

        let scratch =
            ScratchDir::create_in(&self.settings.scratch_root).map_err(ToolError::Scratch)?;
        let outcome = self.run_phases(scratch.path(), &mut report);
        let cleanup = scratch.close();

        match (outcome, cleanup) {
            (Ok(()), Ok(())) => {
                report.transition(InvocationState::Cleaned);
                Ok(report)
            }
            (Ok(()), Err(e)) => Err(ToolError::Scratch(e)),
            (Err(e), cleanup) => {
                if let Err(cleanup_err) = cleanup {
                    warn!("Failed to remove scratch directory: {}", cleanup_err);
                }
                Err(e)
            }
        }
    }

    fn run_phases(&mut self, scratch: &Path, report: &mut InvocationReport) -> Result<(), ToolError> {
        info!("Preparing inputs");
        match stage_inputs(&self.manifest, &mut report.bindings, scratch) {
            Ok(rebindings) => report.rebindings = rebindings,
            Err(e) => {
                report.transition(InvocationState::InputError);
                return Err(e.into());
            }
        }
        report.transition(InvocationState::InputsStaged);

        info!("Running");
        report.transition(InvocationState::Running);
        if let Err(e) = self.run(scratch, report) {
            report.transition(InvocationState::RunError);
            return Err(e.into());
        }

        if let Err(e) = check_outputs(&self.manifest, &report.bindings) {
            report.transition(InvocationState::OutputError);
            return Err(e.into());
        }
        report.transition(InvocationState::OutputsChecked);

        info!("Cleaning temporary data");
        Ok(())
    }

    fn run(&mut self, scratch: &Path, report: &mut InvocationReport) -> Result<(), RunError> {
        let shell = self.settings.shell_runner();
        match self.runner {
            Runner::Templated(ref template) => {
                let rendered = template.render(&report.bindings)?;
                report.rendered_command = Some(rendered.clone());
                let output = run_rendered(&shell, &rendered)?;
                report.outputs.push(output);
                Ok(())
            }
            Runner::Custom(ref mut logic) => {
                let mut ctx = RunContext {
                    manifest: &self.manifest,
                    bindings: &report.bindings,
                    scratch,
                    shell,
                    outputs: Vec::new(),
                };
                let result = logic.run(&mut ctx);
                let outputs = ctx.outputs;
                report.outputs.extend(outputs);
                result
            }
        }
    }
}

fn run_rendered(shell: &ShellRunner, rendered: &str) -> Result<CommandOutput, RunError> {
    info!("Running: {}", rendered);
    let output = shell.run(rendered)?;
    if !output.stdout.is_empty() {
        debug!("stdout:\n{}", output.stdout.trim_end());
    }
    if !output.stderr.is_empty() {
        debug!("stderr:\n{}", output.stderr.trim_end());
    }
    if !output.success() {
        return Err(RunError::NonZeroExit {
            code: output.code,
            stderr: output.stderr,
        });
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{OutputError, StagingError};
    use coresyf_manifest::BindingValue;
    use serde_json::json;
    use std::cell::RefCell;
    use std::fs::{self, File};
    use std::io::Write;
    use std::rc::Rc;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    struct Fixture {
        dir: TempDir,
        scratch_root: PathBuf,
    }

    impl Fixture {
        fn new() -> Option<Self> {
            let dir = TempDir::new().ok()?;
            let scratch_root = dir.path().join("scratch");
            Some(Fixture { dir, scratch_root })
        }

        fn path(&self, name: &str) -> String {
            self.dir.path().join(name).to_string_lossy().into_owned()
        }

        fn settings(&self) -> ExecutionSettings {
            ExecutionSettings::default().with_scratch_root(&self.scratch_root)
        }

        fn scratch_is_empty(&self) -> bool {
            fs::read_dir(&self.scratch_root).map_or(true, |mut d| d.next().is_none())
        }
    }

    fn manifest(command: Option<&str>) -> Option<Manifest> {
        let mut value = json!({
            "name": "dummy tool",
            "arguments": [
                {"identifier": "input", "name": "input", "description": "description", "type": "data"},
                {"identifier": "output", "name": "output", "description": "description", "type": "output"},
                {"identifier": "param", "name": "param", "description": "description",
                 "type": "parameter", "parameterType": "string"}
            ]
        });
        if let Some(command) = command {
            value["command"] = json!(command);
        }
        let manifest = Manifest::from_value(value);
        assert!(manifest.is_ok());
        manifest.ok()
    }

    fn argv(input: &str, output: &str) -> Vec<String> {
        vec![
            "--input".to_string(),
            input.to_string(),
            "--output".to_string(),
            output.to_string(),
            "--param".to_string(),
            "astr".to_string(),
        ]
    }

    /// Custom logic that copies the input's text into the output file
    fn copy_logic(seen: Rc<RefCell<String>>) -> impl ToolLogic {
        move |ctx: &mut RunContext<'_>| {
            let input = ctx.bindings().paths("input").remove(0);
            let text = fs::read_to_string(&input).map_err(|e| RunError::Failed(e.to_string()))?;
            *seen.borrow_mut() = text.clone();
            let output = ctx.bindings().paths("output").remove(0);
            fs::write(output, text).map_err(|e| RunError::Failed(e.to_string()))
        }
    }

    #[test]
    fn test_nominal_execution() {
        let (Some(fx), Some(manifest)) = (Fixture::new(), manifest(None)) else {
            return;
        };
        assert!(fs::write(fx.path("f1"), "input").is_ok());
        let seen = Rc::new(RefCell::new(String::new()));
        let built = Tool::with_logic(manifest, fx.settings(), copy_logic(seen.clone()));
        assert!(built.is_ok());
        let Ok(mut tool) = built else {
            return;
        };

        let result = tool.execute(argv(&fx.path("f1"), &fx.path("f2")));
        assert!(result.is_ok());
        let Ok(report) = result else {
            return;
        };
        assert_eq!(report.bindings.len(), 3);
        assert_eq!(report.bindings.scalar("input"), Some(fx.path("f1").as_str()));
        assert_eq!(report.bindings.scalar("param"), Some("astr"));
        assert_eq!(report.state, InvocationState::Cleaned);
        assert_eq!(
            report.history,
            [
                InvocationState::Parsed,
                InvocationState::InputsStaged,
                InvocationState::Running,
                InvocationState::OutputsChecked,
                InvocationState::Cleaned,
            ]
        );
        assert_eq!(*seen.borrow(), "input");
        assert!(fx.scratch_is_empty());
    }

    #[test]
    fn test_non_existent_input() {
        let (Some(fx), Some(manifest)) = (Fixture::new(), manifest(None)) else {
            return;
        };
        let seen = Rc::new(RefCell::new(String::new()));
        let built = Tool::with_logic(manifest, fx.settings(), copy_logic(seen.clone()));
        assert!(built.is_ok());
        let Ok(mut tool) = built else {
            return;
        };
        let result = tool.execute(argv(&fx.path("f"), &fx.path("f2")));
        assert!(matches!(
            result,
            Err(ToolError::Staging(StagingError::InputNotFound { .. }))
        ));
        assert!(result.is_err_and(|e| e.state() == Some(InvocationState::InputError)));
        assert!(seen.borrow().is_empty());
        assert!(fx.scratch_is_empty());
    }

    #[test]
    fn test_zip_input() {
        let (Some(fx), Some(manifest)) = (Fixture::new(), manifest(None)) else {
            return;
        };
        let Ok(file) = File::create(fx.path("f1.zip")) else {
            return;
        };
        let mut writer = ZipWriter::new(file);
        assert!(writer.start_file("f1", SimpleFileOptions::default()).is_ok());
        assert!(writer.write_all(b"input").is_ok());
        assert!(writer.finish().is_ok());

        let seen = Rc::new(RefCell::new(String::new()));
        let built = Tool::with_logic(manifest, fx.settings(), copy_logic(seen.clone()));
        assert!(built.is_ok());
        let Ok(mut tool) = built else {
            return;
        };
        let result = tool.execute(argv(&fx.path("f1.zip"), &fx.path("f2")));
        assert!(result.is_ok_and(|r| r.rebindings.len() == 1));
        assert_eq!(*seen.borrow(), "input");
        assert!(fx.scratch_is_empty());
    }

    #[test]
    fn test_empty_zip_input() {
        let (Some(fx), Some(manifest)) = (Fixture::new(), manifest(None)) else {
            return;
        };
        let Ok(file) = File::create(fx.path("f1.zip")) else {
            return;
        };
        assert!(ZipWriter::new(file).finish().is_ok());

        let seen = Rc::new(RefCell::new(String::new()));
        let built = Tool::with_logic(manifest, fx.settings(), copy_logic(seen.clone()));
        assert!(built.is_ok());
        let Ok(mut tool) = built else {
            return;
        };
        let result = tool.execute(argv(&fx.path("f1.zip"), &fx.path("f2")));
        assert!(matches!(
            result,
            Err(ToolError::Staging(StagingError::EmptyArchive(_)))
        ));
        assert!(fx.scratch_is_empty());
    }

    #[test]
    fn test_templated_run_and_output_checks() {
        let (Some(fx), Some(manifest)) = (Fixture::new(), manifest(Some("cp {input} {output}")))
        else {
            return;
        };
        assert!(fs::write(fx.path("in put.txt"), "payload").is_ok());
        let built = Tool::new(manifest, fx.settings());
        assert!(built.is_ok());
        let Ok(mut tool) = built else {
            return;
        };

        let result = tool.execute(argv(&fx.path("in put.txt"), &fx.path("out.txt")));
        assert!(result.is_ok_and(|r| r.rendered_command.is_some()));
        assert_eq!(
            fs::read_to_string(fx.path("out.txt")).unwrap_or_default(),
            "payload"
        );
        assert!(fx.scratch_is_empty());
    }

    #[test]
    fn test_missing_output() {
        let (Some(fx), Some(manifest)) = (Fixture::new(), manifest(Some("true {input} {output}")))
        else {
            return;
        };
        assert!(fs::write(fx.path("f1"), "input").is_ok());
        let built = Tool::new(manifest, fx.settings());
        assert!(built.is_ok());
        let Ok(mut tool) = built else {
            return;
        };
        let result = tool.execute(argv(&fx.path("f1"), &fx.path("never")));
        assert!(matches!(
            result,
            Err(ToolError::Output(OutputError::MissingOutputFile { .. }))
        ));
        assert!(fx.scratch_is_empty());
    }

    #[test]
    fn test_empty_output() {
        let (Some(fx), Some(manifest)) = (Fixture::new(), manifest(Some("touch {output} # {input}")))
        else {
            return;
        };
        assert!(fs::write(fx.path("f1"), "input").is_ok());
        let built = Tool::new(manifest, fx.settings());
        assert!(built.is_ok());
        let Ok(mut tool) = built else {
            return;
        };
        let result = tool.execute(argv(&fx.path("f1"), &fx.path("empty")));
        assert!(matches!(
            result,
            Err(ToolError::Output(OutputError::EmptyOutputFile { .. }))
        ));
        assert!(result.is_err_and(|e| e.state() == Some(InvocationState::OutputError)));
    }

    #[test]
    fn test_non_zero_exit() {
        let (Some(fx), Some(manifest)) = (
            Fixture::new(),
            manifest(Some("echo broken >&2; exit 4; echo {input} {output}")),
        ) else {
            return;
        };
        assert!(fs::write(fx.path("f1"), "input").is_ok());
        let built = Tool::new(manifest, fx.settings());
        assert!(built.is_ok());
        let Ok(mut tool) = built else {
            return;
        };
        let result = tool.execute(argv(&fx.path("f1"), &fx.path("f2")));
        assert!(matches!(
            result,
            Err(ToolError::Run(RunError::NonZeroExit { code: Some(4), ref stderr })) if stderr.contains("broken")
        ));
        assert!(fx.scratch_is_empty());
    }

    #[test]
    fn test_timeout() {
        let (Some(fx), Some(manifest)) = (Fixture::new(), manifest(Some("sleep 5; echo {input} {output}")))
        else {
            return;
        };
        assert!(fs::write(fx.path("f1"), "input").is_ok());
        let settings = fx.settings().with_timeout(Some(Duration::from_millis(200)));
        let built = Tool::new(manifest, settings);
        assert!(built.is_ok());
        let Ok(mut tool) = built else {
            return;
        };
        let result = tool.execute(argv(&fx.path("f1"), &fx.path("f2")));
        assert!(matches!(result, Err(ToolError::Run(RunError::Timeout(_)))));
    }

    #[test]
    fn test_construction_rejects_bad_templates() {
        let settings = ExecutionSettings::default();
        let Some(unknown) = manifest(Some("cp {input} {target}")) else {
            return;
        };
        assert!(matches!(
            Tool::new(unknown.clone(), settings.clone()),
            Err(ManifestError::Template(_))
        ));
        let noop = |_: &mut RunContext<'_>| -> Result<(), RunError> { Ok(()) };
        assert!(Tool::with_logic(unknown, settings.clone(), noop).is_err());

        let Some(no_output) = manifest(Some("cat {input}")) else {
            return;
        };
        assert!(matches!(
            Tool::new(no_output.clone(), settings.clone()),
            Err(ManifestError::MissingCommandPlaceholder(_))
        ));
        assert!(Tool::with_logic(no_output, settings.clone(), noop).is_ok());

        let Some(no_command) = manifest(None) else {
            return;
        };
        assert!(matches!(
            Tool::new(no_command, settings),
            Err(ManifestError::MissingCommand(_))
        ));
    }

    #[test]
    fn test_custom_logic_invokes_shell_commands() {
        let (Some(fx), Some(manifest)) = (Fixture::new(), manifest(None)) else {
            return;
        };
        assert!(fs::write(fx.path("f1"), "input").is_ok());
        let logic = |ctx: &mut RunContext<'_>| -> Result<(), RunError> {
            let bindings = ctx.bindings();
            let mut extra = bindings.clone();
            extra.insert(
                "tmp",
                BindingValue::Scalar(ctx.scratch_dir().join("t").to_string_lossy().into_owned()),
            );
            ctx.invoke_shell_command("cp {input} {tmp}", &extra)?;
            ctx.invoke_shell_command("cat {tmp} > {output}", &extra)?;
            Ok(())
        };
        let built = Tool::with_logic(manifest, fx.settings(), logic);
        assert!(built.is_ok());
        let Ok(mut tool) = built else {
            return;
        };
        let result = tool.execute(argv(&fx.path("f1"), &fx.path("f2")));
        assert!(result.is_ok_and(|r| r.outputs.len() == 2));
        assert_eq!(fs::read_to_string(fx.path("f2")).unwrap_or_default(), "input");
    }

    #[test]
    fn test_shell_command_with_unbound_optional_argument() {
        let Some(fx) = Fixture::new() else {
            return;
        };
        let parsed = Manifest::from_value(json!({
            "name": "noted copy",
            "arguments": [
                {"identifier": "input", "type": "data"},
                {"identifier": "output", "type": "output"},
                {"identifier": "note", "type": "parameter", "parameterType": "string", "required": false}
            ]
        }));
        assert!(parsed.is_ok());
        let Ok(manifest) = parsed else {
            return;
        };
        assert!(fs::write(fx.path("f1"), "input").is_ok());
        let logic = |ctx: &mut RunContext<'_>| -> Result<(), RunError> {
            let bindings = ctx.bindings();
            ctx.invoke_shell_command("cp {input} {output} {note}", bindings)?;
            Ok(())
        };
        let built = Tool::with_logic(manifest, fx.settings(), logic);
        assert!(built.is_ok());
        let Ok(mut tool) = built else {
            return;
        };
        let result = tool.execute(vec![
            "--input".to_string(),
            fx.path("f1"),
            "--output".to_string(),
            fx.path("f2"),
        ]);
        assert!(result.is_ok_and(|r| !r.bindings.contains("note")));
        assert_eq!(fs::read_to_string(fx.path("f2")).unwrap_or_default(), "input");
    }
}
