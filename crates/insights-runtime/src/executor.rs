use crate::engine::EngineBinding;
use crate::RuntimeError;
use std::process::{Command, Output, Stdio};
use tracing::debug;

/// One engine call: the arguments after the engine program, plus whether the
/// recovery policy may retry it once on failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    args: Vec<String>,
    retry: bool,
}

impl CommandInvocation {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            retry: false,
        }
    }

    #[must_use]
    pub fn with_retry(mut self) -> Self {
        self.retry = true;
        self
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn retry(&self) -> bool {
        self.retry
    }

    /// The engine subcommand (`ps`, `run`, `exec`, ...), if any.
    pub fn subcommand(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }

    /// Human-readable form for logs and error messages. Not suitable for a shell.
    pub fn render(&self, program: &str) -> String {
        let mut out = program.to_owned();
        for arg in &self.args {
            out.push(' ');
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                out.push('\'');
                out.push_str(arg);
                out.push('\'');
            } else {
                out.push_str(arg);
            }
        }
        out
    }
}

/// A single, synchronous attempt at running an engine command.
///
/// Returns the trimmed combined stdout/stderr on success. Implementations must
/// not retry; that is the job of [`crate::recovery::execute`].
pub trait CommandRunner: Send + Sync {
    fn run(&self, invocation: &CommandInvocation) -> Result<String, RuntimeError>;
}

/// Runs invocations by spawning the bound engine directly, without a host shell.
pub struct ProcessRunner<'a> {
    engine: &'a EngineBinding,
}

impl<'a> ProcessRunner<'a> {
    pub fn new(engine: &'a EngineBinding) -> Self {
        Self { engine }
    }
}

impl CommandRunner for ProcessRunner<'_> {
    fn run(&self, invocation: &CommandInvocation) -> Result<String, RuntimeError> {
        let rendered = invocation.render(self.engine.program());
        debug!("executing: {rendered}");

        let result = Command::new(self.engine.program())
            .args(invocation.args())
            .stdin(Stdio::null())
            .output();

        let output = match result {
            Ok(o) => o,
            Err(e) => {
                return Err(RuntimeError::ExecFailed {
                    command: rendered,
                    reason: format!("failed to spawn: {e}"),
                    output: String::new(),
                })
            }
        };

        let text = combined_output(&output);
        debug!("output of `{rendered}`: {text}");

        if output.status.success() {
            Ok(text)
        } else {
            debug!("`{rendered}` exited with {}", output.status);
            Err(RuntimeError::ExecFailed {
                command: rendered,
                reason: output.status.to_string(),
                output: text,
            })
        }
    }
}

fn combined_output(output: &Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = stdout.trim();
    let stderr = stderr.trim();
    match (stdout.is_empty(), stderr.is_empty()) {
        (_, true) => stdout.to_owned(),
        (true, false) => stderr.to_owned(),
        (false, false) => format!("{stdout}\n{stderr}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invocation_defaults_to_no_retry() {
        let inv = CommandInvocation::new(["logs", "terasky-insights"]);
        assert!(!inv.retry());
        assert!(inv.with_retry().retry());
    }

    #[test]
    fn render_quotes_arguments_with_spaces() {
        let inv = CommandInvocation::new(["exec", "box", "/bin/sh", "-c", "echo 1"]);
        assert_eq!(inv.render("docker"), "docker exec box /bin/sh -c 'echo 1'");
    }

    #[test]
    fn subcommand_is_first_arg() {
        let inv = CommandInvocation::new(["ps", "-a"]);
        assert_eq!(inv.subcommand(), Some("ps"));
        assert_eq!(CommandInvocation::new(Vec::<String>::new()).subcommand(), None);
    }

    #[test]
    fn spawn_failure_is_exec_failed() {
        let engine = EngineBinding::new("/nonexistent/engine-binary");
        let runner = ProcessRunner::new(&engine);
        let err = runner
            .run(&CommandInvocation::new(["ps"]))
            .unwrap_err();
        match err {
            RuntimeError::ExecFailed { command, reason, .. } => {
                assert_eq!(command, "/nonexistent/engine-binary ps");
                assert!(reason.contains("failed to spawn"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn captures_trimmed_combined_output() {
        let engine = EngineBinding::new("sh");
        let runner = ProcessRunner::new(&engine);
        let out = runner
            .run(&CommandInvocation::new(["-c", "echo '  out  '; echo err >&2"]))
            .unwrap();
        assert_eq!(out, "out\nerr");
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_keeps_partial_output() {
        let engine = EngineBinding::new("sh");
        let runner = ProcessRunner::new(&engine);
        let err = runner
            .run(&CommandInvocation::new(["-c", "echo partial; exit 3"]))
            .unwrap_err();
        match err {
            RuntimeError::ExecFailed { output, reason, .. } => {
                assert_eq!(output, "partial");
                assert!(reason.contains('3'));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
