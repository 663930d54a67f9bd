//! # Command Execution
//!
//! [`CommandRunner`] is the seam between the deployer and the operating
//! system. Production code uses [`SystemRunner`]; tests substitute a scripted
//! runner. Every call blocks until the child process exits.
//!
//! [`execute`] turns a raw [`CommandOutput`] into either the tool's standard
//! output or a classified [`ExternalError`].

use std::process::Command;

use capd_core::{ExternalError, FailureClassifier, FailureKind};

use crate::invocation::Invocation;

/// Structured result of one external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit status; `None` if the process was terminated by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// A successful run producing `stdout`.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            status: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A failed run with the given exit status and error text.
    pub fn failed(status: i32, stderr: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Some(0)
    }

    /// The text to report on failure: standard error, or standard output if
    /// the tool wrote nothing to standard error.
    pub fn error_text(&self) -> &str {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim()
        } else {
            stderr
        }
    }
}

/// Runs external programs.
pub trait CommandRunner {
    /// Run `program` with `args` to completion.
    ///
    /// # Errors
    ///
    /// Only when the process could not be started. A non-zero exit is a
    /// successful run with a failing [`CommandOutput::status`].
    fn run(&self, program: &str, args: &[String]) -> std::io::Result<CommandOutput>;
}

impl<T: CommandRunner + ?Sized> CommandRunner for &T {
    fn run(&self, program: &str, args: &[String]) -> std::io::Result<CommandOutput> {
        (**self).run(program, args)
    }
}

/// Runs real processes, inheriting the environment and working directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[String]) -> std::io::Result<CommandOutput> {
        let output = Command::new(program).args(args).output()?;
        Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Run an invocation and return its standard output.
///
/// # Errors
///
/// An [`ExternalError`] classified by `classifier` for a non-zero exit, or a
/// fatal one if the process could not be started.
pub fn execute<R: CommandRunner + ?Sized>(
    runner: &R,
    invocation: &Invocation,
    classifier: &FailureClassifier,
) -> Result<String, ExternalError> {
    tracing::debug!(command = %invocation, "running");
    let output = runner
        .run(invocation.program(), invocation.args_slice())
        .map_err(|e| ExternalError {
            kind: FailureKind::Fatal,
            command: invocation.to_string(),
            status: None,
            stderr: format!("failed to start {}: {e}", invocation.program()),
        })?;

    if output.is_success() {
        return Ok(output.stdout);
    }

    let stderr = output.error_text().to_string();
    let kind = classifier.classify(&stderr);
    tracing::debug!(command = %invocation, status = ?output.status, %kind, "command failed");
    Err(ExternalError {
        kind,
        command: invocation.to_string(),
        status: output.status,
        stderr,
    })
}
