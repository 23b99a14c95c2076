//! Running system utilities
//!
//! Modules never spawn processes directly; they go through a
//! [`CommandRunner`] so tests can record the commands instead.

use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::Arc;

/// Captured result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Executes external programs.
pub trait CommandRunner: Send + Sync {
    /// Run `program` to completion, feeding `stdin` if given.
    fn run(&self, program: &str, args: &[String], stdin: Option<&str>) -> Result<CommandOutput>;
}

pub type SharedRunner = Arc<dyn CommandRunner>;

/// Run a command and treat a non-zero exit status as an error.
pub fn run_checked(
    runner: &dyn CommandRunner,
    program: &str,
    args: &[String],
    stdin: Option<&str>,
) -> Result<CommandOutput> {
    tracing::info!(program, args = ?args, "Running command");
    let output = runner.run(program, args, stdin)?;
    if !output.success() {
        return Err(Error::CommandFailed {
            program: program.to_string(),
            status: output.status,
            stderr: output.stderr.trim().to_string(),
        });
    }
    Ok(output)
}

/// Runs commands on the host with `std::process::Command`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[String], stdin: Option<&str>) -> Result<CommandOutput> {
        let spawn_error = |source| Error::Spawn {
            program: program.to_string(),
            source,
        };

        let mut child = Command::new(program)
            .args(args)
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_error)?;

        if let Some(input) = stdin
            && let Some(mut pipe) = child.stdin.take()
        {
            pipe.write_all(input.as_bytes()).map_err(spawn_error)?;
        }

        let output = child.wait_with_output().map_err(spawn_error)?;
        Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// One command seen by a [`RecordingRunner`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCommand {
    pub program: String,
    pub args: Vec<String>,
    pub stdin: Option<String>,
}

impl RecordedCommand {
    /// `program arg1 arg2 ...`
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Records commands instead of running them.
///
/// Every command succeeds with empty output unless a response was
/// configured for its program.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    calls: Mutex<Vec<RecordedCommand>>,
    responses: Mutex<HashMap<String, CommandOutput>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every call of `program` with `output`.
    pub fn respond(&self, program: &str, output: CommandOutput) {
        self.responses.lock().insert(program.to_string(), output);
    }

    /// Make every call of `program` exit with status 1.
    pub fn fail(&self, program: &str, stderr: &str) {
        self.respond(
            program,
            CommandOutput {
                status: Some(1),
                stdout: String::new(),
                stderr: stderr.to_string(),
            },
        );
    }

    pub fn calls(&self) -> Vec<RecordedCommand> {
        self.calls.lock().clone()
    }

    /// Recorded command lines, in call order.
    pub fn command_lines(&self) -> Vec<String> {
        self.calls.lock().iter().map(RecordedCommand::command_line).collect()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, program: &str, args: &[String], stdin: Option<&str>) -> Result<CommandOutput> {
        self.calls.lock().push(RecordedCommand {
            program: program.to_string(),
            args: args.to_vec(),
            stdin: stdin.map(String::from),
        });
        let output = self.responses.lock().get(program).cloned().unwrap_or(CommandOutput {
            status: Some(0),
            ..CommandOutput::default()
        });
        Ok(output)
    }
}
