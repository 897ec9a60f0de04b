//! Subprocess plumbing for the git and docker CLIs.
//!
//! Everything that shells out goes through a [`CommandRunner`] passed in by
//! the caller, so lifecycle code can be exercised without docker or git
//! installed.

use crate::error::{FilterError, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was killed by a signal.
    pub status_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            status_code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            status_code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.status_code == Some(0)
    }

    fn status_label(&self) -> String {
        match self.status_code {
            Some(code) => format!("exit code {code}"),
            None => "terminated by signal".to_string(),
        }
    }

    /// Turn a non-zero exit into [`FilterError::ExternalTool`].
    pub fn check(self, program: &str, args: &[&str]) -> Result<Self> {
        if self.success() {
            return Ok(self);
        }
        Err(FilterError::ExternalTool {
            command: command_line(program, args),
            status: self.status_label(),
            stderr: self.stderr.trim().to_string(),
        })
    }
}

pub fn command_line(program: &str, args: &[&str]) -> String {
    let mut line = program.to_string();
    for a in args {
        line.push(' ');
        line.push_str(a);
    }
    line
}

// ---------------------------------------------------------------------------
// CommandRunner
// ---------------------------------------------------------------------------

pub trait CommandRunner {
    /// Run to completion with stdout and stderr captured.
    fn run(&self, program: &str, args: &[&str], cwd: &Path) -> Result<CommandOutput>;

    /// Run attached to the current terminal. Returns the child's exit code,
    /// `128 + signal` when it was killed by a signal.
    fn run_interactive(&self, program: &str, args: &[&str], cwd: &Path) -> Result<i32>;
}

/// Runs real processes via `std::process::Command`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str], cwd: &Path) -> Result<CommandOutput> {
        tracing::debug!(cwd = %cwd.display(), "running `{}`", command_line(program, args));
        let output = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .output()
            .map_err(|e| spawn_error(program, e))?;
        let out = CommandOutput {
            status_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        if !out.success() {
            tracing::warn!(
                "`{}` failed with {}",
                command_line(program, args),
                out.status_label()
            );
        }
        Ok(out)
    }

    fn run_interactive(&self, program: &str, args: &[&str], cwd: &Path) -> Result<i32> {
        tracing::debug!(cwd = %cwd.display(), "attaching `{}`", command_line(program, args));
        let status = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .status()
            .map_err(|e| spawn_error(program, e))?;
        Ok(exit_code(status))
    }
}

fn spawn_error(program: &str, e: std::io::Error) -> FilterError {
    if e.kind() == std::io::ErrorKind::NotFound {
        FilterError::ToolMissing(program.to_string())
    } else {
        FilterError::Io(e)
    }
}

#[cfg(unix)]
fn exit_code(status: std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|sig| 128 + sig))
        .unwrap_or(1)
}

#[cfg(not(unix))]
fn exit_code(status: std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(1)
}

/// Resolve `tool` on `PATH`.
pub fn ensure_tool(tool: &str) -> Result<PathBuf> {
    which::which(tool).map_err(|_| FilterError::ToolMissing(tool.to_string()))
}

// ---------------------------------------------------------------------------
// Test double
// ---------------------------------------------------------------------------

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::cell::RefCell;

    #[derive(Debug, Clone)]
    pub struct Invocation {
        pub program: String,
        pub args: Vec<String>,
        pub cwd: PathBuf,
    }

    impl Invocation {
        pub fn line(&self) -> String {
            let args: Vec<&str> = self.args.iter().map(String::as_str).collect();
            command_line(&self.program, &args)
        }
    }

    /// Records every invocation. Commands whose line contains a scripted
    /// pattern get that output; everything else succeeds with empty output.
    #[derive(Default)]
    pub struct RecordingRunner {
        rules: Vec<(String, CommandOutput)>,
        calls: RefCell<Vec<Invocation>>,
    }

    impl RecordingRunner {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn on(mut self, pattern: &str, output: CommandOutput) -> Self {
            self.rules.push((pattern.to_string(), output));
            self
        }

        pub fn calls(&self) -> Vec<Invocation> {
            self.calls.borrow().clone()
        }

        pub fn lines(&self) -> Vec<String> {
            self.calls.borrow().iter().map(Invocation::line).collect()
        }

        pub fn ran(&self, pattern: &str) -> bool {
            self.lines().iter().any(|l| l.contains(pattern))
        }

        fn record(&self, program: &str, args: &[&str], cwd: &Path) -> CommandOutput {
            let inv = Invocation {
                program: program.to_string(),
                args: args.iter().map(|a| a.to_string()).collect(),
                cwd: cwd.to_path_buf(),
            };
            let line = inv.line();
            self.calls.borrow_mut().push(inv);
            self.rules
                .iter()
                .find(|(pattern, _)| line.contains(pattern.as_str()))
                .map(|(_, out)| out.clone())
                .unwrap_or_else(|| CommandOutput::ok(""))
        }
    }

    impl CommandRunner for RecordingRunner {
        fn run(&self, program: &str, args: &[&str], cwd: &Path) -> Result<CommandOutput> {
            Ok(self.record(program, args, cwd))
        }

        fn run_interactive(&self, program: &str, args: &[&str], cwd: &Path) -> Result<i32> {
            Ok(self.record(program, args, cwd).status_code.unwrap_or(1))
        }
    }
}
