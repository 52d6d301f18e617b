use std::fmt;
use std::io::{self, Write};
use std::process::{Command, Stdio};
use std::thread;

use crate::{Result, ToolError};

// ─── Invocation ───────────────────────────────────────────────────────────

/// A fully built external command: program, argument vector and optional stdin.
///
/// Arguments are passed to the process as-is; nothing goes through a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub stdin: Option<String>,
}

impl Invocation {
    pub fn new(program: impl Into<String>, args: ArgList) -> Self {
        Self {
            program: program.into(),
            args: args.into_vec(),
            stdin: None,
        }
    }

    pub fn with_stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }
}

impl fmt::Display for Invocation {
    /// Shell-like rendering for logs
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(|c: char| c.is_whitespace() || c == '"') {
                write!(f, " {arg:?}")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

// ─── ArgList ──────────────────────────────────────────────────────────────

/// Builder translating typed options into CLI flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgList(Vec<String>);

impl ArgList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from fixed leading words, e.g. `["run", "list"]`
    pub fn from_words(words: &[&str]) -> Self {
        Self(words.iter().map(|w| w.to_string()).collect())
    }

    pub fn arg(&mut self, value: impl Into<String>) -> &mut Self {
        self.0.push(value.into());
        self
    }

    /// `--name` when `enabled`
    pub fn flag(&mut self, name: &str, enabled: bool) -> &mut Self {
        if enabled {
            self.0.push(name.to_string());
        }
        self
    }

    /// `--name value`
    pub fn opt(&mut self, name: &str, value: impl ToString) -> &mut Self {
        self.0.push(name.to_string());
        self.0.push(value.to_string());
        self
    }

    /// `--name value` when the value is present
    pub fn opt_if<V: ToString>(&mut self, name: &str, value: Option<V>) -> &mut Self {
        if let Some(value) = value {
            self.opt(name, value);
        }
        self
    }

    /// `--name v1 --name v2 ...`
    pub fn opt_each<I, V>(&mut self, name: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: ToString,
    {
        for value in values {
            self.opt(name, value);
        }
        self
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

// ─── Running ──────────────────────────────────────────────────────────────

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawOutput {
    /// Exit code; `None` when killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl RawOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Executes invocations. Wrappers are generic over this so tests can script
/// tool responses without spawning processes.
pub trait CommandRunner {
    fn run(&self, invocation: &Invocation) -> Result<RawOutput>;

    /// Run and turn a non-zero exit into [`ToolError::CommandFailed`].
    fn run_checked(&self, invocation: &Invocation) -> Result<RawOutput> {
        let output = self.run(invocation)?;
        if output.success() {
            return Ok(output);
        }

        let stderr = if output.stderr.trim().is_empty() {
            output.stdout.trim()
        } else {
            output.stderr.trim()
        };
        tracing::warn!(command = %invocation, code = ?output.code, "command failed");
        Err(ToolError::CommandFailed {
            program: invocation.program.clone(),
            code: output.code.unwrap_or(-1),
            stderr: stderr.to_string(),
        })
    }
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, invocation: &Invocation) -> Result<RawOutput> {
        (**self).run(invocation)
    }
}

/// Runs invocations as blocking child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for ProcessRunner {
    fn run(&self, invocation: &Invocation) -> Result<RawOutput> {
        tracing::debug!(command = %invocation, "running command");

        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if invocation.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            });

        let mut child = cmd.spawn().map_err(|source| ToolError::Spawn {
            program: invocation.program.clone(),
            source,
        })?;

        // stdin is fed from its own thread while stdout and stderr are drained,
        // otherwise a tool that writes before reading everything blocks on a full pipe.
        // Dropping the handle at the end of the thread closes stdin so the tool sees EOF.
        let writer = match (&invocation.stdin, child.stdin.take()) {
            (Some(input), Some(mut stdin)) => {
                let input = input.clone();
                Some(thread::spawn(move || stdin.write_all(input.as_bytes())))
            }
            _ => None,
        };

        let output = child.wait_with_output()?;
        if let Some(writer) = writer {
            match writer.join() {
                Ok(Ok(())) => {}
                // The tool exited without reading all of its input
                Ok(Err(e)) if e.kind() == io::ErrorKind::BrokenPipe => {}
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => {
                    return Err(ToolError::Protocol(format!(
                        "stdin writer for `{}` panicked",
                        invocation.program
                    )));
                }
            }
        }
        let raw = RawOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        tracing::debug!(
            program = %invocation.program,
            code = ?raw.code,
            stdout_bytes = raw.stdout.len(),
            "command finished"
        );
        Ok(raw)
    }
}
