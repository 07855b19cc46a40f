//! Command runner port (interface).

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::odo::errors::Result;

/// Default deadline for a captured invocation.
pub const DEFAULT_INVOCATION_TIMEOUT: Duration = Duration::from_secs(60);

/// A command line: program name plus arguments, substituted verbatim.
///
/// The program is the tool's logical name (`odo`); runners resolve it to a
/// binary path from their configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl std::fmt::Display for CommandLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Per-invocation settings.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Variables added on top of the inherited environment.
    pub env: BTreeMap<String, String>,
    /// Working directory, inherited when `None`.
    pub cwd: Option<PathBuf>,
    /// Deadline after which the process is killed.
    pub timeout: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            env: BTreeMap::new(),
            cwd: None,
            timeout: DEFAULT_INVOCATION_TIMEOUT,
        }
    }
}

impl RunOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Default::default()
        }
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    /// A successful output with the given stdout.
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: Some(0),
        }
    }

    /// A failed output with the given stderr and exit code.
    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code: Some(exit_code),
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Which stream a line of live output came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSource {
    Stdout,
    Stderr,
}

/// One line of live output from a streaming invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub source: OutputSource,
    pub text: String,
}

impl OutputLine {
    pub fn stdout(text: impl Into<String>) -> Self {
        Self {
            source: OutputSource::Stdout,
            text: text.into(),
        }
    }

    pub fn stderr(text: impl Into<String>) -> Self {
        Self {
            source: OutputSource::Stderr,
            text: text.into(),
        }
    }
}

/// Live output surface of a streaming invocation. Closed when the process exits.
pub type OutputStream = mpsc::UnboundedReceiver<OutputLine>;

/// Port for running external commands.
///
/// Implementations never fail because of a non-zero exit status; callers
/// interpret `CommandOutput::exit_code`. They fail only when the process
/// cannot be started or runs past its deadline.
pub trait CommandRunner: Send + Sync {
    /// Run a command to completion and capture its output.
    fn run(
        &self,
        command: &CommandLine,
        options: &RunOptions,
    ) -> impl std::future::Future<Output = Result<CommandOutput>> + Send;

    /// Start a long-running command (log follow, watch) and stream its output.
    ///
    /// The process is not awaited; the stream closes when it exits.
    fn stream(
        &self,
        command: &CommandLine,
        options: &RunOptions,
    ) -> impl std::future::Future<Output = Result<OutputStream>> + Send;
}
