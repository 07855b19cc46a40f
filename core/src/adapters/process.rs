//! Process runner backed by `tokio::process`.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::odo::errors::{OdoError, Result};
use crate::ports::{
    CommandLine, CommandOutput, CommandRunner, OutputLine, OutputStream, RunOptions,
};

/// Default paths to search for odo.
const ODO_PATHS: &[&str] = &[
    "/opt/homebrew/bin/odo", // Apple Silicon
    "/usr/local/bin/odo",    // Intel Mac / Homebrew / manual install
    "/usr/bin/odo",          // System
];

/// Runs commands as child processes.
///
/// Programs are resolved through a table of known tool paths; anything not
/// in the table is looked up on `PATH` by the operating system.
pub struct ProcessRunner {
    tools: HashMap<String, PathBuf>,
}

impl ProcessRunner {
    /// Creates a runner, searching the well-known install locations for odo.
    pub fn new() -> Self {
        let mut tools = HashMap::new();
        if let Some(path) = find_executable(ODO_PATHS) {
            tools.insert("odo".to_string(), path);
        }
        Self { tools }
    }

    /// Creates a runner with an explicit odo binary, falling back to the search when `None`.
    pub fn with_odo_path(odo_path: Option<PathBuf>) -> Self {
        match odo_path {
            Some(path) => Self::new().with_tool("odo", path),
            None => Self::new(),
        }
    }

    /// Registers the binary to use for a program name.
    pub fn with_tool(mut self, program: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.tools.insert(program.into(), path.into());
        self
    }

    /// Returns the binary path used for `program`.
    pub fn resolve(&self, program: &str) -> PathBuf {
        self.tools
            .get(program)
            .cloned()
            .unwrap_or_else(|| PathBuf::from(program))
    }

    fn command(&self, command: &CommandLine, options: &RunOptions) -> Command {
        let mut cmd = Command::new(self.resolve(&command.program));
        cmd.args(&command.args)
            .envs(&options.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(cwd) = &options.cwd {
            cmd.current_dir(cwd);
        }
        cmd
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRunner for ProcessRunner {
    async fn run(&self, command: &CommandLine, options: &RunOptions) -> Result<CommandOutput> {
        debug!(command = %command, "Running command");

        let mut cmd = self.command(command, options);
        // Dropping the child on timeout kills it.
        cmd.kill_on_drop(true);
        let child = cmd.spawn().map_err(|e| spawn_error(command, e))?;

        match timeout(options.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let output = CommandOutput {
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    exit_code: output.status.code(),
                };
                debug!(command = %command, exit_code = ?output.exit_code, "Command finished");
                Ok(output)
            }
            Ok(Err(e)) => Err(OdoError::Spawn {
                command: command.to_string(),
                source: e,
            }),
            Err(_) => {
                warn!(command = %command, timeout = ?options.timeout, "Command timed out, killed");
                Err(OdoError::Timeout {
                    command: command.to_string(),
                    timeout: options.timeout,
                })
            }
        }
    }

    async fn stream(&self, command: &CommandLine, options: &RunOptions) -> Result<OutputStream> {
        debug!(command = %command, "Starting streaming command");

        let mut child = self
            .command(command, options)
            .spawn()
            .map_err(|e| spawn_error(command, e))?;

        let (tx, rx) = mpsc::unbounded_channel();

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, tx.clone(), |text| OutputLine::stdout(text)));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, tx, |text| OutputLine::stderr(text)));
        }

        let label = command.to_string();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => debug!(command = %label, status = %status, "Streaming command exited"),
                Err(e) => warn!(command = %label, error = %e, "Failed to wait for streaming command"),
            }
        });

        Ok(rx)
    }
}

async fn forward_lines<R>(
    reader: R,
    tx: mpsc::UnboundedSender<OutputLine>,
    wrap: fn(String) -> OutputLine,
) where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if tx.send(wrap(line)).is_err() {
            // Receiver gone; nobody is watching anymore.
            break;
        }
    }
}

fn spawn_error(command: &CommandLine, error: std::io::Error) -> OdoError {
    if error.kind() == ErrorKind::NotFound {
        OdoError::ToolNotFound(command.program.clone())
    } else {
        OdoError::Spawn {
            command: command.to_string(),
            source: error,
        }
    }
}

/// Finds an executable in the given paths.
pub fn find_executable(paths: &[&str]) -> Option<PathBuf> {
    paths
        .iter()
        .map(Path::new)
        .find(|path| path.exists())
        .map(Path::to_path_buf)
}
