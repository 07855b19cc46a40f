//! Errors raised while invoking the odo tool.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for tool invocations.
pub type Result<T> = std::result::Result<T, OdoError>;

/// Errors that can occur while running the tool.
#[derive(Error, Debug)]
pub enum OdoError {
    /// The tool binary could not be found or started.
    #[error("Cannot find {0}")]
    ToolNotFound(String),

    /// The process could not be started for another reason.
    #[error("Failed to start '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The invocation did not finish before its deadline and was killed.
    #[error("'{command}' timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    /// The tool reported a failure, either through its exit code or stderr.
    #[error("'{command}' failed: {message}")]
    CommandFailed {
        command: String,
        exit_code: Option<i32>,
        message: String,
    },

    /// The tool is not logged in to any cluster, or the cluster is unreachable.
    #[error("Cluster not reachable: {0}")]
    ClusterNotConnected(String),
}

impl OdoError {
    /// Classify a failed invocation from its captured stderr.
    pub fn from_tool_error(command: &str, exit_code: Option<i32>, stderr: &str) -> Self {
        let message = stderr.trim().to_string();
        let lower = message.to_lowercase();

        if lower.contains("please log in")
            || lower.contains("please login")
            || lower.contains("unable to connect to openshift cluster")
            || lower.contains("connection refused")
            || lower.contains("unauthorized")
        {
            return OdoError::ClusterNotConnected(message);
        }

        OdoError::CommandFailed {
            command: command.to_string(),
            exit_code,
            message,
        }
    }

    /// Whether this error means the tool has no reachable cluster.
    pub fn is_cluster_not_connected(&self) -> bool {
        matches!(self, OdoError::ClusterNotConnected(_))
    }

    /// Whether this error came from the invocation deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(self, OdoError::Timeout { .. })
    }

    /// Raw message reported by the tool, when there is one.
    pub fn tool_message(&self) -> Option<&str> {
        match self {
            OdoError::CommandFailed { message, .. } | OdoError::ClusterNotConnected(message) => {
                Some(message)
            }
            _ => None,
        }
    }
}

/// Whether stderr content marks an otherwise successful invocation as failed.
///
/// The tool sometimes exits with status 0 after printing an error; warnings
/// and informational lines do not count.
pub fn is_fatal_stderr(stderr: &str) -> bool {
    stderr.lines().any(|line| {
        let line = line.trim().to_lowercase();
        line.starts_with("error:")
            || line.starts_with("fatal:")
            || line.starts_with("please log in")
            || line.starts_with("please login")
    })
}
