//! Error types for the odo-explorer-core library.

use std::time::Duration;

use thiserror::Error;

use crate::domain::{NameValidity, NodeKind};
use crate::odo::errors::OdoError;
use crate::tree::NodeId;

/// Result type alias for explorer operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while browsing or changing the resource tree.
#[derive(Error, Debug)]
pub enum Error {
    /// The operation was rejected before any process was started.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Running the tool failed: it could not start, timed out, or reported an error.
    #[error(transparent)]
    Invocation(#[from] OdoError),

    /// The tool accepted the change but no refresh confirmed it in time.
    ///
    /// The change has probably been applied on the server; only the local
    /// view could not confirm it.
    #[error("{kind} '{name}' was not confirmed after {waited:?}")]
    ReconciliationTimeout {
        kind: NodeKind,
        name: String,
        waited: Duration,
    },

    /// The caller stopped waiting for confirmation. The server-side change is not undone.
    #[error("Stopped waiting for {kind} '{name}'")]
    Cancelled { kind: NodeKind, name: String },

    /// A node id does not refer to a node in the tree.
    #[error("Node {0} is not in the tree")]
    NodeNotFound(NodeId),

    /// No resource with this name exists under the given parent.
    #[error("{kind} '{name}' not found")]
    ResourceNotFound { kind: NodeKind, name: String },

    /// No cluster is attached to the tree.
    #[error("Not logged in to a cluster")]
    NoCluster,

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether the change may have happened server-side even though this error was returned.
    pub fn is_ambiguous(&self) -> bool {
        matches!(
            self,
            Error::ReconciliationTimeout { .. } | Error::Cancelled { .. }
        )
    }
}

/// Reasons an operation is rejected while validating.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The proposed name breaks the naming rule.
    #[error("{}", invalid_name_message(.kind, .reason))]
    InvalidName { kind: NodeKind, reason: NameValidity },

    /// A sibling of the same kind already has this name.
    #[error("This name is already used, please enter different name.")]
    AlreadyExists { kind: NodeKind, name: String },

    /// A delete was requested without the caller's confirmation.
    #[error("Deleting {kind} '{name}' requires confirmation")]
    NotConfirmed { kind: NodeKind, name: String },

    /// The target node has the wrong kind for this operation.
    #[error("Expected a {expected} node, found {actual}")]
    WrongKind { expected: NodeKind, actual: NodeKind },

    /// A required parameter is missing or malformed.
    #[error("Invalid {field}: {reason}")]
    InvalidParameter { field: &'static str, reason: String },
}

fn invalid_name_message(kind: &NodeKind, reason: &NameValidity) -> String {
    reason
        .message(kind.display_name())
        .unwrap_or_else(|| format!("{} name is valid", kind))
}
