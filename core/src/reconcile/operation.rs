//! Operation models for the reconciliation engine.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::domain::{ComponentSource, NodeKind, ResourceKey};
use crate::tree::NodeId;

/// A change requested against the cluster.
///
/// Create variants name the parent node and the new child's attributes;
/// delete variants name the node to remove; link variants name the
/// component and what it is linked to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    CreateProject {
        cluster: NodeId,
        name: String,
    },
    DeleteProject {
        project: NodeId,
    },
    CreateApplication {
        project: NodeId,
        name: String,
    },
    DeleteApplication {
        application: NodeId,
    },
    CreateComponent {
        application: NodeId,
        name: String,
        component_type: String,
        version: String,
        source: Option<ComponentSource>,
    },
    DeleteComponent {
        component: NodeId,
    },
    CreateStorage {
        component: NodeId,
        name: String,
        mount_path: String,
        size_gib: u32,
    },
    DeleteStorage {
        storage: NodeId,
    },
    CreateUrl {
        component: NodeId,
        name: String,
        port: Option<u16>,
    },
    DeleteUrl {
        url: NodeId,
    },
    CreateService {
        application: NodeId,
        name: String,
        template: String,
        plan: String,
    },
    DeleteService {
        service: NodeId,
    },
    /// Link `component` to another component of the same application.
    LinkComponent {
        component: NodeId,
        target: NodeId,
    },
    /// Link `component` to a service of the same application.
    LinkService {
        component: NodeId,
        service: NodeId,
    },
}

impl Operation {
    pub fn action(&self) -> Action {
        match self {
            Operation::CreateProject { .. }
            | Operation::CreateApplication { .. }
            | Operation::CreateComponent { .. }
            | Operation::CreateStorage { .. }
            | Operation::CreateUrl { .. }
            | Operation::CreateService { .. } => Action::Create,
            Operation::DeleteProject { .. }
            | Operation::DeleteApplication { .. }
            | Operation::DeleteComponent { .. }
            | Operation::DeleteStorage { .. }
            | Operation::DeleteUrl { .. }
            | Operation::DeleteService { .. } => Action::Delete,
            Operation::LinkComponent { .. } | Operation::LinkService { .. } => Action::Link,
        }
    }

    /// Kind of the resource being created, deleted or linked.
    pub fn kind(&self) -> NodeKind {
        match self {
            Operation::CreateProject { .. } | Operation::DeleteProject { .. } => NodeKind::Project,
            Operation::CreateApplication { .. } | Operation::DeleteApplication { .. } => {
                NodeKind::Application
            }
            Operation::CreateComponent { .. }
            | Operation::DeleteComponent { .. }
            | Operation::LinkComponent { .. } => NodeKind::Component,
            Operation::CreateStorage { .. } | Operation::DeleteStorage { .. } => NodeKind::Storage,
            Operation::CreateUrl { .. } | Operation::DeleteUrl { .. } => NodeKind::Url,
            Operation::CreateService { .. }
            | Operation::DeleteService { .. }
            | Operation::LinkService { .. } => NodeKind::Service,
        }
    }

    /// The node the operation is addressed to.
    pub fn target(&self) -> NodeId {
        match self {
            Operation::CreateProject { cluster: id, .. }
            | Operation::DeleteProject { project: id }
            | Operation::CreateApplication { project: id, .. }
            | Operation::DeleteApplication { application: id }
            | Operation::CreateComponent { application: id, .. }
            | Operation::DeleteComponent { component: id }
            | Operation::CreateStorage { component: id, .. }
            | Operation::DeleteStorage { storage: id }
            | Operation::CreateUrl { component: id, .. }
            | Operation::DeleteUrl { url: id }
            | Operation::CreateService { application: id, .. }
            | Operation::DeleteService { service: id }
            | Operation::LinkComponent { component: id, .. }
            | Operation::LinkService { component: id, .. } => *id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    Create,
    Delete,
    Link,
}

/// Lifecycle of one operation.
///
/// ```text
/// Validating -> Invoking -> Polling -> Settled
///     |            |           |-----> TimedOut
///     v            v           '-----> Cancelled
///  Rejected      Failed
/// ```
/// Link operations go from `Invoking` straight to `Settled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationState {
    Validating,
    Invoking,
    Polling,
    Settled,
    Rejected,
    Failed,
    TimedOut,
    Cancelled,
}

impl OperationState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OperationState::Settled
                | OperationState::Rejected
                | OperationState::Failed
                | OperationState::TimedOut
                | OperationState::Cancelled
        )
    }
}

/// Broadcast to subscribers on every state transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateChange {
    pub operation: Uuid,
    pub kind: NodeKind,
    pub target: NodeId,
    pub state: OperationState,
}

/// A mutation that has been sent to the backend but is not yet reflected in the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingChange {
    pub operation: Uuid,
    pub parent: NodeId,
    pub action: Action,
    pub key: ResourceKey,
}

/// Per-call options.
#[derive(Debug, Clone, Default)]
pub struct OperationOptions {
    /// The caller confirmed a destructive operation.
    pub confirmed: bool,
    /// Overrides the engine's polling interval.
    pub poll_interval: Option<Duration>,
    /// Overrides the engine's reconciliation timeout.
    pub timeout: Option<Duration>,
    /// Stops polling when cancelled. The backend change is not undone.
    pub cancel: Option<CancellationToken>,
}

impl OperationOptions {
    pub fn confirmed() -> Self {
        Self {
            confirmed: true,
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Outcome of an operation whose effect was observed in the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settled {
    pub id: Uuid,
    pub action: Action,
    pub kind: NodeKind,
    pub name: String,
    /// The created node, for create operations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<NodeId>,
    /// User-facing notification text.
    pub message: String,
    /// Refreshes issued before the change was observed.
    pub attempts: u32,
    pub elapsed: Duration,
}
