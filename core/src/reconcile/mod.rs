//! Reconciliation engine.
//!
//! The backend has no event channel, so a mutation is confirmed by polling:
//! run the odo command, then re-list the parent until the expected child
//! appears (create) or disappears (delete), or the deadline passes.
//!
//! A timeout is not a failure. The tool accepted the change and it has most
//! likely been applied; only the local view could not confirm it.

mod operation;

pub use operation::{
    Action, Operation, OperationOptions, OperationState, PendingChange, Settled, StateChange,
};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::{validate_name, NodeKind, Resource, ResourceKey};
use crate::error::{Error, Result, ValidationError};
use crate::odo::{commands, path_segment, Odo};
use crate::ports::{CommandLine, CommandRunner};
use crate::tree::{diff, Node, NodeId, ResourceTree};

/// Default interval between confirmation refreshes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default deadline for a change to show up in the tree.
pub const DEFAULT_RECONCILE_TIMEOUT: Duration = Duration::from_secs(60);

/// Capacity of the state-change broadcast channel.
const EVENT_CAPACITY: usize = 64;

/// Engine-wide reconciliation settings.
#[derive(Debug, Clone)]
pub struct ReconcileSettings {
    pub poll_interval: Duration,
    pub timeout: Duration,
    /// Allow one in-flight mutation per parent node.
    pub serialize_per_parent: bool,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_RECONCILE_TIMEOUT,
            serialize_per_parent: true,
        }
    }
}

/// A validated operation, ready to run.
struct Plan {
    parent: NodeId,
    action: Action,
    key: ResourceKey,
    command: CommandLine,
    message: String,
}

impl Plan {
    fn is_reflected(&self, before: &[Resource], after: &[Resource]) -> bool {
        let changes = diff(before, after);
        match self.action {
            Action::Create => changes.added.contains(&self.key),
            Action::Delete => changes.removed.contains(&self.key),
            Action::Link => true,
        }
    }
}

/// Removes a pending change when the operation ends, however it ends.
struct PendingGuard<'a> {
    pending: &'a RwLock<HashMap<Uuid, PendingChange>>,
    id: Uuid,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.write().remove(&self.id);
    }
}

/// Runs mutations through odo and waits for the tree to reflect them.
pub struct Reconciler<R: CommandRunner> {
    odo: Arc<Odo<R>>,
    tree: Arc<ResourceTree<Odo<R>>>,
    settings: ReconcileSettings,
    parent_locks: Mutex<HashMap<NodeId, Arc<tokio::sync::Mutex<()>>>>,
    pending: RwLock<HashMap<Uuid, PendingChange>>,
    events: broadcast::Sender<StateChange>,
}

impl<R: CommandRunner> Reconciler<R> {
    pub fn new(
        odo: Arc<Odo<R>>,
        tree: Arc<ResourceTree<Odo<R>>>,
        settings: ReconcileSettings,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            odo,
            tree,
            settings,
            parent_locks: Mutex::new(HashMap::new()),
            pending: RwLock::new(HashMap::new()),
            events,
        }
    }

    pub fn settings(&self) -> &ReconcileSettings {
        &self.settings
    }

    /// Receives every state transition of every operation from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.events.subscribe()
    }

    /// Changes sent to the backend under `parent` and not yet observed.
    pub fn pending_changes(&self, parent: NodeId) -> Vec<PendingChange> {
        self.pending
            .read()
            .values()
            .filter(|change| change.parent == parent)
            .cloned()
            .collect()
    }

    /// Runs an operation to completion.
    ///
    /// Validation failures return before any process is started. Dropping
    /// the returned future abandons the wait like a cancellation does.
    pub async fn execute(&self, operation: Operation, options: OperationOptions) -> Result<Settled> {
        let result = self.run(operation, options).await;
        self.prune_locks();
        result
    }

    /// Drops the serialization locks of parents with no operation in flight.
    pub fn prune_locks(&self) {
        self.parent_locks
            .lock()
            .retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    async fn run(&self, operation: Operation, options: OperationOptions) -> Result<Settled> {
        let id = Uuid::new_v4();
        let started = Instant::now();
        let emit = |state| {
            let _ = self.events.send(StateChange {
                operation: id,
                kind: operation.kind(),
                target: operation.target(),
                state,
            });
        };

        emit(OperationState::Validating);
        let plan = match self.plan(&operation, &options) {
            Ok(plan) => plan,
            Err(e) => {
                debug!(operation = %id, error = %e, "Operation rejected");
                emit(OperationState::Rejected);
                return Err(e);
            }
        };

        let _serial = if self.settings.serialize_per_parent {
            Some(self.parent_lock(plan.parent).lock_owned().await)
        } else {
            None
        };

        let before = match self.before_snapshot(plan.parent).await {
            Ok(before) => before,
            Err(e) => {
                emit(OperationState::Failed);
                return Err(e);
            }
        };
        let present = before.iter().any(|r| r.key() == plan.key);
        let conflict = match plan.action {
            Action::Create if present => Some(Error::from(ValidationError::AlreadyExists {
                kind: plan.key.kind,
                name: plan.key.name.clone(),
            })),
            Action::Delete if !present => Some(Error::ResourceNotFound {
                kind: plan.key.kind,
                name: plan.key.name.clone(),
            }),
            _ => None,
        };
        if let Some(e) = conflict {
            debug!(operation = %id, error = %e, "Operation rejected");
            emit(OperationState::Rejected);
            return Err(e);
        }

        emit(OperationState::Invoking);
        let _pending = self.track(id, &plan);
        if let Err(e) = self.odo.execute(&plan.command).await {
            warn!(operation = %id, command = %plan.command, error = %e, "Operation failed");
            emit(OperationState::Failed);
            return Err(e.into());
        }

        let attempts = if plan.action == Action::Link {
            0
        } else {
            emit(OperationState::Polling);
            match self.poll(&plan, &before, &options).await {
                Ok(attempts) => attempts,
                Err(e) => {
                    emit(match e {
                        Error::ReconciliationTimeout { .. } => OperationState::TimedOut,
                        Error::Cancelled { .. } => OperationState::Cancelled,
                        _ => OperationState::Failed,
                    });
                    return Err(e);
                }
            }
        };

        emit(OperationState::Settled);
        let node = match plan.action {
            Action::Create => self
                .tree
                .find_child_of_kind(plan.parent, plan.key.kind, &plan.key.name)
                .map(|n| n.id),
            _ => None,
        };
        let elapsed = started.elapsed();
        info!(operation = %id, attempts, elapsed = ?elapsed, "{}", plan.message);

        Ok(Settled {
            id,
            action: plan.action,
            kind: plan.key.kind,
            name: plan.key.name,
            node,
            message: plan.message,
            attempts,
            elapsed,
        })
    }

    fn parent_lock(&self, parent: NodeId) -> Arc<tokio::sync::Mutex<()>> {
        self.parent_locks
            .lock()
            .entry(parent)
            .or_default()
            .clone()
    }

    fn track(&self, id: Uuid, plan: &Plan) -> PendingGuard<'_> {
        self.pending.write().insert(
            id,
            PendingChange {
                operation: id,
                parent: plan.parent,
                action: plan.action,
                key: plan.key.clone(),
            },
        );
        PendingGuard {
            pending: &self.pending,
            id,
        }
    }

    /// Cached children when the parent has been listed, otherwise one listing.
    async fn before_snapshot(&self, parent: NodeId) -> Result<Vec<Resource>> {
        if self.tree.is_loaded(parent) {
            self.tree.child_resources(parent)
        } else {
            Ok(self
                .tree
                .refresh_children(parent)
                .await?
                .into_iter()
                .map(|n| n.resource)
                .collect())
        }
    }

    async fn poll(&self, plan: &Plan, before: &[Resource], options: &OperationOptions) -> Result<u32> {
        let interval = options.poll_interval.unwrap_or(self.settings.poll_interval);
        let deadline = options.timeout.unwrap_or(self.settings.timeout);

        let wait = async {
            let mut attempts = 0u32;
            loop {
                attempts += 1;
                match self.tree.refresh_children(plan.parent).await {
                    Ok(children) => {
                        let after: Vec<Resource> = children.into_iter().map(|n| n.resource).collect();
                        if plan.is_reflected(before, &after) {
                            return Ok(attempts);
                        }
                        debug!(key = %plan.key, attempts, "Change not visible yet");
                    }
                    Err(Error::NodeNotFound(id)) => return Err(Error::NodeNotFound(id)),
                    Err(e) => warn!(key = %plan.key, attempts, error = %e, "Refresh failed while polling"),
                }
                tokio::time::sleep(interval).await;
            }
        };

        let cancelled = async {
            match &options.cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            result = tokio::time::timeout(deadline, wait) => match result {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(key = %plan.key, waited = ?deadline, "Change not confirmed in time");
                    Err(Error::ReconciliationTimeout {
                        kind: plan.key.kind,
                        name: plan.key.name.clone(),
                        waited: deadline,
                    })
                }
            },
            _ = cancelled => {
                info!(key = %plan.key, "Stopped waiting for change");
                Err(Error::Cancelled {
                    kind: plan.key.kind,
                    name: plan.key.name.clone(),
                })
            }
        }
    }

    // =========================================================================
    // Validation
    // =========================================================================

    fn expect_kind(&self, id: NodeId, kind: NodeKind) -> Result<Node> {
        let node = self.tree.node(id)?;
        if node.kind() != kind {
            return Err(ValidationError::WrongKind {
                expected: kind,
                actual: node.kind(),
            }
            .into());
        }
        Ok(node)
    }

    fn parent_of(&self, node: &Node) -> Result<NodeId> {
        node.parent.ok_or(Error::NodeNotFound(node.id))
    }

    /// Checks every precondition that does not need the backend.
    fn plan(&self, operation: &Operation, options: &OperationOptions) -> Result<Plan> {
        let kind = operation.kind();
        let action = operation.action();

        let (parent, name, command, message) = match operation {
            Operation::CreateProject { cluster, name } => {
                self.expect_kind(*cluster, NodeKind::Cluster)?;
                let name = name.trim();
                check_name(kind, name)?;
                (
                    *cluster,
                    name.to_string(),
                    commands::project_create(name),
                    created(kind, name),
                )
            }
            Operation::CreateApplication { project, name } => {
                self.expect_kind(*project, NodeKind::Project)?;
                let name = name.trim();
                check_name(kind, name)?;
                let path = self.tree.path(*project)?;
                let project_name = path_segment(&path.project, "project")?;
                (
                    *project,
                    name.to_string(),
                    commands::app_create(project_name, name),
                    created(kind, name),
                )
            }
            Operation::CreateComponent {
                application,
                name,
                component_type,
                version,
                source,
            } => {
                self.expect_kind(*application, NodeKind::Application)?;
                let name = name.trim();
                check_name(kind, name)?;
                require("component type", component_type)?;
                require("component version", version)?;
                if let Some(source) = source {
                    require("source location", &source.location)?;
                }
                let path = self.tree.path(*application)?;
                let project = path_segment(&path.project, "project")?;
                let app = path_segment(&path.application, "application")?;
                (
                    *application,
                    name.to_string(),
                    commands::component_create(
                        project,
                        app,
                        name,
                        component_type,
                        version,
                        source.as_ref(),
                    ),
                    created(kind, name),
                )
            }
            Operation::CreateStorage {
                component,
                name,
                mount_path,
                size_gib,
            } => {
                let owner = self.expect_kind(*component, NodeKind::Component)?;
                let name = name.trim();
                check_name(kind, name)?;
                if !mount_path.starts_with('/') {
                    return Err(invalid("mount path", "must be an absolute path"));
                }
                if *size_gib == 0 {
                    return Err(invalid("size", "must be at least 1 GiB"));
                }
                let path = self.tree.path(*component)?;
                let project = path_segment(&path.project, "project")?;
                let app = path_segment(&path.application, "application")?;
                (
                    *component,
                    name.to_string(),
                    commands::storage_create(
                        project,
                        app,
                        owner.name(),
                        name,
                        mount_path,
                        *size_gib,
                    ),
                    format!(
                        "{} for {} '{}'",
                        created(kind, name),
                        NodeKind::Component,
                        owner.name()
                    ),
                )
            }
            Operation::CreateUrl {
                component,
                name,
                port,
            } => {
                let owner = self.expect_kind(*component, NodeKind::Component)?;
                let name = name.trim();
                check_name(kind, name)?;
                let path = self.tree.path(*component)?;
                let project = path_segment(&path.project, "project")?;
                let app = path_segment(&path.application, "application")?;
                (
                    *component,
                    name.to_string(),
                    commands::url_create(project, app, owner.name(), name, *port),
                    format!(
                        "{} '{}' for {} '{}' successfully created",
                        kind,
                        name,
                        NodeKind::Component,
                        owner.name()
                    ),
                )
            }
            Operation::CreateService {
                application,
                name,
                template,
                plan,
            } => {
                self.expect_kind(*application, NodeKind::Application)?;
                let name = name.trim();
                check_name(kind, name)?;
                require("service template", template)?;
                require("plan", plan)?;
                let path = self.tree.path(*application)?;
                let project = path_segment(&path.project, "project")?;
                let app = path_segment(&path.application, "application")?;
                (
                    *application,
                    name.to_string(),
                    commands::service_create(project, app, template, plan, name),
                    created(kind, name),
                )
            }
            Operation::DeleteProject { project: id }
            | Operation::DeleteApplication { application: id }
            | Operation::DeleteComponent { component: id }
            | Operation::DeleteStorage { storage: id }
            | Operation::DeleteUrl { url: id }
            | Operation::DeleteService { service: id } => {
                let node = self.expect_kind(*id, kind)?;
                if !options.confirmed {
                    return Err(ValidationError::NotConfirmed {
                        kind,
                        name: node.name().to_string(),
                    }
                    .into());
                }
                let parent = self.parent_of(&node)?;
                let path = self.tree.path(*id)?;
                let (command, message) = self.delete_command(&node, &path)?;
                (parent, node.name().to_string(), command, message)
            }
            Operation::LinkComponent { component, target }
            | Operation::LinkService {
                component,
                service: target,
            } => {
                let owner = self.expect_kind(*component, NodeKind::Component)?;
                let linked = self.expect_kind(*target, kind)?;
                let parent = self.parent_of(&owner)?;
                if linked.parent != Some(parent) {
                    return Err(invalid(
                        "link target",
                        "must belong to the same application",
                    ));
                }
                if linked.id == owner.id {
                    return Err(invalid("link target", "cannot link a component to itself"));
                }
                let path = self.tree.path(*component)?;
                let project = path_segment(&path.project, "project")?;
                let app = path_segment(&path.application, "application")?;
                (
                    parent,
                    linked.name().to_string(),
                    commands::link(project, app, owner.name(), linked.name()),
                    format!(
                        "{} '{}' successfully linked with {} '{}'",
                        kind,
                        linked.name(),
                        NodeKind::Component,
                        owner.name()
                    ),
                )
            }
        };

        Ok(Plan {
            parent,
            action,
            key: ResourceKey::new(kind, name),
            command,
            message,
        })
    }

    fn delete_command(
        &self,
        node: &Node,
        path: &crate::domain::ResourcePath,
    ) -> Result<(CommandLine, String)> {
        let kind = node.kind();
        let name = node.name();
        let project = path_segment(&path.project, "project")?;
        if kind == NodeKind::Project {
            return Ok((commands::project_delete(project), deleted(kind, name)));
        }

        let app = path_segment(&path.application, "application")?;
        let command = match kind {
            NodeKind::Application => commands::app_delete(project, app),
            NodeKind::Component => commands::component_delete(project, app, name),
            NodeKind::Service => commands::service_delete(project, app, name),
            NodeKind::Storage | NodeKind::Url => {
                let component = path_segment(&path.component, "component")?;
                let command = if kind == NodeKind::Storage {
                    commands::storage_delete(project, app, component, name)
                } else {
                    commands::url_delete(project, app, component, name)
                };
                let message = format!(
                    "{} '{}' from {} '{}' successfully deleted",
                    kind,
                    name,
                    NodeKind::Component,
                    component
                );
                return Ok((command, message));
            }
            NodeKind::Cluster | NodeKind::Project => {
                return Err(invalid("target", "cannot be deleted"));
            }
        };
        Ok((command, deleted(kind, name)))
    }
}

fn check_name(kind: NodeKind, name: &str) -> Result<()> {
    let reason = validate_name(name);
    if reason.is_valid() {
        Ok(())
    } else {
        Err(ValidationError::InvalidName { kind, reason }.into())
    }
}

fn require(field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(invalid(field, "must not be empty"))
    } else {
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> Error {
    ValidationError::InvalidParameter {
        field,
        reason: reason.to_string(),
    }
    .into()
}

fn created(kind: NodeKind, name: &str) -> String {
    format!("{} '{}' successfully created", kind, name)
}

fn deleted(kind: NodeKind, name: &str) -> String {
    format!("{} '{}' successfully deleted", kind, name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NameValidity;
    use crate::odo::OdoError;
    use crate::ports::CommandOutput;
    use crate::test_support::{Effect, FakeRunner, NEVER};
    use tokio_util::sync::CancellationToken;

    const FAST: Duration = Duration::from_millis(5);

    fn fast() -> OperationOptions {
        OperationOptions::default()
            .with_poll_interval(FAST)
            .with_timeout(Duration::from_secs(5))
    }

    fn projects(runner: FakeRunner, rows: &[&str]) -> FakeRunner {
        runner.listing(commands::project_list(), "ACTIVE   NAME", rows)
    }

    fn add_project(name: &str, delay: usize) -> (CommandLine, Vec<Effect>, usize) {
        (
            commands::project_create(name),
            vec![Effect::Add {
                listing: commands::project_list(),
                row: format!("         {}", name),
            }],
            delay,
        )
    }

    struct Fixture {
        runner: FakeRunner,
        tree: Arc<ResourceTree<Odo<FakeRunner>>>,
        reconciler: Reconciler<FakeRunner>,
        root: NodeId,
    }

    async fn fixture(runner: FakeRunner) -> Fixture {
        let odo = Arc::new(Odo::new(runner.clone()));
        let tree = Arc::new(ResourceTree::new(odo.clone()));
        let root = tree.attach_root("https://api.example.com:6443");
        tree.refresh_children(root).await.unwrap();
        let reconciler = Reconciler::new(odo, tree.clone(), ReconcileSettings::default());
        Fixture {
            runner,
            tree,
            reconciler,
            root,
        }
    }

    /// Cluster `demo` / app `web` / component `frontend` (+ service `db`), all loaded.
    async fn component_fixture(runner: FakeRunner) -> (Fixture, NodeId, NodeId) {
        let runner = projects(runner, &["*  demo"])
            .listing(commands::app_list("demo"), "ACTIVE  NAME", &["*  web"])
            .listing(
                commands::component_list("demo", "web"),
                "ACTIVE  NAME  TYPE",
                &["*  frontend  nodejs:8", "   backend  python:3.6"],
            )
            .listing(
                commands::service_list("demo", "web"),
                "NAME  TYPE  STATUS",
                &["db  mongodb-persistent  ProvisionedSuccessfully"],
            )
            .listing(
                commands::storage_list("demo", "web", "frontend"),
                "NAME  SIZE  PATH",
                &[],
            )
            .listing(
                commands::url_list("demo", "web", "frontend"),
                "NAME  URL  PORT",
                &[],
            );
        let f = fixture(runner).await;
        let project = f.tree.find_child(f.root, "demo").unwrap().id;
        f.tree.refresh_children(project).await.unwrap();
        let app = f.tree.find_child(project, "web").unwrap().id;
        f.tree.refresh_children(app).await.unwrap();
        let component = f
            .tree
            .find_child_of_kind(app, NodeKind::Component, "frontend")
            .unwrap()
            .id;
        f.tree.refresh_children(component).await.unwrap();
        (f, app, component)
    }

    #[tokio::test]
    async fn test_create_settles_after_backend_latency() {
        let (command, effects, delay) = add_project("beta", 2);
        let runner = projects(FakeRunner::new(), &["*  alpha"]).mutation(command, effects, delay);
        let f = fixture(runner).await;

        let settled = f
            .reconciler
            .execute(
                Operation::CreateProject {
                    cluster: f.root,
                    name: "beta".to_string(),
                },
                fast(),
            )
            .await
            .unwrap();

        assert_eq!(settled.message, "Project 'beta' successfully created");
        assert_eq!(settled.attempts, 3);
        assert_eq!(settled.action, Action::Create);
        let node = f.tree.find_child(f.root, "beta").unwrap();
        assert_eq!(settled.node, Some(node.id));
        assert!(f.reconciler.pending_changes(f.root).is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_create_makes_no_calls() {
        let f = fixture(projects(FakeRunner::new(), &["*  alpha"])).await;
        let calls = f.runner.call_count();

        let err = f
            .reconciler
            .execute(
                Operation::CreateProject {
                    cluster: f.root,
                    name: "alpha".to_string(),
                },
                fast(),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Validation(ValidationError::AlreadyExists { kind: NodeKind::Project, ref name }) if name == "alpha"
        ));
        assert_eq!(f.runner.call_count(), calls);
    }

    #[tokio::test]
    async fn test_padded_duplicate_is_rejected() {
        let f = fixture(projects(FakeRunner::new(), &["*  alpha"])).await;
        let calls = f.runner.call_count();

        let err = f
            .reconciler
            .execute(
                Operation::CreateProject {
                    cluster: f.root,
                    name: " alpha ".to_string(),
                },
                fast(),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Validation(ValidationError::AlreadyExists { ref name, .. }) if name == "alpha"
        ));
        assert_eq!(f.runner.call_count(), calls);
    }

    #[tokio::test]
    async fn test_padded_name_is_trimmed() {
        let (command, effects, delay) = add_project("beta", 0);
        let runner = projects(FakeRunner::new(), &["*  alpha"]).mutation(command, effects, delay);
        let f = fixture(runner).await;

        let settled = f
            .reconciler
            .execute(
                Operation::CreateProject {
                    cluster: f.root,
                    name: "  beta\t".to_string(),
                },
                fast(),
            )
            .await
            .unwrap();

        assert_eq!(settled.name, "beta");
        assert_eq!(settled.message, "Project 'beta' successfully created");
        assert!(f
            .runner
            .calls()
            .contains(&commands::project_create("beta")));
        assert!(f.tree.find_child(f.root, "beta").is_some());
    }

    #[tokio::test]
    async fn test_invocation_timeout_is_failed() {
        let runner = projects(FakeRunner::new(), &[])
            .hang(commands::project_create("beta"), Duration::from_secs(60));
        let f = fixture(runner).await;
        let listings = f.runner.count_calls(&commands::project_list());
        let mut events = f.reconciler.subscribe();

        let err = f
            .reconciler
            .execute(
                Operation::CreateProject {
                    cluster: f.root,
                    name: "beta".to_string(),
                },
                fast(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Invocation(OdoError::Timeout { .. })));
        assert!(!err.is_ambiguous());
        assert_eq!(f.runner.count_calls(&commands::project_list()), listings);

        let mut states = Vec::new();
        while let Ok(change) = events.try_recv() {
            states.push(change.state);
        }
        assert_eq!(
            states,
            vec![
                OperationState::Validating,
                OperationState::Invoking,
                OperationState::Failed,
            ]
        );
    }

    #[tokio::test]
    async fn test_parent_locks_are_pruned() {
        let (command, effects, delay) = add_project("beta", 0);
        let runner = projects(FakeRunner::new(), &[]).mutation(command, effects, delay);
        let f = fixture(runner).await;

        f.reconciler
            .execute(
                Operation::CreateProject {
                    cluster: f.root,
                    name: "beta".to_string(),
                },
                fast(),
            )
            .await
            .unwrap();
        f.reconciler
            .execute(
                Operation::CreateProject {
                    cluster: f.root,
                    name: "beta".to_string(),
                },
                fast(),
            )
            .await
            .unwrap_err();

        assert!(f.reconciler.parent_locks.lock().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_name_is_rejected() {
        let f = fixture(projects(FakeRunner::new(), &[])).await;
        let calls = f.runner.call_count();
        let mut events = f.reconciler.subscribe();

        let err = f
            .reconciler
            .execute(
                Operation::CreateProject {
                    cluster: f.root,
                    name: "1project".to_string(),
                },
                fast(),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Validation(ValidationError::InvalidName {
                reason: NameValidity::InvalidCharacters,
                ..
            })
        ));
        assert_eq!(f.runner.call_count(), calls);
        assert_eq!(events.try_recv().unwrap().state, OperationState::Validating);
        assert_eq!(events.try_recv().unwrap().state, OperationState::Rejected);
    }

    #[tokio::test]
    async fn test_unobserved_create_times_out() {
        let (command, effects, _) = add_project("beta", 0);
        let runner = projects(FakeRunner::new(), &[]).mutation(command, effects, NEVER);
        let f = fixture(runner).await;
        let mut events = f.reconciler.subscribe();

        let err = f
            .reconciler
            .execute(
                Operation::CreateProject {
                    cluster: f.root,
                    name: "beta".to_string(),
                },
                fast().with_timeout(Duration::from_millis(100)),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::ReconciliationTimeout { .. }));
        assert!(!matches!(err, Error::Invocation(_)));
        assert!(err.is_ambiguous());

        let mut states = Vec::new();
        while let Ok(change) = events.try_recv() {
            states.push(change.state);
        }
        assert_eq!(states.last(), Some(&OperationState::TimedOut));
        assert!(!states.contains(&OperationState::Failed));
    }

    #[tokio::test]
    async fn test_tool_failure_is_not_polled() {
        let runner = projects(FakeRunner::new(), &[]).respond(
            commands::project_create("beta"),
            CommandOutput::failure(1, "error: project beta is being terminated"),
        );
        let f = fixture(runner).await;
        let listings = f.runner.count_calls(&commands::project_list());

        let err = f
            .reconciler
            .execute(
                Operation::CreateProject {
                    cluster: f.root,
                    name: "beta".to_string(),
                },
                fast(),
            )
            .await
            .unwrap_err();

        match err {
            Error::Invocation(OdoError::CommandFailed { message, .. }) => {
                assert_eq!(message, "error: project beta is being terminated")
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(f.runner.count_calls(&commands::project_list()), listings);
    }

    #[tokio::test]
    async fn test_delete_requires_confirmation() {
        let runner = projects(FakeRunner::new(), &["*  alpha"]).mutation(
            commands::project_delete("alpha"),
            vec![Effect::Remove {
                listing: commands::project_list(),
                name: "alpha".to_string(),
            }],
            1,
        );
        let f = fixture(runner).await;
        let alpha = f.tree.find_child(f.root, "alpha").unwrap().id;
        let calls = f.runner.call_count();

        let err = f
            .reconciler
            .execute(Operation::DeleteProject { project: alpha }, fast())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::NotConfirmed { .. })
        ));
        assert_eq!(f.runner.call_count(), calls);

        let mut options = fast();
        options.confirmed = true;
        let settled = f
            .reconciler
            .execute(Operation::DeleteProject { project: alpha }, options)
            .await
            .unwrap();
        assert_eq!(settled.message, "Project 'alpha' successfully deleted");
        assert_eq!(settled.attempts, 2);
        assert!(f.tree.get(alpha).is_none());
    }

    #[tokio::test]
    async fn test_cancel_stops_polling() {
        let (command, effects, _) = add_project("beta", 0);
        let runner = projects(FakeRunner::new(), &[]).mutation(command, effects, NEVER);
        let f = fixture(runner).await;

        let token = CancellationToken::new();
        let canceller = {
            let token = token.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                token.cancel();
            }
        };
        let operation = f.reconciler.execute(
            Operation::CreateProject {
                cluster: f.root,
                name: "beta".to_string(),
            },
            fast().with_cancel(token),
        );

        let (result, ()) = tokio::join!(operation, canceller);
        assert!(matches!(result, Err(Error::Cancelled { .. })));
        // The backend command was still sent once.
        assert_eq!(f.runner.count_calls(&commands::project_create("beta")), 1);
    }

    #[tokio::test]
    async fn test_pending_change_visible_while_polling() {
        let (command, effects, _) = add_project("beta", 0);
        let runner = projects(FakeRunner::new(), &[]).mutation(command, effects, NEVER);
        let f = fixture(runner).await;

        let operation = f.reconciler.execute(
            Operation::CreateProject {
                cluster: f.root,
                name: "beta".to_string(),
            },
            fast().with_timeout(Duration::from_millis(200)),
        );
        let observer = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            f.reconciler.pending_changes(f.root)
        };

        let (result, pending) = tokio::join!(operation, observer);
        assert!(result.is_err());
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].action, Action::Create);
        assert_eq!(pending[0].key, ResourceKey::new(NodeKind::Project, "beta"));
        assert!(f.reconciler.pending_changes(f.root).is_empty());
    }

    #[tokio::test]
    async fn test_same_parent_operations_are_serialized() {
        let (command, effects, delay) = add_project("beta", 1);
        let runner = projects(FakeRunner::new(), &[]).mutation(command, effects, delay);
        let f = fixture(runner).await;

        let create = || {
            f.reconciler.execute(
                Operation::CreateProject {
                    cluster: f.root,
                    name: "beta".to_string(),
                },
                fast(),
            )
        };
        let (first, second) = tokio::join!(create(), create());

        let outcomes = [first.is_ok(), second.is_ok()];
        assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);
        let rejected = if first.is_err() { first } else { second };
        assert!(matches!(
            rejected,
            Err(Error::Validation(ValidationError::AlreadyExists { .. }))
        ));
        assert_eq!(f.runner.count_calls(&commands::project_create("beta")), 1);
    }

    #[tokio::test]
    async fn test_state_sequence() {
        let (command, effects, delay) = add_project("beta", 0);
        let runner = projects(FakeRunner::new(), &[]).mutation(command, effects, delay);
        let f = fixture(runner).await;
        let mut events = f.reconciler.subscribe();

        f.reconciler
            .execute(
                Operation::CreateProject {
                    cluster: f.root,
                    name: "beta".to_string(),
                },
                fast(),
            )
            .await
            .unwrap();

        let mut states = Vec::new();
        while let Ok(change) = events.try_recv() {
            assert_eq!(change.kind, NodeKind::Project);
            assert_eq!(change.target, f.root);
            states.push(change.state);
        }
        assert_eq!(
            states,
            vec![
                OperationState::Validating,
                OperationState::Invoking,
                OperationState::Polling,
                OperationState::Settled,
            ]
        );
        assert!(states.last().unwrap().is_terminal());
    }

    #[tokio::test]
    async fn test_create_storage_message() {
        let runner = FakeRunner::new().mutation(
            commands::storage_create("demo", "web", "frontend", "data", "/var/data", 1),
            vec![Effect::Add {
                listing: commands::storage_list("demo", "web", "frontend"),
                row: "data  1Gi  /var/data".to_string(),
            }],
            0,
        );
        let (f, _app, component) = component_fixture(runner).await;

        let settled = f
            .reconciler
            .execute(
                Operation::CreateStorage {
                    component,
                    name: "data".to_string(),
                    mount_path: "/var/data".to_string(),
                    size_gib: 1,
                },
                fast(),
            )
            .await
            .unwrap();
        assert_eq!(
            settled.message,
            "Storage 'data' successfully created for Component 'frontend'"
        );
        assert!(f
            .tree
            .find_child_of_kind(component, NodeKind::Storage, "data")
            .is_some());

        let err = f
            .reconciler
            .execute(
                Operation::CreateStorage {
                    component,
                    name: "logs".to_string(),
                    mount_path: "relative".to_string(),
                    size_gib: 1,
                },
                fast(),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::InvalidParameter { field: "mount path", .. })
        ));
    }

    #[tokio::test]
    async fn test_link_service_settles_without_polling() {
        let runner = FakeRunner::new().respond(
            commands::link("demo", "web", "frontend", "db"),
            CommandOutput::success("Service db has been successfully linked"),
        );
        let (f, app, component) = component_fixture(runner).await;
        let service = f
            .tree
            .find_child_of_kind(app, NodeKind::Service, "db")
            .unwrap()
            .id;
        let listings = f
            .runner
            .count_calls(&commands::component_list("demo", "web"));

        let settled = f
            .reconciler
            .execute(Operation::LinkService { component, service }, fast())
            .await
            .unwrap();

        assert_eq!(
            settled.message,
            "Service 'db' successfully linked with Component 'frontend'"
        );
        assert_eq!(settled.attempts, 0);
        assert_eq!(
            f.runner.count_calls(&commands::component_list("demo", "web")),
            listings
        );
    }

    #[tokio::test]
    async fn test_wrong_target_kind() {
        let (f, app, component) = component_fixture(FakeRunner::new()).await;
        let err = f
            .reconciler
            .execute(
                Operation::LinkComponent {
                    component,
                    target: app,
                },
                fast(),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::WrongKind {
                expected: NodeKind::Component,
                actual: NodeKind::Application
            })
        ));
    }
}
