//! Explorer engine - the facade over the odo client, tree and reconciler.
//!
//! A front end creates one engine, attaches the cluster after login, and
//! from then on browses with [`ExplorerEngine::children`] and mutates with
//! the create/delete/link methods. Results of mutations are also queued as
//! notifications for front ends that poll instead of awaiting.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::info;

use crate::adapters::ProcessRunner;
use crate::config::{Config, ConfigStore};
use crate::domain::{ComponentSource, ComponentType, NodeKind, ServiceTemplate};
use crate::error::{Error, Result, ValidationError};
use crate::odo::{path_segment, Odo};
use crate::ports::{CommandRunner, OutputStream};
use crate::reconcile::{
    Operation, OperationOptions, PendingChange, Reconciler, Settled, StateChange,
};
use crate::tree::{Node, NodeId, NodeSnapshot, ResourceTree};

/// Outcome messages for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// A change was applied and observed.
    Info(String),
    /// A change was sent but could not be confirmed.
    Warning(String),
    /// The tool rejected a change.
    Error(String),
}

impl Notification {
    pub fn message(&self) -> &str {
        match self {
            Notification::Info(m) | Notification::Warning(m) | Notification::Error(m) => m,
        }
    }
}

/// The odo explorer engine.
pub struct ExplorerEngine<R: CommandRunner = ProcessRunner> {
    config: Config,
    odo: Arc<Odo<R>>,
    tree: Arc<ResourceTree<Odo<R>>>,
    reconciler: Reconciler<R>,
    pending_notifications: RwLock<Vec<Notification>>,
}

impl ExplorerEngine<ProcessRunner> {
    /// Create an engine that runs the real odo binary.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let runner = ProcessRunner::with_odo_path(config.odo_path.clone());
        Ok(Self::with_runner(runner, config))
    }

    /// Create an engine from `~/.odo-explorer/config.json`.
    pub async fn load() -> Result<Self> {
        let config = ConfigStore::new()?.load().await?;
        Self::new(config)
    }
}

impl<R: CommandRunner> ExplorerEngine<R> {
    /// Create an engine over any command runner.
    pub fn with_runner(runner: R, config: Config) -> Self {
        let mut odo = Odo::new(runner).with_timeout(config.invocation_timeout());
        for (key, value) in &config.env {
            odo = odo.with_env(key.as_str(), value.as_str());
        }
        let odo = Arc::new(odo);
        let tree = Arc::new(ResourceTree::new(odo.clone()));
        let reconciler = Reconciler::new(odo.clone(), tree.clone(), config.reconcile_settings());

        Self {
            config,
            odo,
            tree,
            reconciler,
            pending_notifications: RwLock::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn odo(&self) -> &Odo<R> {
        &self.odo
    }

    pub fn tree(&self) -> &ResourceTree<Odo<R>> {
        &self.tree
    }

    // =========================================================================
    // Cluster root
    // =========================================================================

    /// Attach the cluster root; called by the login layer on success.
    pub fn attach_cluster(&self, server_url: &str) -> NodeId {
        self.tree.attach_root(server_url)
    }

    /// Drop the whole tree; called on logout.
    pub fn detach_cluster(&self) {
        self.tree.detach_root();
        self.reconciler.prune_locks();
    }

    pub fn root(&self) -> Result<NodeId> {
        self.tree.root().ok_or(Error::NoCluster)
    }

    // =========================================================================
    // Browsing
    // =========================================================================

    /// Re-list a node's children from the cluster.
    pub async fn refresh(&self, node: NodeId) -> Result<Vec<Node>> {
        self.tree.refresh_children(node).await
    }

    /// Children of a node, listed from the cluster the first time only.
    pub async fn children(&self, node: NodeId) -> Result<Vec<Node>> {
        if self.tree.is_loaded(node) {
            self.tree.children(node)
        } else {
            self.tree.refresh_children(node).await
        }
    }

    /// Walk down from the root by (kind, name), loading levels as needed.
    pub async fn locate(&self, steps: &[(NodeKind, &str)]) -> Result<NodeId> {
        let mut current = self.root()?;
        for &(kind, name) in steps {
            if !self.tree.is_loaded(current) {
                self.tree.refresh_children(current).await?;
            }
            current = self
                .tree
                .find_child_of_kind(current, kind, name)
                .ok_or_else(|| Error::ResourceNotFound {
                    kind,
                    name: name.to_string(),
                })?
                .id;
        }
        Ok(current)
    }

    /// Load `depth` levels below `node` and return the resulting subtree.
    pub async fn expand(&self, node: NodeId, depth: usize) -> Result<NodeSnapshot> {
        let mut level = vec![node];
        for _ in 0..depth {
            let mut next = Vec::new();
            for id in level {
                if !self.tree.node(id)?.kind().is_leaf() {
                    next.extend(self.children(id).await?.into_iter().map(|n| n.id));
                }
            }
            level = next;
        }
        self.tree.snapshot(node).ok_or(Error::NodeNotFound(node))
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Run an operation and queue its outcome as a notification.
    pub async fn execute(&self, operation: Operation, options: OperationOptions) -> Result<Settled> {
        let result = self.reconciler.execute(operation, options).await;
        let notification = match &result {
            Ok(settled) => Some(Notification::Info(settled.message.clone())),
            Err(e) if e.is_ambiguous() => Some(Notification::Warning(e.to_string())),
            Err(Error::Invocation(e)) => Some(Notification::Error(e.to_string())),
            Err(_) => None,
        };
        if let Some(notification) = notification {
            self.pending_notifications.write().push(notification);
        }
        result
    }

    pub async fn create_project(&self, name: &str) -> Result<Settled> {
        let cluster = self.root()?;
        self.execute(
            Operation::CreateProject {
                cluster,
                name: name.to_string(),
            },
            OperationOptions::default(),
        )
        .await
    }

    pub async fn create_application(&self, project: NodeId, name: &str) -> Result<Settled> {
        self.execute(
            Operation::CreateApplication {
                project,
                name: name.to_string(),
            },
            OperationOptions::default(),
        )
        .await
    }

    pub async fn create_component(
        &self,
        application: NodeId,
        name: &str,
        component_type: &str,
        version: &str,
        source: Option<ComponentSource>,
    ) -> Result<Settled> {
        self.execute(
            Operation::CreateComponent {
                application,
                name: name.to_string(),
                component_type: component_type.to_string(),
                version: version.to_string(),
                source,
            },
            OperationOptions::default(),
        )
        .await
    }

    pub async fn create_storage(
        &self,
        component: NodeId,
        name: &str,
        mount_path: &str,
        size_gib: u32,
    ) -> Result<Settled> {
        self.execute(
            Operation::CreateStorage {
                component,
                name: name.to_string(),
                mount_path: mount_path.to_string(),
                size_gib,
            },
            OperationOptions::default(),
        )
        .await
    }

    pub async fn create_url(&self, component: NodeId, name: &str, port: Option<u16>) -> Result<Settled> {
        self.execute(
            Operation::CreateUrl {
                component,
                name: name.to_string(),
                port,
            },
            OperationOptions::default(),
        )
        .await
    }

    pub async fn create_service(
        &self,
        application: NodeId,
        name: &str,
        template: &str,
        plan: &str,
    ) -> Result<Settled> {
        self.execute(
            Operation::CreateService {
                application,
                name: name.to_string(),
                template: template.to_string(),
                plan: plan.to_string(),
            },
            OperationOptions::default(),
        )
        .await
    }

    /// Delete any deletable node; the operation is chosen from its kind.
    pub async fn delete(&self, node: NodeId, options: OperationOptions) -> Result<Settled> {
        let operation = match self.tree.node(node)?.kind() {
            NodeKind::Project => Operation::DeleteProject { project: node },
            NodeKind::Application => Operation::DeleteApplication { application: node },
            NodeKind::Component => Operation::DeleteComponent { component: node },
            NodeKind::Storage => Operation::DeleteStorage { storage: node },
            NodeKind::Url => Operation::DeleteUrl { url: node },
            NodeKind::Service => Operation::DeleteService { service: node },
            NodeKind::Cluster => {
                return Err(ValidationError::InvalidParameter {
                    field: "target",
                    reason: "the cluster cannot be deleted".to_string(),
                }
                .into())
            }
        };
        self.execute(operation, options).await
    }

    /// Link a component to another component or to a service.
    pub async fn link(&self, component: NodeId, target: NodeId) -> Result<Settled> {
        let operation = match self.tree.node(target)?.kind() {
            NodeKind::Service => Operation::LinkService {
                component,
                service: target,
            },
            _ => Operation::LinkComponent { component, target },
        };
        self.execute(operation, OperationOptions::default()).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.reconciler.subscribe()
    }

    pub fn pending_changes(&self, parent: NodeId) -> Vec<PendingChange> {
        self.reconciler.pending_changes(parent)
    }

    /// Get and clear pending notifications.
    pub fn get_pending_notifications(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.pending_notifications.write())
    }

    // =========================================================================
    // Catalog & component actions
    // =========================================================================

    pub async fn version(&self) -> Result<String> {
        Ok(self.odo.version().await?)
    }

    pub async fn component_types(&self) -> Result<Vec<ComponentType>> {
        Ok(self.odo.component_types().await?)
    }

    pub async fn service_templates(&self) -> Result<Vec<ServiceTemplate>> {
        Ok(self.odo.service_templates().await?)
    }

    pub async fn describe_service_template(&self, template: &str) -> Result<String> {
        Ok(self.odo.describe_service_template(template).await?)
    }

    /// Describe an application or component.
    pub async fn describe(&self, node: NodeId) -> Result<String> {
        let kind = self.tree.node(node)?.kind();
        if !matches!(kind, NodeKind::Application | NodeKind::Component) {
            return Err(ValidationError::WrongKind {
                expected: NodeKind::Component,
                actual: kind,
            }
            .into());
        }
        let path = self.tree.path(node)?;
        let project = path_segment(&path.project, "project")?;
        let app = path_segment(&path.application, "application")?;
        match &path.component {
            Some(component) => Ok(self.odo.describe_component(project, app, component).await?),
            None => Ok(self.odo.describe_application(project, app).await?),
        }
    }

    fn component_path(&self, node: NodeId) -> Result<(String, String, String)> {
        let actual = self.tree.node(node)?.kind();
        if actual != NodeKind::Component {
            return Err(ValidationError::WrongKind {
                expected: NodeKind::Component,
                actual,
            }
            .into());
        }
        let path = self.tree.path(node)?;
        Ok((
            path_segment(&path.project, "project")?.to_string(),
            path_segment(&path.application, "application")?.to_string(),
            path_segment(&path.component, "component")?.to_string(),
        ))
    }

    pub async fn log(&self, component: NodeId) -> Result<String> {
        let (project, app, name) = self.component_path(component)?;
        Ok(self.odo.component_log(&project, &app, &name).await?)
    }

    pub async fn push(&self, component: NodeId) -> Result<String> {
        let (project, app, name) = self.component_path(component)?;
        info!(component = %name, "Pushing component");
        Ok(self.odo.push_component(&project, &app, &name).await?)
    }

    /// Stream a component's log. Not reconciled; the stream ends when odo exits.
    pub async fn follow_log(&self, component: NodeId) -> Result<OutputStream> {
        let (project, app, name) = self.component_path(component)?;
        Ok(self.odo.follow_log(&project, &app, &name).await?)
    }

    /// Stream `odo watch` output for a component.
    pub async fn watch(&self, component: NodeId) -> Result<OutputStream> {
        let (project, app, name) = self.component_path(component)?;
        Ok(self.odo.watch_component(&project, &app, &name).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::odo::commands;
    use crate::ports::CommandOutput;
    use crate::test_support::{Effect, FakeRunner, NEVER};
    use std::time::Duration;

    fn config() -> Config {
        Config {
            poll_interval_ms: 5,
            reconcile_timeout_secs: 5,
            ..Default::default()
        }
    }

    fn backend() -> FakeRunner {
        FakeRunner::new()
            .listing(commands::project_list(), "ACTIVE  NAME", &["*  demo"])
            .listing(commands::app_list("demo"), "ACTIVE  NAME", &["*  web"])
            .listing(
                commands::component_list("demo", "web"),
                "ACTIVE  NAME  TYPE",
                &["*  frontend  nodejs:8"],
            )
            .listing(commands::service_list("demo", "web"), "NAME  TYPE", &[])
    }

    #[tokio::test]
    async fn test_no_cluster() {
        let engine = ExplorerEngine::with_runner(backend(), config());
        assert!(matches!(engine.root(), Err(Error::NoCluster)));
        assert!(matches!(
            engine.create_project("demo").await,
            Err(Error::NoCluster)
        ));
    }

    #[tokio::test]
    async fn test_locate_loads_levels() {
        let engine = ExplorerEngine::with_runner(backend(), config());
        engine.attach_cluster("https://api.example.com:6443");

        let component = engine
            .locate(&[
                (NodeKind::Project, "demo"),
                (NodeKind::Application, "web"),
                (NodeKind::Component, "frontend"),
            ])
            .await
            .unwrap();
        assert_eq!(engine.tree().node(component).unwrap().name(), "frontend");

        let missing = engine
            .locate(&[(NodeKind::Project, "other")])
            .await
            .unwrap_err();
        assert!(matches!(
            missing,
            Error::ResourceNotFound { kind: NodeKind::Project, .. }
        ));
    }

    #[tokio::test]
    async fn test_expand() {
        let engine = ExplorerEngine::with_runner(backend(), config());
        let root = engine.attach_cluster("https://api.example.com:6443");

        let snapshot = engine.expand(root, 2).await.unwrap();
        assert_eq!(snapshot.children.len(), 1);
        assert_eq!(snapshot.children[0].children.len(), 1);
        assert!(!snapshot.children[0].children[0].loaded);
    }

    #[tokio::test]
    async fn test_notifications() {
        let runner = backend()
            .mutation(
                commands::app_create("demo", "api"),
                vec![Effect::Add {
                    listing: commands::app_list("demo"),
                    row: "   api".to_string(),
                }],
                0,
            )
            .mutation(commands::app_create("demo", "slow"), vec![], NEVER)
            .respond(
                commands::app_create("demo", "broken"),
                CommandOutput::failure(1, "error: quota exceeded"),
            );
        let mut config = config();
        config.reconcile_timeout_secs = 1;
        let engine = ExplorerEngine::with_runner(runner, config);
        engine.attach_cluster("https://api.example.com:6443");
        let project = engine.locate(&[(NodeKind::Project, "demo")]).await.unwrap();
        engine.children(project).await.unwrap();

        engine.create_application(project, "api").await.unwrap();
        assert!(engine.create_application(project, "slow").await.is_err());
        assert!(engine.create_application(project, "broken").await.is_err());
        // Rejected before invocation: no notification.
        assert!(engine.create_application(project, "web").await.is_err());

        let notifications = engine.get_pending_notifications();
        assert_eq!(notifications.len(), 3);
        assert_eq!(
            notifications[0],
            Notification::Info("Application 'api' successfully created".to_string())
        );
        assert!(matches!(notifications[1], Notification::Warning(_)));
        assert!(notifications[2].message().contains("quota exceeded"));
        assert!(engine.get_pending_notifications().is_empty());
    }

    #[tokio::test]
    async fn test_delete_picks_operation_from_kind() {
        let runner = backend().mutation(
            commands::component_delete("demo", "web", "frontend"),
            vec![Effect::Remove {
                listing: commands::component_list("demo", "web"),
                name: "frontend".to_string(),
            }],
            0,
        );
        let engine = ExplorerEngine::with_runner(runner.clone(), config());
        let root = engine.attach_cluster("https://api.example.com:6443");
        let component = engine
            .locate(&[
                (NodeKind::Project, "demo"),
                (NodeKind::Application, "web"),
                (NodeKind::Component, "frontend"),
            ])
            .await
            .unwrap();

        let settled = engine
            .delete(component, OperationOptions::confirmed())
            .await
            .unwrap();
        assert_eq!(settled.message, "Component 'frontend' successfully deleted");
        assert_eq!(
            runner.count_calls(&commands::component_delete("demo", "web", "frontend")),
            1
        );

        assert!(matches!(
            engine.delete(root, OperationOptions::confirmed()).await,
            Err(Error::Validation(ValidationError::InvalidParameter { .. }))
        ));
    }

    #[tokio::test]
    async fn test_component_actions() {
        let runner = backend()
            .respond(
                commands::component_describe("demo", "web", "frontend"),
                CommandOutput::success("Component frontend of type nodejs"),
            )
            .respond(
                commands::component_push("demo", "web", "frontend"),
                CommandOutput::success("Changes successfully pushed"),
            );
        let engine = ExplorerEngine::with_runner(runner, config());
        engine.attach_cluster("https://api.example.com:6443");
        let app = engine
            .locate(&[(NodeKind::Project, "demo"), (NodeKind::Application, "web")])
            .await
            .unwrap();
        let component = engine
            .locate(&[
                (NodeKind::Project, "demo"),
                (NodeKind::Application, "web"),
                (NodeKind::Component, "frontend"),
            ])
            .await
            .unwrap();

        assert_eq!(
            engine.describe(component).await.unwrap(),
            "Component frontend of type nodejs"
        );
        assert_eq!(
            engine.push(component).await.unwrap(),
            "Changes successfully pushed"
        );
        assert!(matches!(
            engine.push(app).await,
            Err(Error::Validation(ValidationError::WrongKind { .. }))
        ));
    }

    #[test]
    fn test_env_overlay_and_timeout() {
        let mut config = config();
        config.invocation_timeout_secs = 7;
        config.env.insert("ODO_DISABLE_TELEMETRY".to_string(), "true".to_string());
        let engine = ExplorerEngine::with_runner(FakeRunner::new(), config);
        assert_eq!(engine.odo().invocation_timeout(), Duration::from_secs(7));
    }
}
