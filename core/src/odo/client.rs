//! Typed odo client.

use std::time::Duration;

use tracing::{debug, warn};

use super::commands;
use super::errors::{is_fatal_stderr, OdoError, Result};
use super::parser;
use crate::domain::{
    component_type_names, component_type_tags, service_template_plans, ComponentType, NodeKind,
    Resource, ResourcePath, ServiceTemplate,
};
use crate::error::ValidationError;
use crate::ports::{ChildSource, CommandLine, CommandOutput, CommandRunner, OutputStream, RunOptions};

/// Runs odo invocations and turns their output into typed values.
///
/// Every query goes to the tool; nothing is cached here. The resource tree
/// is the cache.
pub struct Odo<R: CommandRunner> {
    runner: R,
    options: RunOptions,
}

impl<R: CommandRunner> Odo<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            options: RunOptions::default(),
        }
    }

    /// Sets the deadline applied to every captured invocation.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = timeout;
        self
    }

    /// Adds an environment variable to every invocation.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.env.insert(key.into(), value.into());
        self
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn invocation_timeout(&self) -> Duration {
        self.options.timeout
    }

    /// Runs a command and returns its raw output, whatever the exit status.
    pub async fn capture(&self, command: &CommandLine) -> Result<CommandOutput> {
        self.runner.run(command, &self.options).await
    }

    /// Runs a command that must succeed and returns its stdout.
    ///
    /// A non-zero exit, or an error printed to stderr despite a zero exit,
    /// becomes an error carrying the tool's own message.
    pub async fn execute(&self, command: &CommandLine) -> Result<String> {
        let output = self.capture(command).await?;
        if output.is_success() && !is_fatal_stderr(&output.stderr) {
            return Ok(output.stdout);
        }

        let message = if output.stderr.trim().is_empty() {
            &output.stdout
        } else {
            &output.stderr
        };
        warn!(command = %command, exit_code = ?output.exit_code, "odo reported an error");
        Err(OdoError::from_tool_error(
            &command.to_string(),
            output.exit_code,
            message,
        ))
    }

    /// Starts a long-running command and returns its live output.
    pub async fn stream(&self, command: &CommandLine) -> Result<OutputStream> {
        self.runner.stream(command, &self.options).await
    }

    // =========================================================================
    // Version & catalog
    // =========================================================================

    /// The tool's version, or `0.0.0` when the banner is unrecognised.
    ///
    /// odo exits non-zero when no cluster is reachable but still prints its
    /// banner, so the exit status is ignored.
    pub async fn version(&self) -> Result<String> {
        let output = self.capture(&commands::version()).await?;
        Ok(parser::parse_version(&output.stdout))
    }

    pub async fn component_types(&self) -> Result<Vec<ComponentType>> {
        let stdout = self.execute(&commands::catalog_list_components()).await?;
        Ok(parser::parse_component_types(&stdout))
    }

    pub async fn component_type_names(&self) -> Result<Vec<String>> {
        Ok(component_type_names(&self.component_types().await?))
    }

    pub async fn component_type_versions(&self, component_type: &str) -> Result<Vec<String>> {
        Ok(component_type_tags(
            &self.component_types().await?,
            component_type,
        ))
    }

    pub async fn service_templates(&self) -> Result<Vec<ServiceTemplate>> {
        let stdout = self.execute(&commands::catalog_list_services()).await?;
        Ok(parser::parse_service_templates(&stdout))
    }

    pub async fn service_template_names(&self) -> Result<Vec<String>> {
        Ok(self
            .service_templates()
            .await?
            .into_iter()
            .map(|t| t.name)
            .collect())
    }

    pub async fn service_template_plans(&self, template: &str) -> Result<Vec<String>> {
        Ok(service_template_plans(
            &self.service_templates().await?,
            template,
        ))
    }

    pub async fn describe_service_template(&self, template: &str) -> Result<String> {
        self.execute(&commands::catalog_describe_service(template))
            .await
    }

    // =========================================================================
    // Listings
    // =========================================================================

    pub async fn projects(&self) -> Result<Vec<Resource>> {
        let stdout = self.execute(&commands::project_list()).await?;
        Ok(parser::parse_names(&stdout)
            .into_iter()
            .map(Resource::project)
            .collect())
    }

    pub async fn applications(&self, project: &str) -> Result<Vec<Resource>> {
        let stdout = self.execute(&commands::app_list(project)).await?;
        Ok(parser::parse_names(&stdout)
            .into_iter()
            .map(Resource::application)
            .collect())
    }

    pub async fn components(&self, project: &str, app: &str) -> Result<Vec<Resource>> {
        let stdout = self.execute(&commands::component_list(project, app)).await?;
        Ok(parser::parse_components(&stdout))
    }

    pub async fn services(&self, project: &str, app: &str) -> Result<Vec<Resource>> {
        let stdout = self.execute(&commands::service_list(project, app)).await?;
        Ok(parser::parse_services(&stdout))
    }

    pub async fn storage(&self, project: &str, app: &str, component: &str) -> Result<Vec<Resource>> {
        let stdout = self
            .execute(&commands::storage_list(project, app, component))
            .await?;
        Ok(parser::parse_storage(&stdout))
    }

    pub async fn urls(&self, project: &str, app: &str, component: &str) -> Result<Vec<Resource>> {
        let stdout = self
            .execute(&commands::url_list(project, app, component))
            .await?;
        Ok(parser::parse_urls(&stdout))
    }

    // =========================================================================
    // Describe, log, push
    // =========================================================================

    pub async fn describe_application(&self, project: &str, app: &str) -> Result<String> {
        self.execute(&commands::app_describe(project, app)).await
    }

    pub async fn describe_component(&self, project: &str, app: &str, component: &str) -> Result<String> {
        self.execute(&commands::component_describe(project, app, component))
            .await
    }

    pub async fn component_log(&self, project: &str, app: &str, component: &str) -> Result<String> {
        self.execute(&commands::component_log(project, app, component, false))
            .await
    }

    pub async fn push_component(&self, project: &str, app: &str, component: &str) -> Result<String> {
        self.execute(&commands::component_push(project, app, component))
            .await
    }

    /// Follows a component's log until the receiver is dropped.
    pub async fn follow_log(&self, project: &str, app: &str, component: &str) -> Result<OutputStream> {
        debug!(project, app, component, "Following component log");
        self.stream(&commands::component_log(project, app, component, true))
            .await
    }

    /// Watches a component's source and pushes on change.
    pub async fn watch_component(
        &self,
        project: &str,
        app: &str,
        component: &str,
    ) -> Result<OutputStream> {
        debug!(project, app, component, "Watching component");
        self.stream(&commands::component_watch(project, app, component))
            .await
    }
}

/// Reads a required segment of a resource path.
pub(crate) fn path_segment<'a>(
    value: &'a Option<String>,
    field: &'static str,
) -> crate::error::Result<&'a str> {
    value.as_deref().ok_or_else(|| {
        ValidationError::InvalidParameter {
            field,
            reason: "missing from resource path".to_string(),
        }
        .into()
    })
}

impl<R: CommandRunner> ChildSource for Odo<R> {
    async fn list_children(
        &self,
        kind: NodeKind,
        path: &ResourcePath,
    ) -> crate::error::Result<Vec<Resource>> {
        let children = match kind {
            NodeKind::Cluster => self.projects().await?,
            NodeKind::Project => {
                let project = path_segment(&path.project, "project")?;
                self.applications(project).await?
            }
            NodeKind::Application => {
                let project = path_segment(&path.project, "project")?;
                let app = path_segment(&path.application, "application")?;
                let mut children = self.components(project, app).await?;
                children.extend(self.services(project, app).await?);
                children
            }
            NodeKind::Component => {
                let project = path_segment(&path.project, "project")?;
                let app = path_segment(&path.application, "application")?;
                let component = path_segment(&path.component, "component")?;
                let mut children = self.storage(project, app, component).await?;
                children.extend(self.urls(project, app, component).await?);
                children
            }
            NodeKind::Storage | NodeKind::Url | NodeKind::Service => Vec::new(),
        };
        debug!(kind = %kind, count = children.len(), "Listed children");
        Ok(children)
    }
}
