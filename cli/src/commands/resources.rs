//! List, create and delete commands for every resource kind.

use anyhow::Result;
use odo_explorer_core::{
    ComponentSource, Node, NodeId, NodeKind, OperationOptions, Resource,
};

use super::{confirm, Context};
use crate::{AppScope, ComponentScope};

const DEFAULT_VERSION: &str = "latest";

fn print_nodes(nodes: &[Node], kind: NodeKind, json: bool) -> Result<()> {
    let resources: Vec<&Resource> = nodes
        .iter()
        .filter(|n| n.kind() == kind)
        .map(|n| &n.resource)
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&resources)?);
        return Ok(());
    }

    if resources.is_empty() {
        println!("No {} found.", kind.display_name().to_lowercase());
        return Ok(());
    }

    for resource in &resources {
        println!("{}", resource);
    }
    Ok(())
}

async fn delete(ctx: &Context, node: NodeId, yes: bool, json: bool) -> Result<()> {
    let target = ctx.engine.tree().node(node)?;
    let prompt = format!("Do you want to delete {} '{}'", target.kind(), target.name());
    if !confirm(&prompt, yes)? {
        println!("Cancelled.");
        return Ok(());
    }
    let settled = ctx
        .engine
        .delete(node, OperationOptions::confirmed())
        .await?;
    ctx.print_settled(&settled, json)
}

// Projects

pub async fn list_projects(ctx: &Context, json: bool) -> Result<()> {
    let root = ctx.engine.root()?;
    let nodes = ctx.engine.refresh(root).await?;
    print_nodes(&nodes, NodeKind::Project, json)
}

pub async fn create_project(ctx: &Context, name: &str, json: bool) -> Result<()> {
    let settled = ctx.engine.create_project(name).await?;
    ctx.print_settled(&settled, json)
}

pub async fn delete_project(ctx: &Context, name: &str, yes: bool, json: bool) -> Result<()> {
    let project = ctx.project(name).await?;
    delete(ctx, project, yes, json).await
}

// Applications

pub async fn list_applications(ctx: &Context, project: &str, json: bool) -> Result<()> {
    let project = ctx.project(project).await?;
    let nodes = ctx.engine.refresh(project).await?;
    print_nodes(&nodes, NodeKind::Application, json)
}

pub async fn create_application(ctx: &Context, project: &str, name: &str, json: bool) -> Result<()> {
    let project = ctx.project(project).await?;
    let settled = ctx.engine.create_application(project, name).await?;
    ctx.print_settled(&settled, json)
}

pub async fn delete_application(
    ctx: &Context,
    project: &str,
    name: &str,
    yes: bool,
    json: bool,
) -> Result<()> {
    let scope = AppScope {
        project: project.to_string(),
        app: name.to_string(),
    };
    let app = ctx.application(&scope).await?;
    delete(ctx, app, yes, json).await
}

// Components

pub async fn list_components(ctx: &Context, scope: &AppScope, json: bool) -> Result<()> {
    let app = ctx.application(scope).await?;
    let nodes = ctx.engine.refresh(app).await?;
    print_nodes(&nodes, NodeKind::Component, json)
}

/// Builds the component source from the mutually exclusive flags.
pub fn source_from_flags(
    git: Option<String>,
    binary: Option<String>,
    local: Option<String>,
) -> Option<ComponentSource> {
    git.map(ComponentSource::git)
        .or_else(|| binary.map(ComponentSource::binary))
        .or_else(|| local.map(ComponentSource::local))
}

pub async fn create_component(
    ctx: &Context,
    scope: &AppScope,
    name: &str,
    component_type: &str,
    source: Option<ComponentSource>,
    json: bool,
) -> Result<()> {
    let (component_type, version) = component_type
        .split_once(':')
        .unwrap_or((component_type, DEFAULT_VERSION));
    let app = ctx.application(scope).await?;
    let settled = ctx
        .engine
        .create_component(app, name, component_type, version, source)
        .await?;
    ctx.print_settled(&settled, json)
}

pub async fn delete_component(
    ctx: &Context,
    scope: &AppScope,
    name: &str,
    yes: bool,
    json: bool,
) -> Result<()> {
    let component = ctx.app_child(scope, NodeKind::Component, name).await?;
    delete(ctx, component, yes, json).await
}

// Storage & URLs

pub async fn list_component_children(
    ctx: &Context,
    scope: &ComponentScope,
    kind: NodeKind,
    json: bool,
) -> Result<()> {
    let component = ctx.component(scope).await?;
    let nodes = ctx.engine.refresh(component).await?;
    print_nodes(&nodes, kind, json)
}

pub async fn create_storage(
    ctx: &Context,
    scope: &ComponentScope,
    name: &str,
    mount_path: &str,
    size_gib: u32,
    json: bool,
) -> Result<()> {
    let component = ctx.component(scope).await?;
    let settled = ctx
        .engine
        .create_storage(component, name, mount_path, size_gib)
        .await?;
    ctx.print_settled(&settled, json)
}

pub async fn create_url(
    ctx: &Context,
    scope: &ComponentScope,
    name: &str,
    port: Option<u16>,
    json: bool,
) -> Result<()> {
    let component = ctx.component(scope).await?;
    let settled = ctx.engine.create_url(component, name, port).await?;
    ctx.print_settled(&settled, json)
}

pub async fn delete_component_child(
    ctx: &Context,
    scope: &ComponentScope,
    kind: NodeKind,
    name: &str,
    yes: bool,
    json: bool,
) -> Result<()> {
    let component = ctx.component(scope).await?;
    ctx.engine.children(component).await?;
    let node = ctx
        .engine
        .tree()
        .find_child_of_kind(component, kind, name)
        .ok_or_else(|| anyhow::anyhow!("{} '{}' not found", kind, name))?;
    delete(ctx, node.id, yes, json).await
}

// Services

pub async fn list_services(ctx: &Context, scope: &AppScope, json: bool) -> Result<()> {
    let app = ctx.application(scope).await?;
    let nodes = ctx.engine.refresh(app).await?;
    print_nodes(&nodes, NodeKind::Service, json)
}

pub async fn create_service(
    ctx: &Context,
    scope: &AppScope,
    name: &str,
    template: &str,
    plan: &str,
    json: bool,
) -> Result<()> {
    let app = ctx.application(scope).await?;
    let settled = ctx
        .engine
        .create_service(app, name, template, plan)
        .await?;
    ctx.print_settled(&settled, json)
}

pub async fn delete_service(
    ctx: &Context,
    scope: &AppScope,
    name: &str,
    yes: bool,
    json: bool,
) -> Result<()> {
    let service = ctx.app_child(scope, NodeKind::Service, name).await?;
    delete(ctx, service, yes, json).await
}
