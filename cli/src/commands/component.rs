//! Describe, log, push, watch and link commands.

use anyhow::Result;
use odo_explorer_core::ports::{OutputSource, OutputStream};
use odo_explorer_core::NodeKind;

use super::Context;
use crate::{AppScope, ComponentScope};

pub async fn describe_application(ctx: &Context, project: &str, name: &str) -> Result<()> {
    let scope = AppScope {
        project: project.to_string(),
        app: name.to_string(),
    };
    let app = ctx.application(&scope).await?;
    print!("{}", ctx.engine.describe(app).await?);
    Ok(())
}

pub async fn describe(ctx: &Context, scope: &ComponentScope) -> Result<()> {
    let component = ctx.component(scope).await?;
    print!("{}", ctx.engine.describe(component).await?);
    Ok(())
}

pub async fn log(ctx: &Context, scope: &ComponentScope, follow: bool) -> Result<()> {
    let component = ctx.component(scope).await?;
    if follow {
        drain(ctx.engine.follow_log(component).await?).await;
    } else {
        print!("{}", ctx.engine.log(component).await?);
    }
    Ok(())
}

pub async fn push(ctx: &Context, scope: &ComponentScope) -> Result<()> {
    let component = ctx.component(scope).await?;
    print!("{}", ctx.engine.push(component).await?);
    Ok(())
}

pub async fn watch(ctx: &Context, scope: &ComponentScope) -> Result<()> {
    let component = ctx.component(scope).await?;
    drain(ctx.engine.watch(component).await?).await;
    Ok(())
}

pub async fn link(
    ctx: &Context,
    scope: &ComponentScope,
    target: &str,
    service: bool,
    json: bool,
) -> Result<()> {
    let component = ctx.component(scope).await?;
    let kind = if service {
        NodeKind::Service
    } else {
        NodeKind::Component
    };
    let target = ctx.app_child(&scope.app, kind, target).await?;
    let settled = ctx.engine.link(component, target).await?;
    ctx.print_settled(&settled, json)
}

/// Prints live output until the process exits.
async fn drain(mut stream: OutputStream) {
    while let Some(line) = stream.recv().await {
        match line.source {
            OutputSource::Stdout => println!("{}", line.text),
            OutputSource::Stderr => eprintln!("{}", line.text),
        }
    }
}
