//! Version and catalog commands.

use anyhow::Result;

use super::Context;

pub async fn version(ctx: &Context, json: bool) -> Result<()> {
    let version = ctx.engine.version().await?;
    if json {
        println!("{}", serde_json::json!({ "version": version }));
    } else {
        println!("odo v{}", version);
    }
    Ok(())
}

pub async fn components(ctx: &Context, json: bool) -> Result<()> {
    let types = ctx.engine.component_types().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&types)?);
        return Ok(());
    }

    if types.is_empty() {
        println!("No component types found.");
        return Ok(());
    }

    println!("{:<24} VERSIONS", "NAME");
    for component_type in &types {
        println!("{:<24} {}", component_type.name, component_type.tags.join(", "));
    }
    Ok(())
}

pub async fn services(ctx: &Context, json: bool) -> Result<()> {
    let templates = ctx.engine.service_templates().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&templates)?);
        return Ok(());
    }

    if templates.is_empty() {
        println!("No service templates found.");
        return Ok(());
    }

    println!("{:<32} PLANS", "NAME");
    for template in &templates {
        println!("{:<32} {}", template.name, template.available_plans.join(", "));
    }
    Ok(())
}

pub async fn describe_service(ctx: &Context, service: &str) -> Result<()> {
    print!("{}", ctx.engine.describe_service_template(service).await?);
    Ok(())
}
