//! Tree command - render the resource hierarchy.

use anyhow::Result;
use odo_explorer_core::NodeSnapshot;

use super::Context;

pub async fn show(ctx: &Context, depth: usize, json: bool) -> Result<()> {
    let root = ctx.engine.root()?;
    let snapshot = ctx.engine.expand(root, depth).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    let mut lines = Vec::new();
    render(&snapshot, "", true, true, &mut lines);
    for line in lines {
        println!("{}", line);
    }
    Ok(())
}

fn render(node: &NodeSnapshot, prefix: &str, last: bool, top: bool, out: &mut Vec<String>) {
    let label = format!("{} {}", node.resource.kind(), node.resource);
    if top {
        out.push(label);
    } else {
        let branch = if last { "└── " } else { "├── " };
        out.push(format!("{}{}{}", prefix, branch, label));
    }

    let child_prefix = if top {
        String::new()
    } else if last {
        format!("{}    ", prefix)
    } else {
        format!("{}│   ", prefix)
    };
    for (i, child) in node.children.iter().enumerate() {
        render(
            child,
            &child_prefix,
            i + 1 == node.children.len(),
            false,
            out,
        );
    }
}
