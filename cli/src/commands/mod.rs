//! Command implementations.

pub mod catalog;
pub mod component;
pub mod config;
pub mod resources;
pub mod tree;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use odo_explorer_core::{
    Config, ConfigStore, ExplorerEngine, NodeId, NodeKind, Notification, Settled,
};

use crate::{AppScope, ComponentScope};

/// Label of the cluster root when no server URL is configured.
const CURRENT_CLUSTER: &str = "current-context";

/// Command-line values that take precedence over the config file.
pub struct Overrides {
    pub odo_path: Option<PathBuf>,
    pub server_url: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl Overrides {
    pub fn apply(&self, config: &mut Config) {
        if let Some(path) = &self.odo_path {
            config.odo_path = Some(path.clone());
        }
        if let Some(url) = &self.server_url {
            config.server_url = Some(url.clone());
        }
        if let Some(secs) = self.timeout_secs {
            config.reconcile_timeout_secs = secs;
        }
    }
}

/// Loads the effective configuration: file values, then overrides.
pub async fn load_config(overrides: &Overrides) -> Result<Config> {
    let store = ConfigStore::new()?;
    let mut config = store
        .load()
        .await
        .with_context(|| format!("loading {}", store.path().display()))?;
    overrides.apply(&mut config);
    Ok(config)
}

/// An engine with the cluster root attached.
pub struct Context {
    pub engine: ExplorerEngine,
}

impl Context {
    pub async fn open(overrides: Overrides) -> Result<Self> {
        let config = load_config(&overrides).await?;
        let server_url = config
            .server_url
            .clone()
            .unwrap_or_else(|| CURRENT_CLUSTER.to_string());

        let engine = ExplorerEngine::new(config)?;
        engine.attach_cluster(&server_url);
        Ok(Self { engine })
    }

    pub async fn project(&self, project: &str) -> Result<NodeId> {
        Ok(self
            .engine
            .locate(&[(NodeKind::Project, project)])
            .await?)
    }

    pub async fn application(&self, scope: &AppScope) -> Result<NodeId> {
        Ok(self
            .engine
            .locate(&[
                (NodeKind::Project, scope.project.as_str()),
                (NodeKind::Application, scope.app.as_str()),
            ])
            .await?)
    }

    pub async fn app_child(&self, scope: &AppScope, kind: NodeKind, name: &str) -> Result<NodeId> {
        Ok(self
            .engine
            .locate(&[
                (NodeKind::Project, scope.project.as_str()),
                (NodeKind::Application, scope.app.as_str()),
                (kind, name),
            ])
            .await?)
    }

    pub async fn component(&self, scope: &ComponentScope) -> Result<NodeId> {
        self.app_child(&scope.app, NodeKind::Component, &scope.component)
            .await
    }
}

/// Asks on stdin unless `yes` was given. Anything but `y`/`yes` declines.
pub fn confirm(prompt: &str, yes: bool) -> Result<bool> {
    if yes {
        return Ok(true);
    }
    print!("{}? [y/N] ", prompt);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

impl Context {
    /// Prints the outcome of a settled operation and drains queued notifications.
    pub fn print_settled(&self, settled: &Settled, json: bool) -> Result<()> {
        let notifications = self.engine.get_pending_notifications();
        if json {
            println!("{}", serde_json::to_string_pretty(settled)?);
            return Ok(());
        }
        for notification in &notifications {
            match notification {
                Notification::Info(message) => println!("{}", message),
                Notification::Warning(message) | Notification::Error(message) => {
                    eprintln!("{}", message)
                }
            }
        }
        Ok(())
    }
}
