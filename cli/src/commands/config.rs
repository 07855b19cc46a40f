//! Config command - show the effective configuration.

use anyhow::Result;
use odo_explorer_core::ConfigStore;

use super::{load_config, Overrides};

pub async fn show(overrides: &Overrides, json: bool) -> Result<()> {
    let config = load_config(overrides).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let store = ConfigStore::new()?;
    println!("Config file:          {}", store.path().display());
    println!(
        "odo binary:           {}",
        config
            .odo_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(search default locations)".to_string())
    );
    println!(
        "Server:               {}",
        config.server_url.as_deref().unwrap_or("(current context)")
    );
    println!("Poll interval:        {} ms", config.poll_interval_ms);
    println!("Invocation timeout:   {} s", config.invocation_timeout_secs);
    println!("Reconcile timeout:    {} s", config.reconcile_timeout_secs);
    println!("Serialize per parent: {}", config.serialize_per_parent);
    for (key, value) in &config.env {
        println!("Env:                  {}={}", key, value);
    }
    Ok(())
}
