//! Configuration management.
//!
//! Stores configuration in JSON format at `~/.odo-explorer/config.json`.
//! Every field has a default, so a missing or partial file is valid.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::{Error, Result};
use crate::reconcile::ReconcileSettings;

/// Configuration data stored in JSON format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Explicit odo binary; the well-known install locations are searched when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub odo_path: Option<PathBuf>,

    /// Cluster to attach on start, as reported by the login layer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_url: Option<String>,

    /// Interval between confirmation refreshes, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Deadline for a single odo invocation, in seconds.
    #[serde(default = "default_invocation_timeout_secs")]
    pub invocation_timeout_secs: u64,

    /// Deadline for a change to show up in the tree, in seconds.
    #[serde(default = "default_reconcile_timeout_secs")]
    pub reconcile_timeout_secs: u64,

    /// Allow one in-flight mutation per parent node.
    #[serde(default = "default_true")]
    pub serialize_per_parent: bool,

    /// Extra environment variables for every odo invocation.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_invocation_timeout_secs() -> u64 {
    60
}

fn default_reconcile_timeout_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            odo_path: None,
            server_url: None,
            poll_interval_ms: default_poll_interval_ms(),
            invocation_timeout_secs: default_invocation_timeout_secs(),
            reconcile_timeout_secs: default_reconcile_timeout_secs(),
            serialize_per_parent: true,
            env: BTreeMap::new(),
        }
    }
}

impl Config {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn invocation_timeout(&self) -> Duration {
        Duration::from_secs(self.invocation_timeout_secs)
    }

    pub fn reconcile_timeout(&self) -> Duration {
        Duration::from_secs(self.reconcile_timeout_secs)
    }

    pub fn reconcile_settings(&self) -> ReconcileSettings {
        ReconcileSettings {
            poll_interval: self.poll_interval(),
            timeout: self.reconcile_timeout(),
            serialize_per_parent: self.serialize_per_parent,
        }
    }

    /// Rejects values the engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(Error::Config("pollIntervalMs must be positive".to_string()));
        }
        if self.invocation_timeout_secs == 0 {
            return Err(Error::Config(
                "invocationTimeoutSecs must be positive".to_string(),
            ));
        }
        if self.reconcile_timeout_secs == 0 {
            return Err(Error::Config(
                "reconcileTimeoutSecs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration store.
///
/// Handles reading and writing configuration to `~/.odo-explorer/config.json`.
pub struct ConfigStore {
    /// Path to the configuration file.
    config_path: PathBuf,
}

impl ConfigStore {
    /// Create a new config store with the default path.
    ///
    /// Default path: `~/.odo-explorer/config.json`
    pub fn new() -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?;

        Ok(Self {
            config_path: home.join(".odo-explorer").join("config.json"),
        })
    }

    /// Create a config store with a custom path (for testing).
    pub fn with_path(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.config_path
    }

    /// Get the configuration directory path.
    pub fn config_dir(&self) -> Option<PathBuf> {
        self.config_path.parent().map(|p| p.to_path_buf())
    }

    /// Load configuration from disk.
    ///
    /// Returns default config if the file doesn't exist.
    pub async fn load(&self) -> Result<Config> {
        if !self.config_path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(&self.config_path).await?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub async fn save(&self, config: &Config) -> Result<()> {
        config.validate()?;

        if let Some(config_dir) = self.config_dir() {
            if !config_dir.exists() {
                fs::create_dir_all(&config_dir).await?;
            }
        }

        let content = serde_json::to_string_pretty(config)?;

        // Write atomically by writing to temp file then renaming
        let temp_path = self.config_path.with_extension("json.tmp");

        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(content.as_bytes()).await?;
        file.sync_all().await?;
        fs::rename(&temp_path, &self.config_path).await?;

        Ok(())
    }

    /// Set the odo binary path.
    pub async fn set_odo_path(&self, path: Option<PathBuf>) -> Result<()> {
        let mut config = self.load().await?;
        config.odo_path = path;
        self.save(&config).await
    }

    /// Remember the cluster the login layer attached.
    pub async fn set_server_url(&self, server_url: Option<String>) -> Result<()> {
        let mut config = self.load().await?;
        config.server_url = server_url;
        self.save(&config).await
    }

    /// Set the polling interval in milliseconds.
    pub async fn set_poll_interval_ms(&self, interval: u64) -> Result<()> {
        let mut config = self.load().await?;
        config.poll_interval_ms = interval;
        self.save(&config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn test_store() -> (ConfigStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        (ConfigStore::with_path(path), dir)
    }

    #[tokio::test]
    async fn test_load_nonexistent() {
        let (store, _dir) = test_store().await;
        let config = tokio_test::assert_ok!(store.load().await);
        assert_eq!(config, Config::default());
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert!(config.serialize_per_parent);
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let (store, _dir) = test_store().await;

        let mut config = Config {
            odo_path: Some(PathBuf::from("/opt/odo/bin/odo")),
            poll_interval_ms: 250,
            serialize_per_parent: false,
            ..Default::default()
        };
        config.env.insert("KUBECONFIG".to_string(), "/tmp/kubeconfig".to_string());

        store.save(&config).await.unwrap();
        assert!(!store.path().with_extension("json.tmp").exists());

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.reconcile_settings().poll_interval, Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_partial_file_uses_defaults() {
        let (store, _dir) = test_store().await;
        std::fs::create_dir_all(store.config_dir().unwrap()).unwrap();
        std::fs::write(store.path(), r#"{ "reconcileTimeoutSecs": 5 }"#).unwrap();

        let config = store.load().await.unwrap();
        assert_eq!(config.reconcile_timeout(), Duration::from_secs(5));
        assert_eq!(config.invocation_timeout_secs, 60);
        assert!(config.odo_path.is_none());
    }

    #[tokio::test]
    async fn test_invalid_config() {
        let (store, _dir) = test_store().await;
        std::fs::create_dir_all(store.config_dir().unwrap()).unwrap();

        std::fs::write(store.path(), "not json").unwrap();
        assert!(matches!(store.load().await, Err(Error::Json(_))));

        std::fs::write(store.path(), r#"{ "pollIntervalMs": 0 }"#).unwrap();
        assert!(matches!(store.load().await, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_unreadable_config() {
        let (store, _dir) = test_store().await;
        std::fs::create_dir_all(store.path()).unwrap();
        assert!(matches!(store.load().await, Err(Error::Io(_))));
    }

    #[tokio::test]
    async fn test_setters() {
        let (store, _dir) = test_store().await;

        store
            .set_server_url(Some("https://api.example.com:6443".to_string()))
            .await
            .unwrap();
        store.set_poll_interval_ms(500).await.unwrap();

        let config = store.load().await.unwrap();
        assert_eq!(
            config.server_url.as_deref(),
            Some("https://api.example.com:6443")
        );
        assert_eq!(config.poll_interval_ms, 500);
    }
}
