//! Agent configuration
//!
//! Read from `FLEET_AGENT_CONFIG` when set, otherwise from the OS config
//! directory (`~/.config/fleet-agent/config.toml` on Linux). A missing file
//! means defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Base URL of the fleet kernel, e.g. `http://192.168.1.39:4000`.
    pub backend_url: String,
    /// Overrides the MAC-derived device identifier.
    pub identifier: Option<String>,
    pub snapshot_interval_secs: u64,
    pub heartbeat_interval_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:4000".to_string(),
            identifier: None,
            snapshot_interval_secs: 50,
            heartbeat_interval_secs: 60,
            request_timeout_secs: 10,
        }
    }
}

impl AgentConfig {
    pub async fn load() -> Result<Self> {
        let path = match std::env::var_os("FLEET_AGENT_CONFIG") {
            Some(p) => PathBuf::from(p),
            None => Self::config_file_path()?,
        };
        Self::load_from(&path).await
    }

    pub async fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: AgentConfig =
            toml::from_str(&content).with_context(|| format!("Invalid config {}", path.display()))?;
        config.validate()?;

        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn config_file_path() -> Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;

        path.push("fleet-agent");
        path.push("config.toml");
        Ok(path)
    }

    /// Zero intervals would make the send loop spin.
    pub fn validate(&self) -> Result<()> {
        if self.backend_url.trim().is_empty() {
            anyhow::bail!("backend_url must not be empty");
        }
        if self.snapshot_interval_secs == 0 || self.heartbeat_interval_secs == 0 {
            anyhow::bail!("snapshot and heartbeat intervals must be at least 1 second");
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be at least 1 second");
        }
        Ok(())
    }

    pub fn snapshot_interval(&self) -> Duration {
        Duration::from_secs(self.snapshot_interval_secs)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
