use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{info, warn};

/// Kernel settings, read once at startup.
///
/// ```yaml
/// listen_addr: 0.0.0.0:4000
/// timeout_threshold: 2m
/// store:
///   kind: json_lines
///   path: ./data/snapshots.jsonl
/// ```
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct KernelConfig {
    pub listen_addr: SocketAddr,
    /// Maximum silence before a device is reported offline.
    #[serde(with = "humantime_duration")]
    pub timeout_threshold: Duration,
    pub store: StoreConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreConfig {
    Memory,
    JsonLines { path: PathBuf },
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 4000)),
            timeout_threshold: Duration::from_secs(120),
            store: StoreConfig::default(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::JsonLines {
            path: PathBuf::from("./data/snapshots.jsonl"),
        }
    }
}

pub fn parse_config(txt: &str) -> Result<KernelConfig, serde_yaml::Error> {
    if txt.trim().is_empty() {
        return Ok(KernelConfig::default());
    }
    serde_yaml::from_str(txt)
}

/// Loads the file named by `FLEET_KERNEL_CONFIG` (default `kernel.yaml`).
/// A missing file means defaults; an unreadable or invalid one is an error.
pub async fn load_config() -> anyhow::Result<KernelConfig> {
    let path = std::env::var("FLEET_KERNEL_CONFIG").unwrap_or_else(|_| "kernel.yaml".into());
    if !Path::new(&path).exists() {
        warn!(%path, "no kernel config file, using defaults");
        return Ok(KernelConfig::default());
    }

    let txt = fs::read_to_string(&path).await?;
    let cfg = parse_config(&txt).map_err(|e| anyhow::anyhow!("invalid config {path}: {e}"))?;
    info!(%path, "kernel config loaded");
    Ok(cfg)
}

/// (De)serializes a `Duration` as a humantime string ("90s", "2m").
mod humantime_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&humantime::format_duration(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(raw.trim()).map_err(serde::de::Error::custom)
    }
}
