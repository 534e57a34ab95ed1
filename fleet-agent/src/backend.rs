//! HTTP client for the fleet kernel
//!
//! Posts heartbeats to `/heartbeat` and health snapshots to `/receive_data`.
//! Non-2xx responses are errors; the caller decides whether to retry.

use crate::metrics::SystemMetrics;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::{Client, Url};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Serialize)]
pub struct HeartbeatMessage<'a> {
    pub identifier: &'a str,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct SnapshotMessage<'a> {
    pub identifier: &'a str,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub metrics: &'a SystemMetrics,
}

pub struct Backend {
    client: Client,
    heartbeat_url: Url,
    snapshot_url: Url,
}

impl Backend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            heartbeat_url: endpoint(base_url, "heartbeat")?,
            snapshot_url: endpoint(base_url, "receive_data")?,
        })
    }

    pub async fn send_heartbeat(&self, identifier: &str, at: DateTime<Utc>) -> Result<()> {
        let msg = HeartbeatMessage { identifier, timestamp: at };
        self.post(&self.heartbeat_url, &msg).await
    }

    pub async fn send_snapshot(&self, identifier: &str, at: DateTime<Utc>, metrics: &SystemMetrics) -> Result<()> {
        let msg = SnapshotMessage { identifier, timestamp: at, metrics };
        self.post(&self.snapshot_url, &msg).await
    }

    async fn post<T: Serialize>(&self, url: &Url, body: &T) -> Result<()> {
        let response = self
            .client
            .post(url.clone())
            .json(body)
            .send()
            .await
            .with_context(|| format!("POST {} failed", url))?;

        let status = response.status();
        response
            .error_for_status()
            .with_context(|| format!("POST {} rejected", url))?;

        debug!("POST {} -> {}", url, status);
        Ok(())
    }
}

/// Joins a route onto the kernel base URL, keeping any path prefix
/// (`http://host/fleet` + `heartbeat` -> `http://host/fleet/heartbeat`).
fn endpoint(base_url: &str, route: &str) -> Result<Url> {
    let mut base = base_url.trim().to_string();
    if !base.ends_with('/') {
        base.push('/');
    }
    let base = Url::parse(&base).with_context(|| format!("Invalid backend_url: {}", base_url))?;
    base.join(route)
        .with_context(|| format!("Invalid endpoint {} for {}", route, base_url))
}
