//! Fleet Agent - edge device reporter for the fleet kernel
//!
//! Runs on each monitored device and pushes over HTTP:
//! - A heartbeat every `heartbeat_interval_secs`
//! - A system health snapshot every `snapshot_interval_secs`
//!
//! A failed send is logged and retried on the next tick.

mod backend;
mod config;
mod discovery;
mod metrics;

use anyhow::{Context, Result};
use backend::Backend;
use chrono::Utc;
use config::AgentConfig;
use metrics::MetricsCollector;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Main agent state
struct Agent {
    config: AgentConfig,
    identifier: String,
    backend: Backend,
    collector: MetricsCollector,
}

impl Agent {
    async fn new() -> Result<Self> {
        info!("Initializing Fleet Agent v{}", env!("CARGO_PKG_VERSION"));

        let config = AgentConfig::load().await.context("Failed to load agent config")?;
        let identifier = discovery::resolve_identifier(config.identifier.as_deref())
            .context("Failed to determine device identifier")?;
        let backend = Backend::new(&config.backend_url, config.request_timeout())?;

        info!("Agent initialized - ID: {}, Kernel: {}", identifier, config.backend_url);

        Ok(Agent {
            config,
            identifier,
            backend,
            collector: MetricsCollector::new(),
        })
    }

    /// Send loop; returns on Ctrl-C.
    async fn run(&mut self) -> Result<()> {
        info!(
            "Starting agent main loop (snapshot every {:?}, heartbeat every {:?})",
            self.config.snapshot_interval(),
            self.config.heartbeat_interval()
        );

        let mut snapshot_timer = interval(self.config.snapshot_interval());
        let mut heartbeat_timer = interval(self.config.heartbeat_interval());
        snapshot_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        heartbeat_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = snapshot_timer.tick() => {
                    if let Err(e) = self.send_snapshot().await {
                        warn!("Failed to send snapshot: {:#}", e);
                    }
                }

                _ = heartbeat_timer.tick() => {
                    if let Err(e) = self.send_heartbeat().await {
                        warn!("Failed to send heartbeat: {:#}", e);
                    }
                }

                res = &mut shutdown => {
                    if let Err(e) = res {
                        error!("Failed to listen for Ctrl-C: {}", e);
                    }
                    info!("Shutdown requested, stopping agent");
                    return Ok(());
                }
            }
        }
    }

    async fn send_snapshot(&mut self) -> Result<()> {
        let metrics = self.collector.collect().await;
        self.backend.send_snapshot(&self.identifier, Utc::now(), &metrics).await?;
        info!(
            "Snapshot sent (cpu {:.1}%, mem {:.1}%, disk {:.1}%)",
            metrics.cpu.utilization, metrics.memory.percent, metrics.disk.percent
        );
        Ok(())
    }

    async fn send_heartbeat(&self) -> Result<()> {
        self.backend.send_heartbeat(&self.identifier, Utc::now()).await?;
        info!("Heartbeat sent");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("fleet_agent=info".parse()?))
        .init();

    info!("Fleet Agent starting...");

    let mut agent = Agent::new().await.context("Failed to create agent")?;

    agent.run().await.context("Agent execution failed")?;

    Ok(())
}
