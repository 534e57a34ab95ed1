/**
 * FLEET KERNEL - server entry point
 *
 * ROLE: wires config, liveness registry, snapshot store and the REST API,
 * then serves until Ctrl-C / SIGTERM.
 */

use anyhow::Context;
use fleet_kernel::clock::SystemClock;
use fleet_kernel::config::load_config;
use fleet_kernel::health::HealthTracker;
use fleet_kernel::http::{build_router, AppState};
use fleet_kernel::store::open_store;
use fleet_kernel::{FleetService, LivenessRegistry};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("fleet_kernel=info".parse()?),
        )
        .init();

    let cfg = load_config().await.context("failed to load kernel config")?;
    info!(threshold = %humantime::format_duration(cfg.timeout_threshold), "starting fleet kernel");

    let store = open_store(&cfg.store).context("failed to open snapshot store")?;
    info!(kind = store.kind(), "snapshot store ready");

    let fleet = FleetService::new(
        Arc::new(LivenessRegistry::new()),
        store,
        Arc::new(SystemClock),
        cfg.timeout_threshold,
    );

    let app = build_router(AppState {
        fleet: Arc::new(fleet),
        health_tracker: HealthTracker::new(),
    });

    let listener = TcpListener::bind(cfg.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", cfg.listen_addr))?;
    info!("listening on http://{}", cfg.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("kernel stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
