/**
 * REST API - HTTP surface of the kernel
 *
 * ROLE:
 * Receives device pushes and answers status queries from dashboards.
 * Paths are the ones already deployed on the edge devices.
 *
 * ROUTES:
 * - GET  /health                          liveness probe, always "ok"
 * - GET  /system/health                   kernel health (uptime, devices, store)
 * - POST /heartbeat                       device heartbeat
 * - POST /receive_data                    device health snapshot
 * - GET  /device-status?mac_address=ID    {"status": "active|offline|unknown"}
 * - GET  /active-device-status            {ID: status, ...} for every known device
 * - GET  /get_device_stats?mac_address=ID latest snapshot, 404 when none
 *
 * ERRORS:
 * FleetError -> 400 (validation), 404 (not found), 500 (storage), with a
 * {"error": "..."} body. Bodies are read raw and decoded by the gateway:
 * content-type is not checked and non-JSON payloads get the same 400.
 */

use crate::error::FleetError;
use crate::gateway::{decode, Ack};
use crate::health::{HealthTracker, KernelHealth};
use crate::models::{DeviceId, HeartbeatIn, Snapshot, SnapshotIn};
use crate::service::FleetService;
use crate::store::StoreError;
use crate::status::Status;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub fleet: Arc<FleetService>,
    pub health_tracker: HealthTracker,
}

#[derive(Debug, Deserialize)]
struct DeviceParams {
    #[serde(alias = "identifier")]
    mac_address: String,
}

#[derive(Debug, Serialize)]
struct StatusView {
    status: Status,
}

impl IntoResponse for FleetError {
    fn into_response(self) -> Response {
        let code = match &self {
            FleetError::Validation(_) => StatusCode::BAD_REQUEST,
            FleetError::NotFound(_) => StatusCode::NOT_FOUND,
            FleetError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (code, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/system/health", get(get_system_health))
        .route("/heartbeat", post(receive_heartbeat))
        .route("/receive_data", post(receive_data))
        .route("/device-status", get(get_device_status))
        .route("/active-device-status", get(get_all_device_statuses))
        .route("/get_device_stats", get(get_device_stats))
        .with_state(app_state)
}

// POST /heartbeat
async fn receive_heartbeat(State(app): State<AppState>, body: Bytes) -> Result<Json<Ack>, FleetError> {
    let msg: HeartbeatIn = decode(&body, "heartbeat")?;
    Ok(Json(app.fleet.ingest_heartbeat(msg)?))
}

// POST /receive_data
async fn receive_data(State(app): State<AppState>, body: Bytes) -> Result<Json<Ack>, FleetError> {
    let msg: SnapshotIn = decode(&body, "snapshot")?;

    // store writes are blocking file I/O
    let fleet = app.fleet.clone();
    let ack = tokio::task::spawn_blocking(move || fleet.ingest_snapshot(msg))
        .await
        .map_err(|e| FleetError::Storage(StoreError::Io(std::io::Error::other(e))))??;
    Ok(Json(ack))
}

// GET /device-status?mac_address=...
async fn get_device_status(State(app): State<AppState>, Query(params): Query<DeviceParams>) -> Json<StatusView> {
    Json(StatusView { status: app.fleet.get_status(params.mac_address.trim()) })
}

// GET /active-device-status
async fn get_all_device_statuses(State(app): State<AppState>) -> Json<BTreeMap<DeviceId, Status>> {
    Json(app.fleet.get_all_statuses())
}

// GET /get_device_stats?mac_address=...
async fn get_device_stats(
    State(app): State<AppState>,
    Query(params): Query<DeviceParams>,
) -> Result<Json<Snapshot>, FleetError> {
    Ok(Json(app.fleet.get_latest_snapshot(params.mac_address.trim())?))
}

// GET /system/health
async fn get_system_health(State(app): State<AppState>) -> Json<KernelHealth> {
    Json(app.health_tracker.get_health(&app.fleet))
}
