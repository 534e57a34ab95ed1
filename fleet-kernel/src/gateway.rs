/**
 * INGESTION GATEWAY - entry point for everything devices push
 *
 * ROLE:
 * Turns raw heartbeat / snapshot messages into validated values, then fans
 * them out to the liveness registry and the snapshot store.
 *
 * HOW IT WORKS:
 * - Validation happens first; a rejected message touches nothing
 * - Every accepted message counts as a contact (snapshots included)
 * - Contacts are never recorded later than the server clock; the stored
 *   snapshot keeps the device timestamp as sent
 * - Liveness is recorded before the store write: a failing store still
 *   leaves the device marked as seen, and the failure goes back to the caller
 * - No retries here; devices resend on their next tick
 */

use crate::clock::Clock;
use crate::error::FleetError;
use crate::models::*;
use crate::registry::LivenessRegistry;
use crate::store::SnapshotStore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{debug, error, warn};

/// Acknowledgement returned to the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ack {
    pub message: &'static str,
}

pub const HEARTBEAT_ACK: Ack = Ack { message: "Heartbeat received successfully" };
pub const SNAPSHOT_ACK: Ack = Ack { message: "Data stored successfully" };

#[derive(Clone)]
pub struct IngestionGateway {
    registry: Arc<LivenessRegistry>,
    store: Arc<dyn SnapshotStore>,
    clock: Arc<dyn Clock>,
}

impl IngestionGateway {
    pub fn new(registry: Arc<LivenessRegistry>, store: Arc<dyn SnapshotStore>, clock: Arc<dyn Clock>) -> Self {
        Self { registry, store, clock }
    }

    pub fn ingest_heartbeat(&self, msg: HeartbeatIn) -> Result<Ack, FleetError> {
        let identifier = validate_identifier(msg.identifier).inspect_err(reject("heartbeat"))?;
        let at = match msg.timestamp {
            Some(raw) => validate_timestamp(&raw).inspect_err(reject("heartbeat"))?,
            None => self.clock.now(),
        };

        self.touch(&identifier, at);
        Ok(HEARTBEAT_ACK)
    }

    pub fn ingest_snapshot(&self, msg: SnapshotIn) -> Result<Ack, FleetError> {
        let snapshot = validate_snapshot(msg).inspect_err(reject("snapshot"))?;

        self.touch(&snapshot.identifier, snapshot.captured_at);

        if let Err(e) = self.store.insert(&snapshot) {
            error!(device = %snapshot.identifier, error = %e, "failed to store snapshot");
            return Err(e.into());
        }
        debug!(device = %snapshot.identifier, captured_at = %snapshot.captured_at, "snapshot stored");
        Ok(SNAPSHOT_ACK)
    }

    /// Contacts are capped at the server clock; a device clock running ahead
    /// would otherwise hold the registry max in the future.
    fn touch(&self, identifier: &str, at: OffsetDateTime) {
        let now = self.clock.now();
        let at = if at > now {
            debug!(device = %identifier, %at, %now, "contact from the future clamped to now");
            now
        } else {
            at
        };

        let stored = self.registry.record_contact(identifier, at);
        if stored > at {
            debug!(device = %identifier, %at, last_contact = %stored, "out-of-order contact ignored");
        } else {
            debug!(device = %identifier, %at, "contact recorded");
        }
    }
}

/// Decodes a raw request body into an incoming message. Bodies that are
/// not JSON, type mismatches and non-object bodies are validation errors
/// like any missing field.
pub fn decode<T: DeserializeOwned>(body: &[u8], kind: &str) -> Result<T, FleetError> {
    serde_json::from_slice(body).map_err(|e| {
        warn!(kind, error = %e, "rejected malformed message");
        FleetError::Validation(format!("malformed {kind}: {e}"))
    })
}

fn reject(kind: &'static str) -> impl Fn(&FleetError) {
    move |e| warn!(kind, error = %e, "rejected message")
}

fn validate_identifier(raw: Option<String>) -> Result<DeviceId, FleetError> {
    let identifier = raw.as_deref().map(str::trim).unwrap_or_default();
    if identifier.is_empty() {
        return Err(FleetError::validation("missing 'identifier'"));
    }
    Ok(identifier.to_string())
}

fn validate_timestamp(raw: &str) -> Result<OffsetDateTime, FleetError> {
    parse_timestamp(raw).ok_or_else(|| FleetError::Validation(format!("invalid timestamp '{raw}'")))
}

fn validate_snapshot(msg: SnapshotIn) -> Result<Snapshot, FleetError> {
    let identifier = validate_identifier(msg.identifier)?;
    let raw_ts = msg.timestamp.ok_or_else(|| FleetError::validation("missing 'timestamp'"))?;
    let captured_at = validate_timestamp(&raw_ts)?;

    let cpu = msg.cpu.ok_or_else(|| FleetError::validation("missing 'cpu'"))?;
    let memory = msg.memory.ok_or_else(|| FleetError::validation("missing 'memory'"))?;
    let disk = msg.disk.ok_or_else(|| FleetError::validation("missing 'disk'"))?;
    let network = msg.network.ok_or_else(|| FleetError::validation("missing 'network'"))?;

    Ok(Snapshot {
        identifier,
        captured_at,
        cpu: CpuMetrics {
            utilization: percent("cpu.utilization", cpu.utilization)?,
            cores: required("cpu.cores", cpu.cores)?,
        },
        memory: MemoryMetrics {
            total_gb: amount("memory.total_gb", memory.total_gb)?,
            available_gb: amount("memory.available_gb", memory.available_gb)?,
            percent: percent("memory.percent", memory.percent)?,
        },
        disk: DiskMetrics {
            total_gb: amount("disk.total_gb", disk.total_gb)?,
            used_gb: amount("disk.used_gb", disk.used_gb)?,
            free_gb: amount("disk.free_gb", disk.free_gb)?,
            percent: percent("disk.percent", disk.percent)?,
        },
        network: NetworkMetrics {
            bytes_sent: required("network.bytes_sent", network.bytes_sent)?,
            bytes_recv: required("network.bytes_recv", network.bytes_recv)?,
        },
    })
}

fn required<T>(field: &str, value: Option<T>) -> Result<T, FleetError> {
    value.ok_or_else(|| FleetError::Validation(format!("missing '{field}'")))
}

/// Finite and non-negative.
fn amount(field: &str, value: Option<f64>) -> Result<f64, FleetError> {
    let value = required(field, value)?;
    if !value.is_finite() || value < 0.0 {
        return Err(FleetError::Validation(format!("'{field}' must be a non-negative number, got {value}")));
    }
    Ok(value)
}

fn percent(field: &str, value: Option<f64>) -> Result<f64, FleetError> {
    let value = amount(field, value)?;
    if value > 100.0 {
        return Err(FleetError::Validation(format!("'{field}' must be within 0..=100, got {value}")));
    }
    Ok(value)
}
