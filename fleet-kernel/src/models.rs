use serde::{Deserialize, Serialize};
use time::format_description::well_known::{Iso8601, Rfc3339};
use time::{OffsetDateTime, PrimitiveDateTime};

/// Opaque device key (a MAC address on real devices).
pub type DeviceId = String;

/// One health sample pushed by a device. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub identifier: DeviceId,
    #[serde(rename = "timestamp", with = "time::serde::rfc3339")]
    pub captured_at: OffsetDateTime,
    pub cpu: CpuMetrics,
    pub memory: MemoryMetrics,
    pub disk: DiskMetrics,
    pub network: NetworkMetrics,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CpuMetrics {
    pub utilization: f64,
    pub cores: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemoryMetrics {
    pub total_gb: f64,
    pub available_gb: f64,
    pub percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiskMetrics {
    pub total_gb: f64,
    pub used_gb: f64,
    pub free_gb: f64,
    pub percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NetworkMetrics {
    pub bytes_sent: u64,
    pub bytes_recv: u64,
}

// Incoming messages. Every field is optional here so that a missing field
// becomes a validation error at the gateway instead of a decode failure.
// Aliases match the field names sent by the first generation of devices.

#[derive(Debug, Default, Deserialize)]
pub struct HeartbeatIn {
    #[serde(alias = "mac_address")]
    pub identifier: Option<String>,
    #[serde(alias = "time_stamp")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SnapshotIn {
    #[serde(alias = "mac_address")]
    pub identifier: Option<String>,
    #[serde(alias = "time_stamp")]
    pub timestamp: Option<String>,
    pub cpu: Option<CpuIn>,
    pub memory: Option<MemoryIn>,
    pub disk: Option<DiskIn>,
    pub network: Option<NetworkIn>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CpuIn {
    #[serde(alias = "cpu_utilization")]
    pub utilization: Option<f64>,
    #[serde(alias = "cpu_cores")]
    pub cores: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MemoryIn {
    #[serde(alias = "total")]
    pub total_gb: Option<f64>,
    #[serde(alias = "available")]
    pub available_gb: Option<f64>,
    pub percent: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DiskIn {
    #[serde(alias = "total")]
    pub total_gb: Option<f64>,
    #[serde(alias = "used")]
    pub used_gb: Option<f64>,
    #[serde(alias = "free")]
    pub free_gb: Option<f64>,
    pub percent: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NetworkIn {
    pub bytes_sent: Option<u64>,
    pub bytes_recv: Option<u64>,
}

/// Parses an ISO-8601 timestamp.
///
/// RFC 3339 strings keep their offset. Local date-times without an offset
/// (`2024-05-01T12:00:00.123456`, what Python's `isoformat()` emits) are
/// taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<OffsetDateTime> {
    let raw = raw.trim();
    if let Ok(ts) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(ts);
    }
    if let Ok(ts) = OffsetDateTime::parse(raw, &Iso8601::DEFAULT) {
        return Some(ts);
    }
    PrimitiveDateTime::parse(raw, &Iso8601::DEFAULT)
        .ok()
        .map(PrimitiveDateTime::assume_utc)
}
