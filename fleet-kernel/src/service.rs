use crate::clock::Clock;
use crate::error::FleetError;
use crate::gateway::{Ack, IngestionGateway};
use crate::models::{DeviceId, HeartbeatIn, Snapshot, SnapshotIn};
use crate::registry::LivenessRegistry;
use crate::status::{evaluate, Status};
use crate::store::SnapshotStore;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Everything the HTTP layer needs: ingestion plus the three queries.
pub struct FleetService {
    gateway: IngestionGateway,
    registry: Arc<LivenessRegistry>,
    store: Arc<dyn SnapshotStore>,
    clock: Arc<dyn Clock>,
    timeout_threshold: Duration,
}

impl FleetService {
    pub fn new(
        registry: Arc<LivenessRegistry>,
        store: Arc<dyn SnapshotStore>,
        clock: Arc<dyn Clock>,
        timeout_threshold: Duration,
    ) -> Self {
        let gateway = IngestionGateway::new(registry.clone(), store.clone(), clock.clone());
        Self { gateway, registry, store, clock, timeout_threshold }
    }

    pub fn ingest_heartbeat(&self, msg: HeartbeatIn) -> Result<Ack, FleetError> {
        self.gateway.ingest_heartbeat(msg)
    }

    pub fn ingest_snapshot(&self, msg: SnapshotIn) -> Result<Ack, FleetError> {
        self.gateway.ingest_snapshot(msg)
    }

    /// Devices never heard from are `Unknown`, not an error.
    pub fn get_status(&self, identifier: &str) -> Status {
        let last = self.registry.get_last_contact(identifier);
        evaluate(last, self.clock.now(), self.timeout_threshold)
    }

    pub fn get_all_statuses(&self) -> BTreeMap<DeviceId, Status> {
        let now = self.clock.now();
        self.registry
            .list_identifiers()
            .into_iter()
            .map(|id| {
                let status = evaluate(self.registry.get_last_contact(&id), now, self.timeout_threshold);
                (id, status)
            })
            .collect()
    }

    pub fn get_latest_snapshot(&self, identifier: &str) -> Result<Snapshot, FleetError> {
        self.store
            .latest(identifier)?
            .ok_or_else(|| FleetError::NotFound(format!("no snapshot for device '{identifier}'")))
    }

    pub fn device_count(&self) -> usize {
        self.registry.len()
    }

    pub fn timeout_threshold(&self) -> Duration {
        self.timeout_threshold
    }

    pub fn store_kind(&self) -> &'static str {
        self.store.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::gateway::decode;
    use crate::store::MemorySnapshotStore;
    use serde_json::json;

    const MAC: &str = "AA:BB:CC:DD:EE:FF";

    fn service(clock: &ManualClock) -> (FleetService, Arc<MemorySnapshotStore>) {
        let store = Arc::new(MemorySnapshotStore::new());
        let svc = FleetService::new(
            Arc::new(LivenessRegistry::new()),
            store.clone(),
            Arc::new(clock.clone()),
            Duration::from_secs(60),
        );
        (svc, store)
    }

    fn snapshot_at(identifier: Option<&str>, timestamp: &str) -> SnapshotIn {
        let mut body = json!({
            "timestamp": timestamp,
            "cpu": {"utilization": 5.0, "cores": 2},
            "memory": {"total_gb": 2.0, "available_gb": 1.0, "percent": 50.0},
            "disk": {"total_gb": 32.0, "used_gb": 8.0, "free_gb": 24.0, "percent": 25.0},
            "network": {"bytes_sent": 1, "bytes_recv": 2}
        });
        if let Some(id) = identifier {
            body["identifier"] = json!(id);
        }
        decode(body.to_string().as_bytes(), "snapshot").unwrap()
    }

    #[test]
    fn test_never_contacted_device_is_unknown() {
        let clock = ManualClock::at_unix(1_000);
        let (svc, _) = service(&clock);
        assert_eq!(svc.get_status(MAC), Status::Unknown);
        assert!(svc.get_all_statuses().is_empty());
        assert!(matches!(svc.get_latest_snapshot(MAC), Err(FleetError::NotFound(_))));
    }

    #[test]
    fn test_snapshot_then_status_goes_active_then_offline() {
        let clock = ManualClock::at_unix(1_000);
        let (svc, _) = service(&clock);

        // t=1000
        svc.ingest_snapshot(snapshot_at(Some(MAC), "1970-01-01T00:16:40Z")).unwrap();

        clock.advance(time::Duration::seconds(10));
        assert_eq!(svc.get_status(MAC), Status::Active);

        clock.advance(time::Duration::seconds(60));
        assert_eq!(svc.get_status(MAC), Status::Offline);

        // a fresh heartbeat brings it back
        svc.ingest_heartbeat(HeartbeatIn { identifier: Some(MAC.into()), timestamp: None }).unwrap();
        assert_eq!(svc.get_status(MAC), Status::Active);
    }

    #[test]
    fn test_rejected_snapshot_leaves_everything_untouched() {
        let clock = ManualClock::at_unix(1_010);
        let (svc, store) = service(&clock);

        let result = svc.ingest_snapshot(snapshot_at(None, "1970-01-01T00:16:40Z"));
        assert!(matches!(result, Err(FleetError::Validation(_))));
        assert_eq!(svc.device_count(), 0);
        assert!(store.is_empty());
        assert_eq!(svc.get_status(MAC), Status::Unknown);
    }

    #[test]
    fn test_all_statuses_covers_every_known_device() {
        let clock = ManualClock::at_unix(1_000);
        let (svc, _) = service(&clock);

        svc.ingest_heartbeat(HeartbeatIn { identifier: Some("old".into()), timestamp: Some("1970-01-01T00:00:00Z".into()) })
            .unwrap();
        svc.ingest_heartbeat(HeartbeatIn { identifier: Some("fresh".into()), timestamp: None }).unwrap();

        let all = svc.get_all_statuses();
        assert_eq!(all.len(), 2);
        assert_eq!(all["old"], Status::Offline);
        assert_eq!(all["fresh"], Status::Active);
        assert_eq!(svc.device_count(), 2);
    }

    #[test]
    fn test_latest_snapshot_is_most_recent_capture() {
        let clock = ManualClock::at_unix(5_000);
        let (svc, _) = service(&clock);

        svc.ingest_snapshot(snapshot_at(Some(MAC), "1970-01-01T00:16:40Z")).unwrap();
        svc.ingest_snapshot(snapshot_at(Some(MAC), "1970-01-01T00:33:20Z")).unwrap();
        svc.ingest_snapshot(snapshot_at(Some(MAC), "1970-01-01T00:25:00Z")).unwrap();

        let latest = svc.get_latest_snapshot(MAC).unwrap();
        assert_eq!(latest.captured_at.unix_timestamp(), 2_000);
    }
}
