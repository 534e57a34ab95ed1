use super::{is_newer, SnapshotStore, StoreError};
use crate::models::{DeviceId, Snapshot};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Snapshots kept in process memory, grouped per device.
#[derive(Default)]
pub struct MemorySnapshotStore {
    snapshots: Mutex<HashMap<DeviceId, Vec<Snapshot>>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored snapshots across all devices.
    pub fn len(&self) -> usize {
        self.snapshots.lock().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn insert(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        self.snapshots
            .lock()
            .entry(snapshot.identifier.clone())
            .or_default()
            .push(snapshot.clone());
        Ok(())
    }

    fn latest(&self, identifier: &str) -> Result<Option<Snapshot>, StoreError> {
        let snapshots = self.snapshots.lock();
        let latest = snapshots.get(identifier).and_then(|history| {
            history
                .iter()
                .fold(None, |best: Option<&Snapshot>, s| if is_newer(s, best) { Some(s) } else { best })
                .cloned()
        });
        Ok(latest)
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::snapshot;

    #[test]
    fn test_latest_orders_by_capture_time_not_insertion() {
        let store = MemorySnapshotStore::new();
        store.insert(&snapshot("dev-1", 300)).unwrap();
        store.insert(&snapshot("dev-1", 100)).unwrap();
        store.insert(&snapshot("dev-1", 200)).unwrap();

        let latest = store.latest("dev-1").unwrap().unwrap();
        assert_eq!(latest.captured_at.unix_timestamp(), 300);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_devices_are_isolated() {
        let store = MemorySnapshotStore::new();
        store.insert(&snapshot("dev-1", 100)).unwrap();
        store.insert(&snapshot("dev-2", 900)).unwrap();

        assert_eq!(store.latest("dev-1").unwrap().unwrap().captured_at.unix_timestamp(), 100);
        assert_eq!(store.latest("dev-2").unwrap().unwrap().captured_at.unix_timestamp(), 900);
        assert!(store.latest("dev-3").unwrap().is_none());
    }
}
