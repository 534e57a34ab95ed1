/**
 * LIVENESS REGISTRY - "when did we last hear from this device"
 *
 * ROLE:
 * Single source of truth for device last-contact times. Fed by every
 * accepted heartbeat and snapshot, read by every status query.
 *
 * HOW IT WORKS:
 * - One mutex-guarded map device_id -> last contact; the registry itself
 *   is shared through Arc
 * - Upsert keeps the newest timestamp: late or replayed messages never
 *   move a device backwards in time
 * - Entries are never removed; a silent device simply evaluates as offline
 * - In-memory only: a kernel restart forgets every device
 *
 * Every operation is a short critical section with no I/O inside the lock.
 */

use crate::models::DeviceId;
use parking_lot::Mutex;
use std::collections::HashMap;
use time::OffsetDateTime;

/// Shared as `Arc<LivenessRegistry>`.
pub struct LivenessRegistry {
    contacts: Mutex<HashMap<DeviceId, OffsetDateTime>>,
}

impl LivenessRegistry {
    pub fn new() -> Self {
        Self {
            contacts: Mutex::new(HashMap::new()),
        }
    }

    /// Records a contact and returns the timestamp now stored for the device.
    ///
    /// The stored value is `max(previous, at)`, so the return value is older
    /// than `at` when a newer contact was already recorded.
    pub fn record_contact(&self, identifier: &str, at: OffsetDateTime) -> OffsetDateTime {
        let mut contacts = self.contacts.lock();
        match contacts.get_mut(identifier) {
            Some(last) => {
                if at > *last {
                    *last = at;
                }
                *last
            }
            None => {
                contacts.insert(identifier.to_owned(), at);
                at
            }
        }
    }

    pub fn get_last_contact(&self, identifier: &str) -> Option<OffsetDateTime> {
        self.contacts.lock().get(identifier).copied()
    }

    /// Every identifier seen so far, in no particular order.
    pub fn list_identifiers(&self) -> Vec<DeviceId> {
        self.contacts.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.contacts.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.lock().is_empty()
    }
}

impl Default for LivenessRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn at(secs: i64) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(secs).unwrap()
    }

    #[test]
    fn test_unknown_device_has_no_contact() {
        let registry = LivenessRegistry::new();
        assert_eq!(registry.get_last_contact("AA:BB:CC:DD:EE:FF"), None);
        assert!(registry.is_empty());
        assert!(registry.list_identifiers().is_empty());
    }

    #[test]
    fn test_record_contact_is_idempotent() {
        let registry = LivenessRegistry::new();
        registry.record_contact("dev-1", at(1_000));
        registry.record_contact("dev-1", at(1_000));
        assert_eq!(registry.get_last_contact("dev-1"), Some(at(1_000)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_newer_contact_replaces_older() {
        let registry = LivenessRegistry::new();
        registry.record_contact("dev-1", at(1_000));
        let stored = registry.record_contact("dev-1", at(1_050));
        assert_eq!(stored, at(1_050));
        assert_eq!(registry.get_last_contact("dev-1"), Some(at(1_050)));
    }

    #[test]
    fn test_older_contact_does_not_regress() {
        let registry = LivenessRegistry::new();
        registry.record_contact("dev-1", at(1_050));
        let stored = registry.record_contact("dev-1", at(900));
        assert_eq!(stored, at(1_050));
        assert_eq!(registry.get_last_contact("dev-1"), Some(at(1_050)));
    }

    #[test]
    fn test_one_record_per_identifier() {
        let registry = LivenessRegistry::new();
        for secs in 0..10 {
            registry.record_contact("dev-1", at(secs));
            registry.record_contact("dev-2", at(secs));
        }
        let mut ids = registry.list_identifiers();
        ids.sort();
        assert_eq!(ids, vec!["dev-1".to_string(), "dev-2".to_string()]);
    }

    #[test]
    fn test_concurrent_updates_converge_to_max() {
        const WRITERS: i64 = 8;
        const PER_WRITER: i64 = 500;

        let registry = Arc::new(LivenessRegistry::new());
        let handles: Vec<_> = (0..WRITERS)
            .map(|w| {
                let registry = registry.clone();
                thread::spawn(move || {
                    // each writer walks its own slice of the timeline backwards
                    // so the interleaving keeps offering stale values
                    for i in (0..PER_WRITER).rev() {
                        registry.record_contact("shared", at(i * WRITERS + w));
                        let seen = registry.get_last_contact("shared").unwrap();
                        assert!(seen >= at(i * WRITERS + w));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let max = at((PER_WRITER - 1) * WRITERS + (WRITERS - 1));
        assert_eq!(registry.get_last_contact("shared"), Some(max));
        assert_eq!(registry.len(), 1);
    }
}
