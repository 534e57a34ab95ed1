/**
 * SNAPSHOT STORE - persistence of device health snapshots
 *
 * ROLE:
 * Keeps every accepted snapshot and answers "what is the most recent
 * snapshot of device X". Nothing else in the kernel reads history.
 *
 * HOW IT WORKS:
 * - SnapshotStore trait = the two operations the gateway and the queries need
 * - MemorySnapshotStore = process-local, for tests and throwaway runs
 * - JsonLinesSnapshotStore = append-only file, one JSON snapshot per line,
 *   replayed into a latest-per-device index at startup
 *
 * Stores are fallible and slow compared to the liveness registry; callers
 * never hold the registry lock while talking to a store.
 */

mod jsonl;
mod memory;

pub use jsonl::JsonLinesSnapshotStore;
pub use memory::MemorySnapshotStore;

use crate::config::StoreConfig;
use crate::models::Snapshot;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub trait SnapshotStore: Send + Sync {
    fn insert(&self, snapshot: &Snapshot) -> Result<(), StoreError>;

    /// Most recent snapshot for `identifier` by capture time, if any.
    fn latest(&self, identifier: &str) -> Result<Option<Snapshot>, StoreError>;

    /// Short name reported by the health endpoint ("memory", "json_lines").
    fn kind(&self) -> &'static str;
}

/// Builds the store selected in the kernel config.
pub fn open_store(cfg: &StoreConfig) -> Result<Arc<dyn SnapshotStore>, StoreError> {
    match cfg {
        StoreConfig::Memory => Ok(Arc::new(MemorySnapshotStore::new())),
        StoreConfig::JsonLines { path } => Ok(Arc::new(JsonLinesSnapshotStore::open(path)?)),
    }
}

/// True when `candidate` should replace `current` as the latest snapshot.
/// Ties go to the newcomer, so a re-sent snapshot wins over the stored copy.
fn is_newer(candidate: &Snapshot, current: Option<&Snapshot>) -> bool {
    current.map_or(true, |cur| candidate.captured_at >= cur.captured_at)
}
