use super::{is_newer, SnapshotStore, StoreError};
use crate::models::{DeviceId, Snapshot};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Append-only snapshot log, one JSON document per line.
///
/// Only the latest snapshot of each device is kept in memory; the file is
/// the full history and is replayed on open to rebuild that index.
pub struct JsonLinesSnapshotStore {
    inner: Mutex<Inner>,
}

struct Inner {
    file: File,
    latest: HashMap<DeviceId, Snapshot>,
}

impl JsonLinesSnapshotStore {
    pub fn open<P: Into<PathBuf>>(path: P) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let latest = Self::replay(&path)?;
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;

        // a torn last line must not swallow the next append
        if !ends_with_newline(&path)? {
            warn!(path = %path.display(), "snapshot log ends mid-line, terminating it");
            file.write_all(b"\n")?;
            file.flush()?;
        }

        info!(path = %path.display(), devices = latest.len(), "snapshot log opened");
        Ok(Self {
            inner: Mutex::new(Inner { file, latest }),
        })
    }

    /// Rebuilds the latest-per-device index from the log. Unreadable lines
    /// (a torn write at the tail, manual edits) are skipped.
    fn replay(path: &Path) -> Result<HashMap<DeviceId, Snapshot>, StoreError> {
        let mut latest: HashMap<DeviceId, Snapshot> = HashMap::new();
        if !path.exists() {
            return Ok(latest);
        }

        let reader = BufReader::new(File::open(path)?);
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Snapshot>(&line) {
                Ok(snapshot) => {
                    if is_newer(&snapshot, latest.get(&snapshot.identifier)) {
                        latest.insert(snapshot.identifier.clone(), snapshot);
                    }
                }
                Err(e) => warn!(path = %path.display(), line = idx + 1, error = %e, "skipping unreadable snapshot"),
            }
        }
        Ok(latest)
    }
}

fn append(file: &mut File, line: &[u8]) -> io::Result<()> {
    file.write_all(line)?;
    file.flush()
}

/// True for an empty file or one whose last byte is `\n`.
fn ends_with_newline(path: &Path) -> io::Result<bool> {
    let mut file = File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Ok(true);
    }
    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

impl SnapshotStore for JsonLinesSnapshotStore {
    fn insert(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let mut line = serde_json::to_string(snapshot)?;
        line.push('\n');

        let mut inner = self.inner.lock();
        let len = inner.file.metadata()?.len();
        if let Err(e) = append(&mut inner.file, line.as_bytes()) {
            // drop the partial line so the log stays one snapshot per line
            if let Err(rollback) = inner.file.set_len(len) {
                warn!(error = %rollback, "failed to truncate partial snapshot write");
            }
            return Err(e.into());
        }

        // index only what made it to disk
        if is_newer(snapshot, inner.latest.get(&snapshot.identifier)) {
            inner.latest.insert(snapshot.identifier.clone(), snapshot.clone());
        }
        Ok(())
    }

    fn latest(&self, identifier: &str) -> Result<Option<Snapshot>, StoreError> {
        Ok(self.inner.lock().latest.get(identifier).cloned())
    }

    fn kind(&self) -> &'static str {
        "json_lines"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::snapshot;

    #[test]
    fn test_insert_and_latest() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonLinesSnapshotStore::open(dir.path().join("snapshots.jsonl")).unwrap();

        store.insert(&snapshot("dev-1", 100)).unwrap();
        store.insert(&snapshot("dev-1", 50)).unwrap();

        let latest = store.latest("dev-1").unwrap().unwrap();
        assert_eq!(latest.captured_at.unix_timestamp(), 100);
        assert!(store.latest("dev-2").unwrap().is_none());
    }

    #[test]
    fn test_history_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshots.jsonl");
        {
            let store = JsonLinesSnapshotStore::open(&path).unwrap();
            store.insert(&snapshot("dev-1", 100)).unwrap();
            store.insert(&snapshot("dev-1", 200)).unwrap();
            store.insert(&snapshot("dev-2", 150)).unwrap();
        }

        let reopened = JsonLinesSnapshotStore::open(&path).unwrap();
        assert_eq!(reopened.latest("dev-1").unwrap().unwrap().captured_at.unix_timestamp(), 200);
        let dev2 = reopened.latest("dev-2").unwrap().unwrap();
        assert_eq!(dev2.captured_at.unix_timestamp(), 150);
        assert_eq!(dev2.cpu.cores, 8);
        assert_eq!(dev2.network.bytes_recv, 55_000);

        // appends after reopen land after the replayed history
        reopened.insert(&snapshot("dev-2", 160)).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 4);
    }

    #[test]
    fn test_replay_skips_corrupt_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshots.jsonl");
        let good = serde_json::to_string(&snapshot("dev-1", 100)).unwrap();
        fs::write(&path, format!("{good}\n{{\"identifier\": \"dev-1\", \"times\n\n")).unwrap();

        let store = JsonLinesSnapshotStore::open(&path).unwrap();
        assert_eq!(store.latest("dev-1").unwrap().unwrap().captured_at.unix_timestamp(), 100);
    }

    #[test]
    fn test_append_after_torn_tail_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshots.jsonl");
        let good = serde_json::to_string(&snapshot("dev-1", 100)).unwrap();
        fs::write(&path, format!("{good}\n{{\"identifier\": \"dev-1\", \"tim")).unwrap();

        {
            let store = JsonLinesSnapshotStore::open(&path).unwrap();
            assert_eq!(store.latest("dev-1").unwrap().unwrap().captured_at.unix_timestamp(), 100);
            store.insert(&snapshot("dev-1", 200)).unwrap();
        }

        let reopened = JsonLinesSnapshotStore::open(&path).unwrap();
        assert_eq!(reopened.latest("dev-1").unwrap().unwrap().captured_at.unix_timestamp(), 200);
        assert!(fs::read_to_string(&path).unwrap().ends_with('\n'));
    }

    #[test]
    fn test_ends_with_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log");
        fs::write(&path, "").unwrap();
        assert!(ends_with_newline(&path).unwrap());
        fs::write(&path, "{}\n").unwrap();
        assert!(ends_with_newline(&path).unwrap());
        fs::write(&path, "{}\n{").unwrap();
        assert!(!ends_with_newline(&path).unwrap());
    }
}
