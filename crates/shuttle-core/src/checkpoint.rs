//! Durable record of files already committed by a batch run.
//!
//! A checkpoint is scoped to one `(task_id, run_id)` pair, so concurrent runs
//! with different identities never see each other's progress.

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SyncError};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CheckpointKey {
    pub task_id: String,
    pub run_id: String,
}

impl CheckpointKey {
    pub fn new(task_id: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            run_id: run_id.into(),
        }
    }
}

impl std::fmt::Display for CheckpointKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.task_id, self.run_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointEntry {
    pub committed_at: DateTime<Utc>,
    pub bytes_written: u64,
}

impl CheckpointEntry {
    pub fn now(bytes_written: u64) -> Self {
        Self {
            committed_at: Utc::now(),
            bytes_written,
        }
    }
}

/// file name -> commit record
pub type CheckpointMap = BTreeMap<String, CheckpointEntry>;

pub trait CheckpointStore: Send + Sync {
    /// Stored entries for `key`, or an empty map.
    fn load(&self, key: &CheckpointKey) -> Result<CheckpointMap>;

    /// Replace the stored entries for `key` with `entries`.
    fn save(&self, key: &CheckpointKey, entries: &CheckpointMap) -> Result<()>;

    /// Drop the record for `key`; clearing a missing record is not an error.
    fn clear(&self, key: &CheckpointKey) -> Result<()>;
}

/// In-process store for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    records: Mutex<HashMap<CheckpointKey, CheckpointMap>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &CheckpointKey) -> bool {
        self.records.lock().contains_key(key)
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn load(&self, key: &CheckpointKey) -> Result<CheckpointMap> {
        Ok(self.records.lock().get(key).cloned().unwrap_or_default())
    }

    fn save(&self, key: &CheckpointKey, entries: &CheckpointMap) -> Result<()> {
        self.records.lock().insert(key.clone(), entries.clone());
        Ok(())
    }

    fn clear(&self, key: &CheckpointKey) -> Result<()> {
        self.records.lock().remove(key);
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CheckpointDocument {
    key: CheckpointKey,
    entries: CheckpointMap,
}

/// One JSON document per key under a directory.
///
/// Documents are written to a sibling temp file and renamed into place, so a
/// crash mid-save leaves the previous checkpoint intact.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    dir: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Location of the document for `key`. Ids are hashed so arbitrary run
    /// identifiers (timestamps, slashes, colons) map to safe file names.
    pub fn path_for(&self, key: &CheckpointKey) -> PathBuf {
        let digest = md5::compute(format!("{}\0{}", key.task_id, key.run_id));
        self.dir.join(format!("{digest:x}.json"))
    }

    fn store_err(&self, action: &str, path: &Path, err: impl std::fmt::Display) -> SyncError {
        SyncError::Checkpoint(format!("{action} {}: {err}", path.display()))
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn load(&self, key: &CheckpointKey) -> Result<CheckpointMap> {
        let path = self.path_for(key);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(CheckpointMap::new()),
            Err(err) => return Err(self.store_err("failed to read checkpoint", &path, err)),
        };
        let document: CheckpointDocument = serde_json::from_str(&content)
            .map_err(|err| self.store_err("failed to parse checkpoint", &path, err))?;
        if document.key != *key {
            return Err(self.store_err(
                "checkpoint key mismatch in",
                &path,
                format!("expected {key}, found {}", document.key),
            ));
        }
        Ok(document.entries)
    }

    fn save(&self, key: &CheckpointKey, entries: &CheckpointMap) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .map_err(|err| self.store_err("failed to create checkpoint directory", &self.dir, err))?;

        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        let document = CheckpointDocument {
            key: key.clone(),
            entries: entries.clone(),
        };
        let body = serde_json::to_vec_pretty(&document)
            .map_err(|err| self.store_err("failed to serialize checkpoint", &path, err))?;

        let mut file =
            File::create(&tmp).map_err(|err| self.store_err("failed to create", &tmp, err))?;
        file.write_all(&body)
            .and_then(|()| file.sync_all())
            .map_err(|err| self.store_err("failed to write", &tmp, err))?;
        drop(file);

        fs::rename(&tmp, &path).map_err(|err| self.store_err("failed to persist", &path, err))
    }

    fn clear(&self, key: &CheckpointKey) -> Result<()> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(self.store_err("failed to remove checkpoint", &path, err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> CheckpointMap {
        let mut map = CheckpointMap::new();
        map.insert("x.txt".into(), CheckpointEntry::now(42));
        map.insert("empty.txt".into(), CheckpointEntry::now(0));
        map
    }

    #[test]
    fn memory_store_round_trip_and_clear() -> Result<()> {
        let store = MemoryCheckpointStore::new();
        let key = CheckpointKey::new("sync_batch_0", "manual__2025-12-13");
        assert!(store.load(&key)?.is_empty());

        let entries = sample();
        store.save(&key, &entries)?;
        assert_eq!(store.load(&key)?, entries);

        store.clear(&key)?;
        assert!(!store.contains(&key));
        store.clear(&key)?;
        Ok(())
    }

    #[test]
    fn runs_are_isolated() -> Result<()> {
        let tmp = tempdir().unwrap();
        let store = FileCheckpointStore::new(tmp.path());
        let run_a = CheckpointKey::new("sync_batch_0", "run-a");
        let run_b = CheckpointKey::new("sync_batch_0", "run-b");

        store.save(&run_a, &sample())?;
        assert_eq!(store.load(&run_a)?.len(), 2);
        assert!(store.load(&run_b)?.is_empty());
        Ok(())
    }

    #[test]
    fn file_store_overwrites_rather_than_merges() -> Result<()> {
        let tmp = tempdir().unwrap();
        let store = FileCheckpointStore::new(tmp.path().join("nested"));
        let key = CheckpointKey::new("task", "scheduled__2025-12-13T00:00:00+00:00");

        store.save(&key, &sample())?;
        let mut smaller = CheckpointMap::new();
        smaller.insert("y.txt".into(), CheckpointEntry::now(7));
        store.save(&key, &smaller)?;

        let loaded = store.load(&key)?;
        assert_eq!(loaded.keys().collect::<Vec<_>>(), vec!["y.txt"]);
        assert_eq!(loaded["y.txt"].bytes_written, 7);
        assert!(!store.path_for(&key).with_extension("json.tmp").exists());
        Ok(())
    }

    #[test]
    fn file_store_clear_is_idempotent() -> Result<()> {
        let tmp = tempdir().unwrap();
        let store = FileCheckpointStore::new(tmp.path());
        let key = CheckpointKey::new("task", "run");
        store.clear(&key)?;
        store.save(&key, &sample())?;
        store.clear(&key)?;
        assert!(!store.path_for(&key).exists());
        assert!(store.load(&key)?.is_empty());
        Ok(())
    }

    #[test]
    fn corrupt_document_is_reported() {
        let tmp = tempdir().unwrap();
        let store = FileCheckpointStore::new(tmp.path());
        let key = CheckpointKey::new("task", "run");
        fs::write(store.path_for(&key), b"{not json").unwrap();
        assert!(matches!(store.load(&key), Err(SyncError::Checkpoint(_))));
    }
}
