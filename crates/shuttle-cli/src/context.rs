use eyre::Result;
use shuttle_core::config::{self, ConnectionTable};
use shuttle_core::{AdapterRegistry, CheckpointKey, FileCheckpointStore};
use std::path::Path;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppContext {
    pub registry: Arc<AdapterRegistry>,
}

impl AppContext {
    /// Load the connection table and build the adapter registry from it.
    pub fn load(connections: Option<&Path>) -> Result<Self> {
        let connections_path = match connections {
            Some(path) => path.to_path_buf(),
            None => config::connections_path()?,
        };
        let table = if connections.is_some() {
            ConnectionTable::load(&connections_path)?
        } else {
            ConnectionTable::load_or_default(&connections_path)?
        };
        log::debug!(
            "loaded {} connection(s) from {}",
            table.connections.len(),
            connections_path.display()
        );
        Ok(Self {
            registry: Arc::new(AdapterRegistry::with_builtin(table)),
        })
    }

    pub fn checkpoint_store(&self, dir: Option<&Path>) -> Result<FileCheckpointStore> {
        let dir = match dir {
            Some(dir) => dir.to_path_buf(),
            None => config::checkpoint_dir()?,
        };
        Ok(FileCheckpointStore::new(dir))
    }
}

/// Checkpoint identity for one batch of a task.
pub fn batch_key(task_id: &str, batch_id: usize, run_id: &str) -> CheckpointKey {
    CheckpointKey::new(format!("{task_id}-batch-{batch_id}"), run_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_keys_are_distinct_per_batch() {
        let a = batch_key("sync", 0, "manual__2025-12-13");
        let b = batch_key("sync", 1, "manual__2025-12-13");
        assert_eq!(a.task_id, "sync-batch-0");
        assert_ne!(a, b);
    }

    #[test]
    fn explicit_connections_file_must_exist() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("connections.toml");
        assert!(AppContext::load(Some(&missing)).is_err());
    }
}
