use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::ConnectionTable;
use crate::errors::{Result, SyncError};

use super::{LocalAdapter, SftpAdapter, StorageAdapter};

/// Builds an adapter bound to a connection id.
pub type AdapterConstructor = Arc<dyn Fn(&str) -> Result<Box<dyn StorageAdapter>> + Send + Sync>;

/// Backend type name -> adapter constructor.
///
/// One registry is shared by every engine in the process; registration is a
/// setup-time operation and lookups only take a read lock.
#[derive(Default)]
pub struct AdapterRegistry {
    constructors: RwLock<HashMap<String, AdapterConstructor>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the `local` and `sftp` backends resolving connection ids
    /// against `connections`.
    pub fn with_builtin(connections: ConnectionTable) -> Self {
        let connections = Arc::new(connections);
        let registry = Self::new();

        let local_connections = Arc::clone(&connections);
        registry.register("local", move |connection_id: &str| {
            let root = local_connections
                .get(connection_id)
                .and_then(|conn| conn.root.clone());
            Ok(Box::new(LocalAdapter::new(root)) as Box<dyn StorageAdapter>)
        });

        registry.register("sftp", move |connection_id: &str| {
            let config = connections.get(connection_id).ok_or_else(|| {
                SyncError::config(format!("unknown connection id: {connection_id}"))
            })?;
            Ok(Box::new(SftpAdapter::connect(connection_id, config)?) as Box<dyn StorageAdapter>)
        });

        registry
    }

    /// Install or replace the constructor for `adapter_type` (case-insensitive).
    pub fn register<F>(&self, adapter_type: &str, constructor: F)
    where
        F: Fn(&str) -> Result<Box<dyn StorageAdapter>> + Send + Sync + 'static,
    {
        self.constructors
            .write()
            .insert(adapter_type.to_ascii_lowercase(), Arc::new(constructor));
    }

    pub fn create(&self, adapter_type: &str, connection_id: &str) -> Result<Box<dyn StorageAdapter>> {
        // Clone the constructor out so a slow connect does not hold the lock.
        let constructor = self
            .constructors
            .read()
            .get(&adapter_type.to_ascii_lowercase())
            .cloned();
        match constructor {
            Some(constructor) => constructor(connection_id),
            None => {
                log::error!(
                    "no adapter registered for '{adapter_type}' (known: {})",
                    self.supported_types().join(", ")
                );
                Err(SyncError::UnsupportedAdapter(adapter_type.to_string()))
            }
        }
    }

    pub fn supported_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.constructors.read().keys().cloned().collect();
        types.sort();
        types
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectionConfig;

    #[test]
    fn unknown_type_is_unsupported() {
        let registry = AdapterRegistry::new();
        let err = registry.create("s3", "conn").err().expect("no s3 adapter");
        assert!(matches!(err, SyncError::UnsupportedAdapter(ref t) if t == "s3"));
    }

    #[test]
    fn builtin_types_are_case_insensitive() {
        let registry = AdapterRegistry::with_builtin(ConnectionTable::default());
        assert_eq!(registry.supported_types(), vec!["local", "sftp"]);
        let adapter = registry.create("LOCAL", "anything").expect("local adapter");
        assert_eq!(adapter.kind(), "local");
    }

    #[test]
    fn sftp_requires_known_connection() {
        let registry = AdapterRegistry::with_builtin(ConnectionTable::default());
        let err = registry.create("sftp", "missing").err().expect("unknown connection");
        assert!(matches!(err, SyncError::Config(_)));
    }

    #[test]
    fn local_connection_root_is_applied() {
        let mut table = ConnectionTable::default();
        table.insert(
            "staging",
            ConnectionConfig {
                root: Some("/srv/staging".into()),
                ..ConnectionConfig::default()
            },
        );
        let registry = AdapterRegistry::with_builtin(table);
        // A rooted local adapter cannot see /definitely-not-here under its root.
        let adapter = registry.create("local", "staging").expect("local adapter");
        assert!(adapter.is_directory("/definitely-not-here").is_err());
    }

    #[test]
    fn register_overrides_existing_entry() {
        let registry = AdapterRegistry::with_builtin(ConnectionTable::default());
        registry.register("sftp", |_conn: &str| {
            Ok(Box::new(LocalAdapter::default()) as Box<dyn StorageAdapter>)
        });
        let adapter = registry.create("sftp", "whatever").expect("overridden sftp");
        assert_eq!(adapter.kind(), "local");
    }
}
