pub mod adapter;
pub mod checkpoint;
pub mod config;
pub mod engine;
pub mod errors;
pub mod job;
pub mod logger;
pub mod partition;
pub mod stats;
pub mod transform;

pub use adapter::{AdapterRegistry, StorageAdapter};
pub use checkpoint::{CheckpointKey, CheckpointStore, FileCheckpointStore, MemoryCheckpointStore};
pub use engine::TransferEngine;
pub use errors::{ErrorCategory, Result, SyncError};
pub use job::{BatchDescriptor, FileSelection, JobConfig};
pub use stats::TransferStats;
