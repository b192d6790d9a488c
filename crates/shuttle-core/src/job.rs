//! Job descriptions and the per-batch descriptors derived from them.
//!
//! A job file is the rendered form of a sync task: where to read, where to
//! write, how to batch, and optionally the precomputed batch plan. Workers
//! turn it into one [`BatchDescriptor`] each.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use eyre::{Context, Result as EyreResult};
use serde::{Deserialize, Serialize};

use crate::adapter::StorageAdapter;
use crate::errors::{Result, SyncError};
use crate::partition::{hash_batch_id, list_source, Batch, BatchPlan, SourceListing};

pub const DEFAULT_CHUNK_SIZE: usize = 10 * 1024 * 1024;

fn default_num_batches() -> usize {
    1
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

/// Which files of the source a batch run is responsible for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileSelection {
    /// File names relative to the source path, fixed at planning time.
    Explicit(Vec<String>),
    /// Re-list the source and keep the names whose digest lands on `partition_id`.
    HashPartition {
        partition_id: usize,
        num_batches: usize,
    },
}

/// Source directory plus the file names to move out of it, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFiles {
    pub source_dir: String,
    pub files: Vec<String>,
}

impl FileSelection {
    /// Turn the selection into a concrete file list against `source`.
    ///
    /// Explicit lists are taken as-is without touching the adapter. Hash
    /// partitions list `source_path`; an unreadable path resolves to nothing
    /// and a single file belongs to partition 0.
    pub fn resolve(&self, source: &dyn StorageAdapter, source_path: &str) -> Result<ResolvedFiles> {
        match self {
            Self::Explicit(files) => Ok(ResolvedFiles {
                source_dir: source_path.to_string(),
                files: files.clone(),
            }),
            Self::HashPartition {
                partition_id,
                num_batches,
            } => {
                let listing = list_source(source, source_path);
                let source_dir = listing.dir().to_string();
                let files = match listing {
                    SourceListing::Directory { files, .. } => {
                        let mut owned = Vec::new();
                        for file in files {
                            if hash_batch_id(&file, *num_batches)? == *partition_id {
                                owned.push(file);
                            }
                        }
                        owned
                    }
                    SourceListing::SingleFile { file, .. } if *partition_id == 0 => vec![file],
                    SourceListing::SingleFile { .. } | SourceListing::Unavailable { .. } => {
                        Vec::new()
                    }
                };
                log::debug!(
                    "partition {partition_id}/{num_batches} owns {} file(s) under {source_dir}",
                    files.len()
                );
                Ok(ResolvedFiles { source_dir, files })
            }
        }
    }
}

/// Everything the engine needs for one batch run. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchDescriptor {
    pub source_type: String,
    pub target_type: String,
    pub source_connection: String,
    pub target_connection: String,
    pub source_path: String,
    pub target_path: String,
    pub chunk_size_bytes: usize,
    pub files: FileSelection,
}

impl BatchDescriptor {
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("source_type", &self.source_type),
            ("target_type", &self.target_type),
            ("source_connection", &self.source_connection),
            ("target_connection", &self.target_connection),
            ("source_path", &self.source_path),
            ("target_path", &self.target_path),
        ] {
            if value.trim().is_empty() {
                return Err(SyncError::config(format!("batch descriptor is missing {field}")));
            }
        }
        if self.chunk_size_bytes == 0 {
            return Err(SyncError::config("chunk_size_bytes must be greater than zero"));
        }
        if let FileSelection::HashPartition {
            partition_id,
            num_batches,
        } = self.files
        {
            if num_batches == 0 {
                return Err(SyncError::config("num_batches must be greater than zero"));
            }
            if partition_id >= num_batches {
                return Err(SyncError::config(format!(
                    "partition {partition_id} is out of range for {num_batches} batch(es)"
                )));
            }
        }
        Ok(())
    }
}

/// On-disk job description (TOML or JSON).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobConfig {
    #[serde(default)]
    pub source_type: String,
    #[serde(default)]
    pub target_type: String,
    #[serde(default)]
    pub source_conn_id: String,
    #[serde(default)]
    pub target_conn_id: String,
    #[serde(default, alias = "path")]
    pub source_path: String,
    #[serde(default)]
    pub target_path: String,
    #[serde(default = "default_num_batches")]
    pub num_batches: usize,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub batches: Vec<Batch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modulo_id: Option<usize>,
}

impl JobConfig {
    /// Read a job file; `.json` files are parsed as JSON, anything else as TOML.
    pub fn load(path: &Path) -> EyreResult<Self> {
        let content = fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read job file: {}", path.display()))?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let job = if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_toml_str(&content)
        }
        .wrap_err_with(|| format!("failed to parse job file: {}", path.display()))?;
        job.validate()
            .wrap_err_with(|| format!("invalid job file: {}", path.display()))?;
        Ok(job)
    }

    pub fn from_toml_str(content: &str) -> EyreResult<Self> {
        toml::from_str(content).context("invalid TOML job description")
    }

    pub fn from_json_str(content: &str) -> EyreResult<Self> {
        serde_json::from_str(content).context("invalid JSON job description")
    }

    pub fn to_json_pretty(&self) -> EyreResult<String> {
        serde_json::to_string_pretty(self).context("failed to serialize job description")
    }

    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("source_type", &self.source_type),
            ("target_type", &self.target_type),
            ("source_conn_id", &self.source_conn_id),
            ("target_conn_id", &self.target_conn_id),
            ("source_path", &self.source_path),
            ("target_path", &self.target_path),
        ] {
            if value.trim().is_empty() {
                return Err(SyncError::config(format!("job is missing required field {field}")));
            }
        }
        if self.num_batches == 0 {
            return Err(SyncError::config("num_batches must be greater than zero"));
        }
        if self.chunk_size == 0 {
            return Err(SyncError::config("chunk_size must be greater than zero"));
        }
        if let Some(modulo_id) = self.modulo_id {
            if modulo_id >= self.num_batches {
                return Err(SyncError::config(format!(
                    "modulo_id {modulo_id} is out of range for {} batch(es)",
                    self.num_batches
                )));
            }
        }
        let mut seen = HashSet::new();
        for batch in &self.batches {
            if batch.batch_id >= self.num_batches {
                return Err(SyncError::config(format!(
                    "batch_id {} is out of range for {} batch(es)",
                    batch.batch_id, self.num_batches
                )));
            }
            if !seen.insert(batch.batch_id) {
                return Err(SyncError::config(format!(
                    "batch_id {} appears more than once",
                    batch.batch_id
                )));
            }
        }
        Ok(())
    }

    /// Replace the source path and batch list with a freshly computed plan.
    pub fn with_plan(mut self, plan: BatchPlan) -> Self {
        self.source_path = plan.source_dir;
        self.batches = plan.batches;
        self
    }

    pub fn batch(&self, batch_id: usize) -> Result<&Batch> {
        self.batches
            .iter()
            .find(|batch| batch.batch_id == batch_id)
            .ok_or_else(|| SyncError::config(format!("job has no batch with id {batch_id}")))
    }

    pub fn descriptor(&self, files: FileSelection) -> BatchDescriptor {
        BatchDescriptor {
            source_type: self.source_type.clone(),
            target_type: self.target_type.clone(),
            source_connection: self.source_conn_id.clone(),
            target_connection: self.target_conn_id.clone(),
            source_path: self.source_path.clone(),
            target_path: self.target_path.clone(),
            chunk_size_bytes: self.chunk_size,
            files,
        }
    }

    /// Descriptor for a precomputed batch.
    pub fn descriptor_for_batch(&self, batch_id: usize) -> Result<BatchDescriptor> {
        let batch = self.batch(batch_id)?;
        Ok(self.descriptor(FileSelection::Explicit(batch.files.clone())))
    }

    /// Descriptor for a worker that selects its own files by name digest.
    pub fn descriptor_for_modulo(&self, modulo_id: usize) -> Result<BatchDescriptor> {
        let descriptor = self.descriptor(FileSelection::HashPartition {
            partition_id: modulo_id,
            num_batches: self.num_batches,
        });
        descriptor.validate()?;
        Ok(descriptor)
    }
}
