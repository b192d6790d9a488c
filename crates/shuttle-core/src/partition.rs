//! Deterministic splitting of a file population into disjoint batches.

use serde::{Deserialize, Serialize};

use crate::adapter::{base_name, parent_dir, StorageAdapter};
use crate::errors::{Result, SyncError};

/// How files are assigned to batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionMode {
    /// Listing index modulo batch count; depends on listing order.
    #[default]
    Positional,
    /// Digest of the file name modulo batch count; order independent.
    ContentHash,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub batch_id: usize,
    pub files: Vec<String>,
}

/// Batches plus the directory their file names are relative to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchPlan {
    pub source_dir: String,
    pub batches: Vec<Batch>,
}

fn check_batch_count(num_batches: usize) -> Result<()> {
    if num_batches == 0 {
        return Err(SyncError::config("num_batches must be greater than zero"));
    }
    Ok(())
}

fn empty_batches(num_batches: usize) -> Vec<Batch> {
    (0..num_batches)
        .map(|batch_id| Batch {
            batch_id,
            files: Vec::new(),
        })
        .collect()
}

/// Batch owning `file_name` under content-hash partitioning.
///
/// The MD5 digest of the name is read as a big-endian 128-bit integer.
pub fn hash_batch_id(file_name: &str, num_batches: usize) -> Result<usize> {
    check_batch_count(num_batches)?;
    let digest = md5::compute(file_name.as_bytes());
    let value = u128::from_be_bytes(*digest);
    Ok((value % num_batches as u128) as usize)
}

/// Split `files` so that entry `i` lands in batch `i % num_batches`.
pub fn positional_batches(files: &[String], num_batches: usize) -> Result<Vec<Batch>> {
    check_batch_count(num_batches)?;
    let mut batches = empty_batches(num_batches);
    for (idx, file) in files.iter().enumerate() {
        batches[idx % num_batches].files.push(file.clone());
    }
    Ok(batches)
}

/// Split `files` by the digest of each name.
pub fn hash_batches(files: &[String], num_batches: usize) -> Result<Vec<Batch>> {
    check_batch_count(num_batches)?;
    let mut batches = empty_batches(num_batches);
    for file in files {
        batches[hash_batch_id(file, num_batches)?].files.push(file.clone());
    }
    Ok(batches)
}

pub fn partition(files: &[String], num_batches: usize, mode: PartitionMode) -> Result<Vec<Batch>> {
    match mode {
        PartitionMode::Positional => positional_batches(files, num_batches),
        PartitionMode::ContentHash => hash_batches(files, num_batches),
    }
}

/// Files of `path` that resolve to the batch set: a directory listing, or the
/// single file `path` names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceListing {
    Directory { dir: String, files: Vec<String> },
    SingleFile { dir: String, file: String },
    /// The path could not be inspected; treated as nothing to do.
    Unavailable { dir: String },
}

impl SourceListing {
    pub fn dir(&self) -> &str {
        match self {
            Self::Directory { dir, .. } | Self::SingleFile { dir, .. } | Self::Unavailable { dir } => {
                dir
            }
        }
    }
}

/// Inspect `path` on `adapter`. Listing failures are logged and reported as
/// `Unavailable` rather than returned.
pub fn list_source(adapter: &dyn StorageAdapter, path: &str) -> SourceListing {
    let is_dir = match adapter.is_directory(path) {
        Ok(is_dir) => is_dir,
        Err(err) if err.is_not_found() => {
            log::info!("{path} does not exist, nothing to do");
            return SourceListing::Unavailable {
                dir: path.to_string(),
            };
        }
        Err(err) => {
            log::warn!("cannot inspect {path}, treating as empty: {err}");
            return SourceListing::Unavailable {
                dir: path.to_string(),
            };
        }
    };

    if !is_dir {
        log::info!("processing single file: {path}");
        return SourceListing::SingleFile {
            dir: parent_dir(path).to_string(),
            file: base_name(path).to_string(),
        };
    }

    match adapter.list_files(path) {
        Ok(mut files) => {
            files.sort();
            SourceListing::Directory {
                dir: path.to_string(),
                files,
            }
        }
        Err(err) => {
            log::warn!("cannot list {path}, treating as empty: {err}");
            SourceListing::Unavailable {
                dir: path.to_string(),
            }
        }
    }
}

/// Build the batch plan for everything under `path`.
pub fn plan_batches(
    adapter: &dyn StorageAdapter,
    path: &str,
    num_batches: usize,
    mode: PartitionMode,
) -> Result<BatchPlan> {
    check_batch_count(num_batches)?;
    let plan = match list_source(adapter, path) {
        SourceListing::SingleFile { dir, file } => BatchPlan {
            source_dir: dir,
            batches: vec![Batch {
                batch_id: 0,
                files: vec![file],
            }],
        },
        SourceListing::Directory { dir, files } => BatchPlan {
            source_dir: dir,
            batches: partition(&files, num_batches, mode)?,
        },
        SourceListing::Unavailable { dir } => BatchPlan {
            source_dir: dir,
            batches: empty_batches(num_batches),
        },
    };
    log::debug!(
        "planned {} batch(es) for {}",
        plan.batches.len(),
        plan.source_dir
    );
    Ok(plan)
}
