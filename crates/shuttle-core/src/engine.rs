//! Batch transfer orchestration.
//!
//! A run moves each file of one batch from the source adapter to the target
//! adapter in order. Every file is written under a temporary name and renamed
//! into place, then recorded in the checkpoint before the next file starts.
//! The first failing file rolls back its own artifacts, persists the progress
//! made so far and aborts the batch; re-running with the same checkpoint key
//! skips everything already committed.

use std::sync::Arc;

use crate::adapter::{join_path, AdapterRegistry, ChunkStream, StorageAdapter};
use crate::checkpoint::{CheckpointEntry, CheckpointKey, CheckpointMap, CheckpointStore};
use crate::errors::{Result, SyncError};
use crate::job::BatchDescriptor;
use crate::logger::{LogTransferLogger, TransferLogger};
use crate::stats::TransferStats;
use crate::transform::Transform;

/// Suffix of the in-flight artifact written before the commit rename.
pub const TEMP_SUFFIX: &str = ".tmp";

pub struct TransferEngine {
    registry: Arc<AdapterRegistry>,
    checkpoints: Arc<dyn CheckpointStore>,
    logger: Arc<dyn TransferLogger>,
    transform: Option<Transform>,
}

/// Adapter pair and paths for a single file.
struct FileTransfer<'a> {
    source: &'a dyn StorageAdapter,
    target: &'a dyn StorageAdapter,
    src: String,
    tmp: String,
    dst: String,
    chunk_size: usize,
}

impl TransferEngine {
    pub fn new(registry: Arc<AdapterRegistry>, checkpoints: Arc<dyn CheckpointStore>) -> Self {
        Self {
            registry,
            checkpoints,
            logger: Arc::new(LogTransferLogger),
            transform: None,
        }
    }

    pub fn with_logger(mut self, logger: Arc<dyn TransferLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Run one batch under checkpoint identity `key`.
    ///
    /// Returns the batch statistics when every file was committed or skipped.
    /// The first file-level failure aborts the batch with
    /// [`SyncError::BatchFailed`], which names the file and carries the stats
    /// accumulated up to that point.
    pub fn run(&self, descriptor: &BatchDescriptor, key: &CheckpointKey) -> Result<TransferStats> {
        descriptor.validate()?;

        let source = self
            .registry
            .create(&descriptor.source_type, &descriptor.source_connection)?;
        let target = self
            .registry
            .create(&descriptor.target_type, &descriptor.target_connection)?;

        let resolved = descriptor
            .files
            .resolve(source.as_ref(), &descriptor.source_path)?;
        let mut committed = self.checkpoints.load(key)?;

        if resolved.files.is_empty() {
            log::info!("batch {key}: no files to process");
            self.checkpoints.clear(key)?;
            let stats = TransferStats::default();
            self.logger.batch_done(key, &stats);
            return Ok(stats);
        }

        log::info!(
            "batch {key}: {} file(s) from {} to {} ({} already committed)",
            resolved.files.len(),
            resolved.source_dir,
            descriptor.target_path,
            committed.len()
        );

        let mut stats = TransferStats::new(resolved.files.len());
        for file_name in &resolved.files {
            if committed.contains_key(file_name) {
                stats.add_skipped();
                self.logger.skipped(file_name);
                continue;
            }

            let dst = join_path(&descriptor.target_path, file_name);
            let file = FileTransfer {
                source: source.as_ref(),
                target: target.as_ref(),
                src: join_path(&resolved.source_dir, file_name),
                tmp: format!("{dst}{TEMP_SUFFIX}"),
                dst,
                chunk_size: descriptor.chunk_size_bytes,
            };
            self.logger.start(&file.src, &file.dst);

            match self.commit_file(&file, file_name, key, &mut committed) {
                Ok(bytes) => {
                    stats.add_synced(bytes);
                    self.logger.committed(&file.src, &file.dst, bytes);
                }
                Err(err) => {
                    self.logger.error("transfer", &file.src, &err.to_string());
                    self.rollback(&file);
                    stats.add_failed();
                    if let Err(save_err) = self.checkpoints.save(key, &committed) {
                        log::error!(
                            "batch {key}: failed to persist checkpoint after failure: {save_err}"
                        );
                    }
                    self.logger.batch_done(key, &stats);
                    return Err(SyncError::BatchFailed {
                        file_name: file_name.clone(),
                        source: Box::new(err),
                        stats,
                    });
                }
            }
        }

        self.checkpoints.clear(key)?;
        self.logger.batch_done(key, &stats);
        Ok(stats)
    }

    /// Transfer one file and record it. On error `committed` is left as it was.
    fn commit_file(
        &self,
        file: &FileTransfer<'_>,
        file_name: &str,
        key: &CheckpointKey,
        committed: &mut CheckpointMap,
    ) -> Result<u64> {
        let bytes = self.transfer(file)?;
        committed.insert(file_name.to_string(), CheckpointEntry::now(bytes));
        if let Err(err) = self.checkpoints.save(key, committed) {
            committed.remove(file_name);
            return Err(err);
        }
        Ok(bytes)
    }

    /// Stream source chunks through the transform into the temp path, then
    /// rename it over the final path.
    fn transfer(&self, file: &FileTransfer<'_>) -> Result<u64> {
        let chunks = file.source.read_chunks(&file.src, file.chunk_size)?;
        let chunks: ChunkStream<'_> = match &self.transform {
            Some(transform) => {
                let transform = Arc::clone(transform);
                Box::new(chunks.map(move |chunk| chunk.map(&*transform)))
            }
            None => chunks,
        };
        let bytes = file.target.write_chunks(&file.tmp, chunks)?;
        file.target.rename_file(&file.tmp, &file.dst)?;
        Ok(bytes)
    }

    /// Best-effort removal of both artifacts of a failed file. Failures here
    /// are logged so they never mask the original cause.
    fn rollback(&self, file: &FileTransfer<'_>) {
        for path in [&file.tmp, &file.dst] {
            if let Err(err) = file.target.delete_file(path) {
                log::error!("cleanup of {path} failed: {err}");
                self.logger.error("cleanup", path, &err.to_string());
            }
        }
    }
}
