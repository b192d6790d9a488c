use crate::checkpoint::CheckpointKey;
use crate::stats::TransferStats;

/// Per-file progress hooks invoked by the transfer engine.
///
/// All methods default to no-ops so observers only implement what they need.
pub trait TransferLogger: Send + Sync {
    fn start(&self, _src: &str, _dst: &str) {}
    fn skipped(&self, _file_name: &str) {}
    fn committed(&self, _src: &str, _dst: &str, _bytes: u64) {}
    fn error(&self, _context: &str, _path: &str, _msg: &str) {}
    fn batch_done(&self, _key: &CheckpointKey, _stats: &TransferStats) {}
}

/// Discards every event.
pub struct NoopLogger;

impl TransferLogger for NoopLogger {}

/// Forwards events to the `log` facade.
pub struct LogTransferLogger;

impl TransferLogger for LogTransferLogger {
    fn start(&self, src: &str, dst: &str) {
        log::debug!("transferring {src} -> {dst}");
    }

    fn skipped(&self, file_name: &str) {
        log::info!("skipping {file_name} (already committed)");
    }

    fn committed(&self, src: &str, dst: &str, bytes: u64) {
        log::info!("synced {src} -> {dst} ({bytes} bytes)");
    }

    fn error(&self, context: &str, path: &str, msg: &str) {
        log::error!("{context}: {path}: {msg}");
    }

    fn batch_done(&self, key: &CheckpointKey, stats: &TransferStats) {
        log::info!(
            "batch {key} complete: {} synced, {} skipped, {} failed, {} bytes",
            stats.synced,
            stats.skipped,
            stats.failed,
            stats.total_bytes
        );
    }
}
