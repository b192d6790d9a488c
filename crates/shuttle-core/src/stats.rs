use serde::Serialize;

/// Outcome counters for one batch run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransferStats {
    pub total_files: usize,
    pub synced: usize,
    pub skipped: usize,
    pub failed: usize,
    pub total_bytes: u64,
}

impl TransferStats {
    pub fn new(total_files: usize) -> Self {
        Self {
            total_files,
            ..Self::default()
        }
    }

    pub fn add_synced(&mut self, bytes: u64) {
        self.synced += 1;
        self.total_bytes += bytes;
    }

    pub fn add_skipped(&mut self) {
        self.skipped += 1;
    }

    pub fn add_failed(&mut self) {
        self.failed += 1;
    }

    /// Fold another batch's counters into this one.
    pub fn merge(&mut self, other: &TransferStats) {
        self.total_files += other.total_files;
        self.synced += other.synced;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.total_bytes += other.total_bytes;
    }
}
