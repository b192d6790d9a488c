use indicatif::{ProgressBar, ProgressStyle};
use shuttle_core::logger::{LogTransferLogger, TransferLogger};
use shuttle_core::{CheckpointKey, TransferStats};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Spinner that tracks committed files across every batch of an invocation.
/// Events are also forwarded to the `log` facade.
pub struct ProgressLogger {
    pb: ProgressBar,
    bytes: AtomicU64,
}

impl ProgressLogger {
    pub fn new() -> Self {
        let pb = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner} {pos} file(s) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["-", "\\", "|", "/"]);
        pb.set_style(style);
        pb.enable_steady_tick(Duration::from_millis(120));
        Self {
            pb,
            bytes: AtomicU64::new(0),
        }
    }

    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }
}

impl TransferLogger for ProgressLogger {
    fn start(&self, src: &str, dst: &str) {
        LogTransferLogger.start(src, dst);
        self.pb.set_message(format!("{src} → {dst}"));
    }

    fn skipped(&self, file_name: &str) {
        LogTransferLogger.skipped(file_name);
    }

    fn committed(&self, src: &str, dst: &str, bytes: u64) {
        LogTransferLogger.committed(src, dst, bytes);
        let total = self.bytes.fetch_add(bytes, Ordering::Relaxed) + bytes;
        self.pb.inc(1);
        self.pb.set_message(format!("({})", format_bytes(total)));
    }

    fn error(&self, context: &str, path: &str, msg: &str) {
        LogTransferLogger.error(context, path, msg);
        self.pb.println(format!("[error] {context}: {path}: {msg}"));
    }

    fn batch_done(&self, key: &CheckpointKey, stats: &TransferStats) {
        LogTransferLogger.batch_done(key, stats);
    }
}

pub(crate) fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    if bytes == 0 {
        return "0 B".to_owned();
    }
    let mut value = bytes as f64;
    let mut unit = 0usize;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[unit])
    } else {
        format!("{:.2} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_byte_counts() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(25 * 1024 * 1024), "25.00 MiB");
    }
}
