//! Recording counters shared between the control loop and the writer thread

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub(crate) struct RecordingCounters {
    written: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
    bytes: AtomicU64,
}

impl RecordingCounters {
    pub(crate) fn wrote(&self, bytes: u64) {
        self.written.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn summary(&self) -> RecordingSummary {
        RecordingSummary {
            written: self.written.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
        }
    }
}

/// What a recording session put on disk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordingSummary {
    /// Steps fully written
    pub written: u64,
    /// Steps whose write failed
    pub failed: u64,
    /// Steps dropped because the writer fell behind
    pub dropped: u64,
    /// Image, view and log bytes written
    pub bytes: u64,
}

impl RecordingSummary {
    /// Steps the recorder saw, whatever happened to them
    pub fn total(&self) -> u64 {
        self.written + self.failed + self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_reflects_counters() {
        let counters = RecordingCounters::default();
        counters.wrote(100);
        counters.wrote(50);
        counters.dropped();
        counters.failed();

        let summary = counters.summary();
        assert_eq!(
            summary,
            RecordingSummary {
                written: 2,
                failed: 1,
                dropped: 1,
                bytes: 150,
            }
        );
        assert_eq!(summary.total(), 4);
    }
}
