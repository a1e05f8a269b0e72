use crate::restore::RestoreResult;
use std::sync::atomic::{AtomicU64, Ordering};

/// Aggregate restore counters, updated atomically by workers and read by
/// progress renderers.
pub struct RestoreStats {
    files_total: u64,
    bytes_total: u64,
    completed_files: AtomicU64,
    completed_bytes: AtomicU64,
    repaired_files: AtomicU64,
    verified_files: AtomicU64,
    disk_write_bytes: AtomicU64,
    reused_bytes: AtomicU64,
}

#[derive(Debug, Clone, Copy)]
pub struct StatsSnapshot {
    pub files_total: u64,
    pub bytes_total: u64,
    pub completed_files: u64,
    pub completed_bytes: u64,
    pub repaired_files: u64,
    pub verified_files: u64,
    pub disk_write_bytes: u64,
    pub reused_bytes: u64,
}

impl RestoreStats {
    pub fn new(files_total: u64, bytes_total: u64) -> Self {
        Self {
            files_total,
            bytes_total,
            completed_files: AtomicU64::new(0),
            completed_bytes: AtomicU64::new(0),
            repaired_files: AtomicU64::new(0),
            verified_files: AtomicU64::new(0),
            disk_write_bytes: AtomicU64::new(0),
            reused_bytes: AtomicU64::new(0),
        }
    }

    pub fn record(&self, result: &RestoreResult) {
        self.completed_files.fetch_add(1, Ordering::Relaxed);
        self.completed_bytes
            .fetch_add(result.disk_write_bytes + result.reused_bytes, Ordering::Relaxed);
        if result.repaired {
            self.repaired_files.fetch_add(1, Ordering::Relaxed);
        } else {
            self.verified_files.fetch_add(1, Ordering::Relaxed);
        }
        self.disk_write_bytes.fetch_add(result.disk_write_bytes, Ordering::Relaxed);
        self.reused_bytes.fetch_add(result.reused_bytes, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            files_total: self.files_total,
            bytes_total: self.bytes_total,
            completed_files: self.completed_files.load(Ordering::Relaxed),
            completed_bytes: self.completed_bytes.load(Ordering::Relaxed),
            repaired_files: self.repaired_files.load(Ordering::Relaxed),
            verified_files: self.verified_files.load(Ordering::Relaxed),
            disk_write_bytes: self.disk_write_bytes.load(Ordering::Relaxed),
            reused_bytes: self.reused_bytes.load(Ordering::Relaxed),
        }
    }
}
