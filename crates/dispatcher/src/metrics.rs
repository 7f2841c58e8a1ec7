//! Per-sink counters

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use contracts::Publication;

/// Counters for one sink worker
#[derive(Debug, Default)]
pub struct SinkMetrics {
    queue_len: AtomicUsize,
    odometry_writes: AtomicU64,
    transform_writes: AtomicU64,
    heavy_writes: AtomicU64,
    failure_count: AtomicU64,
    /// Publications rejected because the sink queue was full
    dropped_count: AtomicU64,
}

impl SinkMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_len(&self) -> usize {
        self.queue_len.load(Ordering::Relaxed)
    }

    pub fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    /// Total successful writes across all kinds
    pub fn write_count(&self) -> u64 {
        self.odometry_writes.load(Ordering::Relaxed)
            + self.transform_writes.load(Ordering::Relaxed)
            + self.heavy_writes.load(Ordering::Relaxed)
    }

    pub fn record_write(&self, publication: &Publication) {
        let counter = match publication {
            Publication::Odometry(_) => &self.odometry_writes,
            Publication::Transform(_) => &self.transform_writes,
            Publication::Heavy(_) => &self.heavy_writes,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn inc_failure_count(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped_count.load(Ordering::Relaxed)
    }

    pub fn inc_dropped_count(&self) {
        self.dropped_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queue_len: self.queue_len(),
            odometry_writes: self.odometry_writes.load(Ordering::Relaxed),
            transform_writes: self.transform_writes.load(Ordering::Relaxed),
            heavy_writes: self.heavy_writes.load(Ordering::Relaxed),
            failure_count: self.failure_count(),
            dropped_count: self.dropped_count(),
        }
    }
}

/// Point-in-time copy of [`SinkMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub queue_len: usize,
    pub odometry_writes: u64,
    pub transform_writes: u64,
    pub heavy_writes: u64,
    pub failure_count: u64,
    pub dropped_count: u64,
}

impl MetricsSnapshot {
    pub fn write_count(&self) -> u64 {
        self.odometry_writes + self.transform_writes + self.heavy_writes
    }
}
