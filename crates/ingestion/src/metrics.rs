//! Ingestion counters

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct IngestionMetrics {
    packets_received: AtomicU64,
    /// Packets the downstream handler refused (e.g. undeclared stream)
    packets_rejected: AtomicU64,
    corrections_received: AtomicU64,
    /// Corrections lost to a full intake queue
    corrections_dropped: AtomicU64,
}

impl IngestionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self) {
        self.packets_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.packets_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_correction(&self) {
        self.corrections_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_correction_dropped(&self) {
        self.corrections_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            packets_received: self.packets_received.load(Ordering::Relaxed),
            packets_rejected: self.packets_rejected.load(Ordering::Relaxed),
            corrections_received: self.corrections_received.load(Ordering::Relaxed),
            corrections_dropped: self.corrections_dropped.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub packets_received: u64,
    pub packets_rejected: u64,
    pub corrections_received: u64,
    pub corrections_dropped: u64,
}
