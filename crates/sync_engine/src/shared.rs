//! Thread-safe handle around [`SyncGate`].
//!
//! Every arrival, readiness check and consume runs under one mutex, so a
//! producer can never slip a sample in between a driver's check and its
//! consume.

use std::sync::{Arc, Mutex, MutexGuard};

use contracts::{ContractError, FrameSnapshot, GateStats, StreamPacket};

use crate::gate::SyncGate;
use crate::slot::Arrival;

/// Cloneable handle shared by producers and the driver loop
#[derive(Debug, Clone)]
pub struct SharedGate {
    inner: Arc<Mutex<SyncGate>>,
}

impl SharedGate {
    pub fn new(gate: SyncGate) -> Self {
        Self {
            inner: Arc::new(Mutex::new(gate)),
        }
    }

    /// Lock the gate. A producer that panicked mid-arrival leaves the gate
    /// in a consistent state, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, SyncGate> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn record_arrival(&self, packet: StreamPacket) -> Result<Arrival, ContractError> {
        self.lock().record_arrival(packet)
    }

    pub fn is_ready(&self, tolerance_sec: f64) -> bool {
        self.lock().is_ready(tolerance_sec)
    }

    pub fn consume_all(&self) -> Option<FrameSnapshot> {
        self.lock().consume_all()
    }

    /// Check and consume under a single lock acquisition
    pub fn try_consume(&self, tolerance_sec: f64) -> Option<FrameSnapshot> {
        self.lock().try_consume(tolerance_sec)
    }

    pub fn stats(&self) -> GateStats {
        self.lock().stats()
    }

    pub fn consumed_count(&self) -> u64 {
        self.lock().consumed_count()
    }

    /// Run a closure with exclusive access to the gate
    pub fn with_gate<R>(&self, f: impl FnOnce(&mut SyncGate) -> R) -> R {
        f(&mut self.lock())
    }
}
