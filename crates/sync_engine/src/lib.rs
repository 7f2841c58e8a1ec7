//! # Sync Engine
//!
//! Stream synchronization gate.
//!
//! Responsibilities:
//! - One single-sample slot per declared stream (overwrite on arrival)
//! - Readiness predicate: all slots unconsumed and timestamp skew within tolerance
//! - Atomic `consume_all` producing a `FrameSnapshot`
//! - Critical-section wrapper shared by producers and the driver loop
//!
//! ## Example
//!
//! ```ignore
//! use sync_engine::{SharedGate, SyncGate};
//!
//! let gate = SharedGate::new(SyncGate::from_blueprint(&blueprint)?);
//!
//! // producers, from any thread
//! gate.record_arrival(packet)?;
//!
//! // driver loop
//! if let Some(snapshot) = gate.try_consume(blueprint.sync.tolerance_sec) {
//!     // process one frame
//! }
//! ```

mod gate;
mod shared;
mod slot;

pub use gate::{GateConfig, SyncGate};
pub use shared::SharedGate;
pub use slot::{Arrival, StreamSlot};

// Re-export contracts types
pub use contracts::{FrameSnapshot, GateStats, SkewCheck, StreamPacket};
