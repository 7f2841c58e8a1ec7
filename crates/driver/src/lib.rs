//! # Driver
//!
//! Real-time driver loop. Polls the synchronization gate at a fixed rate
//! and, whenever a complete frame is ready, runs one cycle:
//! estimate → compose → publish.
//!
//! ```text
//! producers ──► SharedGate ──poll──► DriverLoop ──► FusionCycle ──► Publisher ──► Dispatcher
//!                                                       ▲
//! corrections ──► spawn_correction_intake ──► PoseComposer
//! ```

mod cycle;
mod error;
mod intake;
mod runner;

pub use cycle::{CycleReport, FusionCycle};
pub use error::DriverError;
pub use intake::spawn_correction_intake;
pub use runner::{DriverLoop, DriverState, DriverStats, LoopConfig, SnapshotObserver};
