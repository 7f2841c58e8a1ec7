//! # Contracts
//!
//! Frozen interface contracts, defining inter-module data structures and traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Source timestamps are seconds as `f64`, monotonic per stream
//! - Every output of a processing cycle carries the anchor stream's timestamp
//!
//! ## Orientation conventions
//! - Incoming quaternions are in the sensor-native convention
//! - Outgoing quaternions are in the output convention
//! - Internally orientation is an [`EulerAngles`] triple

mod blueprint;
mod error;
mod odometry;
mod packet;
mod pose;
mod sink;
mod stream_id;
mod stream_source;

pub use blueprint::*;
pub use error::*;
pub use odometry::*;
pub use packet::*;
pub use pose::*;
pub use sink::*;
pub use stream_id::StreamId;
pub use stream_source::{CorrectionCallback, CorrectionSource, StreamDataCallback, StreamSource};
