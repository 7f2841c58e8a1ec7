//! # Pose Fusion
//!
//! Orientation convention handling and two-rate pose composition.
//!
//! - [`convention`]: pure conversions between the sensor-native quaternion
//!   and the internal `(rx, ry, rz)` triple
//! - [`RigidTransform`]: compose / inverse over position + rotation
//! - [`PoseComposer`]: applies the latest correction offset to each raw pose
//! - [`OdometryEstimator`]: seam for the upstream scan matcher
//!
//! ## Example
//!
//! ```ignore
//! use pose_fusion::{PoseComposer, CAMERA_FRAME};
//!
//! let composer = PoseComposer::new(CAMERA_FRAME);
//! composer.on_correction(&pre, &post);
//! let out = composer.on_raw_pose(&raw);
//! publish(out.corrected);
//! ```

pub mod convention;
mod composer;
mod estimator;
mod transform;

pub use composer::{ComposedPose, Correction, PoseComposer};
pub use convention::{to_internal, to_output, MountingConvention, SignedAxis, CAMERA_FRAME};
pub use estimator::{ConstantVelocityEstimator, OdometryEstimator};
pub use transform::RigidTransform;
