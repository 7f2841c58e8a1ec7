//! Two-rate pose composer.
//!
//! Holds the correction offset `post * pre^-1` from the slow refinement
//! stage and applies it in full to every fast raw pose until the next
//! correction replaces it. No interpolation or decay between corrections.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use contracts::{CorrectionMessage, Pose, PoseStamped, Twist};
use tracing::instrument;

use crate::convention::MountingConvention;
use crate::transform::RigidTransform;

/// Retained correction state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correction {
    /// Offset applied to raw poses
    pub offset: RigidTransform,
    /// Velocities from the last correction, passed through
    pub twist: Option<Twist>,
    /// Timestamp of the last correction
    pub timestamp: Option<f64>,
    /// Number of corrections applied so far
    pub updates: u64,
}

impl Default for Correction {
    fn default() -> Self {
        Self {
            offset: RigidTransform::identity(),
            twist: None,
            timestamp: None,
            updates: 0,
        }
    }
}

/// Result of one raw pose going through the composer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComposedPose {
    /// Raw pose after convention adaptation
    pub raw: PoseStamped,
    /// Raw pose with the retained offset applied
    pub corrected: PoseStamped,
    /// Velocities of the correction in effect
    pub twist: Option<Twist>,
}

/// Blends fast raw poses with the latest slow correction.
///
/// Both entry points take `&self`; the offset sits behind a lock held only
/// for a copy in or out.
#[derive(Debug, Default)]
pub struct PoseComposer {
    convention: MountingConvention,
    correction: RwLock<Correction>,
}

impl PoseComposer {
    pub fn new(convention: MountingConvention) -> Self {
        Self {
            convention,
            correction: RwLock::new(Correction::default()),
        }
    }

    pub fn convention(&self) -> &MountingConvention {
        &self.convention
    }

    /// Wire pose to internal pose
    pub fn adapt(&self, pose: &PoseStamped) -> Pose {
        Pose::new(pose.position, self.convention.to_internal(&pose.orientation))
    }

    /// Internal pose to wire pose in the output convention
    pub fn emit(&self, timestamp: f64, pose: &Pose) -> PoseStamped {
        PoseStamped::new(
            timestamp,
            pose.position,
            self.convention.to_output(&pose.orientation),
        )
    }

    /// Apply the retained offset to a raw pose.
    ///
    /// With no correction yet the offset is identity and the raw pose
    /// passes through (after adaptation).
    #[instrument(level = "trace", name = "composer_raw_pose", skip_all, fields(timestamp = raw.timestamp))]
    pub fn on_raw_pose(&self, raw: &PoseStamped) -> ComposedPose {
        let correction = *self.read();

        let raw_pose = self.adapt(raw);
        let raw_tf = RigidTransform::from_pose(&raw_pose, &self.convention);
        let corrected_pose = correction
            .offset
            .compose(&raw_tf)
            .to_pose(&self.convention);

        ComposedPose {
            raw: self.emit(raw.timestamp, &raw_pose),
            corrected: self.emit(raw.timestamp, &corrected_pose),
            twist: correction.twist,
        }
    }

    /// Replace the offset with the transform taking `pre` onto `post`.
    #[instrument(level = "debug", name = "composer_correction", skip_all, fields(timestamp = post.timestamp))]
    pub fn on_correction(&self, pre: &PoseStamped, post: &PoseStamped) {
        self.apply(pre, post, None);
    }

    /// [`Self::on_correction`] plus the twist carried by the message
    pub fn on_correction_message(&self, message: &CorrectionMessage) {
        self.apply(&message.pre, &message.post, message.twist);
    }

    /// Current correction state
    pub fn correction(&self) -> Correction {
        *self.read()
    }

    fn apply(&self, pre: &PoseStamped, post: &PoseStamped, twist: Option<Twist>) {
        let pre_tf = RigidTransform::from_pose(&self.adapt(pre), &self.convention);
        let post_tf = RigidTransform::from_pose(&self.adapt(post), &self.convention);
        let offset = RigidTransform::relative(&pre_tf, &post_tf);

        let updates = {
            let mut guard = self.write();
            guard.offset = offset;
            guard.twist = twist;
            guard.timestamp = Some(post.timestamp);
            guard.updates += 1;
            guard.updates
        };

        metrics::counter!("composer_corrections_total").increment(1);
        tracing::debug!(
            updates,
            dx = offset.translation.x,
            dy = offset.translation.y,
            dz = offset.translation.z,
            angle = offset.rotation.angle(),
            "correction offset updated"
        );
    }

    fn read(&self) -> RwLockReadGuard<'_, Correction> {
        self.correction
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Correction> {
        self.correction
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
