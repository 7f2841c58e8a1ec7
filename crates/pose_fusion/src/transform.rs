//! Rigid transform used for pose composition.

use contracts::{Pose, PoseStamped, Quaternion, Vector3 as WireVector};
use nalgebra::{UnitQuaternion, Vector3};

use crate::convention::{from_nalgebra, to_nalgebra, MountingConvention};

/// Rotation followed by translation.
///
/// `compose(a, b)` applies `b` first:
/// `rotation = a.r * b.r`, `translation = a.r * b.t + a.t`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidTransform {
    pub rotation: UnitQuaternion<f64>,
    pub translation: Vector3<f64>,
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl RigidTransform {
    #[must_use]
    pub const fn new(rotation: UnitQuaternion<f64>, translation: Vector3<f64>) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    #[must_use]
    pub fn identity() -> Self {
        Self::new(UnitQuaternion::identity(), Vector3::zeros())
    }

    #[must_use]
    pub fn from_translation(translation: Vector3<f64>) -> Self {
        Self::new(UnitQuaternion::identity(), translation)
    }

    /// From an internal pose, using `convention` to rebuild the rotation
    /// from its Euler angles.
    #[must_use]
    pub fn from_pose(pose: &Pose, convention: &MountingConvention) -> Self {
        Self::new(
            convention.rotation(&pose.orientation),
            to_vector(&pose.position),
        )
    }

    /// Back to an internal pose
    #[must_use]
    pub fn to_pose(&self, convention: &MountingConvention) -> Pose {
        Pose::new(
            from_vector(&self.translation),
            convention.angles(&self.rotation),
        )
    }

    /// From a wire pose, quaternion taken as is
    #[must_use]
    pub fn from_stamped(pose: &PoseStamped) -> Self {
        Self::new(to_nalgebra(&pose.orientation), to_vector(&pose.position))
    }

    /// Wire position and quaternion
    #[must_use]
    pub fn to_wire(&self) -> (WireVector, Quaternion) {
        (from_vector(&self.translation), from_nalgebra(&self.rotation))
    }

    /// `self * other`: applies `other` first, then `self`.
    #[must_use]
    pub fn compose(&self, other: &Self) -> Self {
        Self {
            rotation: self.rotation * other.rotation,
            translation: self.translation + self.rotation * other.translation,
        }
    }

    #[must_use]
    pub fn inverse(&self) -> Self {
        let rotation = self.rotation.inverse();
        Self {
            rotation,
            translation: rotation * (-self.translation),
        }
    }

    /// Transform taking `from` to `to`: `to * from^-1`.
    #[must_use]
    pub fn relative(from: &Self, to: &Self) -> Self {
        to.compose(&from.inverse())
    }

    #[must_use]
    pub fn transform_point(&self, point: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * point + self.translation
    }

    #[must_use]
    pub fn is_identity(&self, epsilon: f64) -> bool {
        self.rotation.angle().abs() < epsilon && self.translation.norm() < epsilon
    }
}

fn to_vector(v: &WireVector) -> Vector3<f64> {
    Vector3::new(v.x, v.y, v.z)
}

fn from_vector(v: &Vector3<f64>) -> WireVector {
    WireVector::new(v.x, v.y, v.z)
}
