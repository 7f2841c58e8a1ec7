//! Pose primitives shared by the adapter, composer and publisher.
//!
//! Two orientation forms exist: a unit [`Quaternion`] on the wire and the
//! internal [`EulerAngles`] triple `(rx, ry, rz)`. Conversion between them
//! lives in `pose_fusion::convention`.

use serde::{Deserialize, Serialize};

use crate::Vector3;

/// Orientation quaternion, components in `(x, y, z, w)` order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Quaternion {
    pub const IDENTITY: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };

    #[inline]
    pub const fn new(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self { x, y, z, w }
    }

    pub fn norm(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w).sqrt()
    }

    /// Unit-length copy. A zero quaternion maps to identity.
    pub fn normalized(&self) -> Self {
        let n = self.norm();
        if n <= f64::EPSILON || !n.is_finite() {
            return Self::IDENTITY;
        }
        Self::new(self.x / n, self.y / n, self.z / n, self.w / n)
    }

    pub fn dot(&self, other: &Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z + self.w * other.w
    }

    /// True when both quaternions encode the same rotation (`q` and `-q`
    /// are the same rotation).
    pub fn same_rotation(&self, other: &Self, tolerance: f64) -> bool {
        let a = self.normalized();
        let b = other.normalized();
        (a.dot(&b).abs() - 1.0).abs() <= tolerance
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Internal orientation: rotation about x, y and z in the output frame,
/// composed as `Ry(ry) * Rx(rx) * Rz(rz)`. Radians.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EulerAngles {
    pub rx: f64,
    pub ry: f64,
    pub rz: f64,
}

impl EulerAngles {
    #[inline]
    pub const fn new(rx: f64, ry: f64, rz: f64) -> Self {
        Self { rx, ry, rz }
    }

    pub fn is_finite(&self) -> bool {
        self.rx.is_finite() && self.ry.is_finite() && self.rz.is_finite()
    }
}

/// Internal pose: position plus Euler orientation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vector3,
    pub orientation: EulerAngles,
}

impl Pose {
    pub const fn new(position: Vector3, orientation: EulerAngles) -> Self {
        Self {
            position,
            orientation,
        }
    }

    pub const fn from_position(x: f64, y: f64, z: f64) -> Self {
        Self {
            position: Vector3::new(x, y, z),
            orientation: EulerAngles::new(0.0, 0.0, 0.0),
        }
    }
}

/// Wire pose: position plus quaternion, with its source timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseStamped {
    /// Seconds
    pub timestamp: f64,
    pub position: Vector3,
    pub orientation: Quaternion,
}

impl PoseStamped {
    pub const fn new(timestamp: f64, position: Vector3, orientation: Quaternion) -> Self {
        Self {
            timestamp,
            position,
            orientation,
        }
    }
}

/// Angular and linear velocity. Passed through untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Twist {
    pub angular: Vector3,
    pub linear: Vector3,
}
