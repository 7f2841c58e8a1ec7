//! Frame convention adapter.
//!
//! Converts orientations between the sensor-native quaternion and the
//! internal `(rx, ry, rz)` triple. The axis permutation lives in a
//! [`MountingConvention`] value, so another sensor mounting only needs a
//! different constant.
//!
//! For [`CAMERA_FRAME`] the steps are:
//!
//! 1. native `(qx, qy, qz, qw)` becomes the extraction quaternion
//!    `(qz, -qx, -qy, qw)`
//! 2. `(roll, pitch, yaw)` is read off its rotation matrix
//! 3. `(rx, ry, rz) = (-pitch, -yaw, roll)`
//!
//! and the way back builds a quaternion from `(rz, -rx, -ry)` and emits it
//! as `(-qy, -qz, qx, qw)`.
//!
//! # Gimbal singularity
//!
//! At pitch = ±90° in the extraction frame (`rx = ∓π/2`) roll and yaw are
//! not separable. `asin` input is clamped so the result stays finite, but
//! `ry` and `rz` returned there are arbitrary and a round trip is not
//! guaranteed to reproduce the input rotation.

use contracts::{EulerAngles, Quaternion};
use nalgebra::{Quaternion as NaQuaternion, Rotation3, UnitQuaternion};

/// Picks one component of a source array, optionally negated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignedAxis {
    pub index: usize,
    pub negate: bool,
}

impl SignedAxis {
    pub const fn pos(index: usize) -> Self {
        Self {
            index,
            negate: false,
        }
    }

    pub const fn neg(index: usize) -> Self {
        Self {
            index,
            negate: true,
        }
    }

    #[inline]
    fn pick(&self, values: &[f64]) -> f64 {
        let v = values[self.index];
        if self.negate {
            -v
        } else {
            v
        }
    }
}

/// A fixed axis/sign permutation between a sensor mounting and the
/// internal Euler representation.
///
/// Quaternion arrays are `(x, y, z, w)`; Euler arrays are
/// `(roll, pitch, yaw)` on the extraction side and `(rx, ry, rz)` on the
/// internal side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MountingConvention {
    /// Extraction quaternion picked from the native quaternion
    pub native_to_extraction: [SignedAxis; 4],
    /// Native quaternion picked from the extraction quaternion
    pub extraction_to_native: [SignedAxis; 4],
    /// `(rx, ry, rz)` picked from `(roll, pitch, yaw)`
    pub rpy_to_internal: [SignedAxis; 3],
}

/// Camera-style mounting: forward and down swapped relative to the output frame.
pub const CAMERA_FRAME: MountingConvention = MountingConvention {
    native_to_extraction: [
        SignedAxis::pos(2),
        SignedAxis::neg(0),
        SignedAxis::neg(1),
        SignedAxis::pos(3),
    ],
    extraction_to_native: [
        SignedAxis::neg(1),
        SignedAxis::neg(2),
        SignedAxis::pos(0),
        SignedAxis::pos(3),
    ],
    rpy_to_internal: [SignedAxis::neg(1), SignedAxis::neg(2), SignedAxis::pos(0)],
};

impl Default for MountingConvention {
    fn default() -> Self {
        CAMERA_FRAME
    }
}

impl MountingConvention {
    /// Native quaternion to internal Euler angles. Input need not be unit
    /// length; a zero quaternion is treated as identity.
    pub fn to_internal(&self, q: &Quaternion) -> EulerAngles {
        let q = q.normalized();
        let native = [q.x, q.y, q.z, q.w];
        let e = self.native_to_extraction.map(|axis| axis.pick(&native));

        let rotation =
            UnitQuaternion::from_quaternion(NaQuaternion::new(e[3], e[0], e[1], e[2]))
                .to_rotation_matrix();
        let (roll, pitch, yaw) = rpy_from_matrix(&rotation);

        let rpy = [roll, pitch, yaw];
        let [rx, ry, rz] = self.rpy_to_internal.map(|axis| axis.pick(&rpy));
        EulerAngles::new(rx, ry, rz)
    }

    /// Internal Euler angles to a unit quaternion in the native/output
    /// convention.
    pub fn to_output(&self, angles: &EulerAngles) -> Quaternion {
        let internal = [angles.rx, angles.ry, angles.rz];
        let mut rpy = [0.0; 3];
        for (i, axis) in self.rpy_to_internal.iter().enumerate() {
            rpy[axis.index] = if axis.negate {
                -internal[i]
            } else {
                internal[i]
            };
        }

        let q = UnitQuaternion::from_euler_angles(rpy[0], rpy[1], rpy[2]);
        let c = q.quaternion().coords;
        let extraction = [c.x, c.y, c.z, c.w];
        let [x, y, z, w] = self.extraction_to_native.map(|axis| axis.pick(&extraction));
        Quaternion::new(x, y, z, w)
    }

    /// Internal Euler angles as an nalgebra rotation
    pub fn rotation(&self, angles: &EulerAngles) -> UnitQuaternion<f64> {
        to_nalgebra(&self.to_output(angles))
    }

    /// nalgebra rotation back to internal Euler angles
    pub fn angles(&self, rotation: &UnitQuaternion<f64>) -> EulerAngles {
        self.to_internal(&from_nalgebra(rotation))
    }
}

/// [`MountingConvention::to_internal`] with [`CAMERA_FRAME`]
pub fn to_internal(q: &Quaternion) -> EulerAngles {
    CAMERA_FRAME.to_internal(q)
}

/// [`MountingConvention::to_output`] with [`CAMERA_FRAME`]
pub fn to_output(angles: &EulerAngles) -> Quaternion {
    CAMERA_FRAME.to_output(angles)
}

/// Roll/pitch/yaw of `R = Rz(yaw) * Ry(pitch) * Rx(roll)`.
fn rpy_from_matrix(m: &Rotation3<f64>) -> (f64, f64, f64) {
    let pitch = (-m[(2, 0)]).clamp(-1.0, 1.0).asin();
    let roll = m[(2, 1)].atan2(m[(2, 2)]);
    let yaw = m[(1, 0)].atan2(m[(0, 0)]);
    (roll, pitch, yaw)
}

pub(crate) fn to_nalgebra(q: &Quaternion) -> UnitQuaternion<f64> {
    let q = q.normalized();
    UnitQuaternion::from_quaternion(NaQuaternion::new(q.w, q.x, q.y, q.z))
}

pub(crate) fn from_nalgebra(q: &UnitQuaternion<f64>) -> Quaternion {
    let c = q.quaternion().coords;
    Quaternion::new(c.x, c.y, c.z, c.w)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

    const TOL: f64 = 1e-9;

    fn assert_same_quaternion(a: &Quaternion, b: &Quaternion) {
        // q and -q are the same rotation; align signs before comparing
        let sign = if a.dot(b) < 0.0 { -1.0 } else { 1.0 };
        assert_relative_eq!(a.x, sign * b.x, epsilon = TOL);
        assert_relative_eq!(a.y, sign * b.y, epsilon = TOL);
        assert_relative_eq!(a.z, sign * b.z, epsilon = TOL);
        assert_relative_eq!(a.w, sign * b.w, epsilon = TOL);
    }

    #[test]
    fn identity_maps_to_zero_angles() {
        let angles = to_internal(&Quaternion::IDENTITY);
        assert_relative_eq!(angles.rx, 0.0, epsilon = TOL);
        assert_relative_eq!(angles.ry, 0.0, epsilon = TOL);
        assert_relative_eq!(angles.rz, 0.0, epsilon = TOL);
        assert_same_quaternion(&to_output(&angles), &Quaternion::IDENTITY);
    }

    #[test]
    fn round_trip_away_from_singularity() {
        let samples = [
            Quaternion::new(0.1, 0.2, 0.3, 0.9),
            Quaternion::new(-0.4, 0.1, 0.2, 0.8),
            Quaternion::new(0.0, 0.7071, 0.0, 0.7071),
            Quaternion::new(0.3, -0.3, 0.6, -0.5),
            Quaternion::new(0.9, 0.05, -0.1, 0.2),
            Quaternion::new(0.0, 0.0, 1.0, 0.0),
        ];
        for q in samples {
            let q = q.normalized();
            let back = to_output(&to_internal(&q));
            assert_same_quaternion(&back, &q);
            assert_relative_eq!(back.norm(), 1.0, epsilon = TOL);
        }
    }

    #[test]
    fn angles_round_trip() {
        let angles = EulerAngles::new(0.3, -1.2, 2.5);
        let back = to_internal(&to_output(&angles));
        assert_relative_eq!(back.rx, angles.rx, epsilon = TOL);
        assert_relative_eq!(back.ry, angles.ry, epsilon = TOL);
        assert_relative_eq!(back.rz, angles.rz, epsilon = TOL);
    }

    #[test]
    fn internal_angles_follow_native_axes() {
        // A positive rotation about native axis i shows up as a positive
        // internal angle i: handedness is preserved.
        let (s, c) = (FRAC_PI_4 / 2.0).sin_cos();
        let about_x = to_internal(&Quaternion::new(s, 0.0, 0.0, c));
        let about_y = to_internal(&Quaternion::new(0.0, s, 0.0, c));
        let about_z = to_internal(&Quaternion::new(0.0, 0.0, s, c));

        assert_relative_eq!(about_x.rx, FRAC_PI_4, epsilon = TOL);
        assert_relative_eq!(about_y.ry, FRAC_PI_4, epsilon = TOL);
        assert_relative_eq!(about_z.rz, FRAC_PI_4, epsilon = TOL);
        assert_relative_eq!(about_x.ry.abs() + about_x.rz.abs(), 0.0, epsilon = TOL);
    }

    #[test]
    fn rotation_matches_yxz_composition() {
        let angles = EulerAngles::new(0.2, -0.4, 0.7);
        let expected = UnitQuaternion::from_axis_angle(&nalgebra::Vector3::y_axis(), angles.ry)
            * UnitQuaternion::from_axis_angle(&nalgebra::Vector3::x_axis(), angles.rx)
            * UnitQuaternion::from_axis_angle(&nalgebra::Vector3::z_axis(), angles.rz);
        let got = CAMERA_FRAME.rotation(&angles);
        assert_relative_eq!(got.angle_to(&expected), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn permutations_are_mutual_inverses() {
        let q = [0.1, -0.2, 0.3, 0.9];
        let there = CAMERA_FRAME.native_to_extraction.map(|a| a.pick(&q));
        let back = CAMERA_FRAME.extraction_to_native.map(|a| a.pick(&there));
        assert_eq!(back, q);
    }

    #[test]
    fn gimbal_singularity_stays_finite() {
        // rx = -pi/2 is pitch = +pi/2 in the extraction frame
        for rx in [-FRAC_PI_2, FRAC_PI_2] {
            let q = to_output(&EulerAngles::new(rx, 0.3, 0.2));
            let angles = to_internal(&q);
            assert!(angles.is_finite(), "{angles:?}");
            assert_relative_eq!(angles.rx, rx, epsilon = 1e-6);
            assert!(to_output(&angles).norm().is_finite());
        }
    }

    #[test]
    fn gimbal_from_exact_quaternion_does_not_panic() {
        // extraction quaternion = 90 degrees about y
        let h = FRAC_PI_4.sin();
        let native = Quaternion::new(-h, 0.0, 0.0, h);
        let angles = to_internal(&native);
        assert!(angles.is_finite());
        assert_relative_eq!(angles.rx.abs(), FRAC_PI_2, epsilon = 1e-6);
    }

    #[test]
    fn zero_quaternion_is_identity() {
        let angles = to_internal(&Quaternion::new(0.0, 0.0, 0.0, 0.0));
        assert_relative_eq!(angles.rx.abs() + angles.ry.abs() + angles.rz.abs(), 0.0);
    }
}
