//! Scan-matching seam.
//!
//! The real incremental estimator lives upstream; the driver only needs
//! something that turns a frame snapshot into a raw pose.

use contracts::{EulerAngles, FrameSnapshot, PoseStamped, RawOdometry, Vector3};

use crate::convention::MountingConvention;

/// Produces a raw incremental pose for one synchronized frame.
pub trait OdometryEstimator: Send {
    fn estimate(&mut self, snapshot: &FrameSnapshot) -> RawOdometry;
}

/// Dead-reckoning stand-in: constant linear velocity and yaw rate, both in
/// the internal frame.
#[derive(Debug, Clone)]
pub struct ConstantVelocityEstimator {
    convention: MountingConvention,
    /// m/s along internal (x, y, z)
    velocity: Vector3,
    /// rad/s about the internal y axis
    yaw_rate: f64,
    position: Vector3,
    heading: f64,
    last_timestamp: Option<f64>,
}

impl ConstantVelocityEstimator {
    pub fn new(convention: MountingConvention, velocity: Vector3, yaw_rate: f64) -> Self {
        Self {
            convention,
            velocity,
            yaw_rate,
            position: Vector3::ZERO,
            heading: 0.0,
            last_timestamp: None,
        }
    }

    /// Stationary estimator: always reports the origin
    pub fn stationary(convention: MountingConvention) -> Self {
        Self::new(convention, Vector3::ZERO, 0.0)
    }
}

impl OdometryEstimator for ConstantVelocityEstimator {
    fn estimate(&mut self, snapshot: &FrameSnapshot) -> RawOdometry {
        let t = snapshot.t_anchor;
        // out-of-order snapshots do not move the estimate backwards
        let dt = self
            .last_timestamp
            .map(|last| (t - last).max(0.0))
            .unwrap_or(0.0);
        self.last_timestamp = Some(self.last_timestamp.map_or(t, |last| last.max(t)));

        self.heading += self.yaw_rate * dt;
        let (sin_h, cos_h) = self.heading.sin_cos();
        // body-frame velocity rotated by heading about y
        let vx = cos_h * self.velocity.x + sin_h * self.velocity.z;
        let vz = -sin_h * self.velocity.x + cos_h * self.velocity.z;
        self.position = Vector3::new(
            self.position.x + vx * dt,
            self.position.y + self.velocity.y * dt,
            self.position.z + vz * dt,
        );

        let orientation = self
            .convention
            .to_output(&EulerAngles::new(0.0, self.heading, 0.0));
        RawOdometry::new(PoseStamped::new(t, self.position, orientation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convention::{to_internal, CAMERA_FRAME};
    use approx::assert_relative_eq;

    fn snapshot(t: f64) -> FrameSnapshot {
        FrameSnapshot {
            anchor: "laser_cloud_less_flat".into(),
            t_anchor: t,
            skew: 0.0,
            packets: Vec::new(),
        }
    }

    #[test]
    fn first_estimate_is_origin() {
        let mut est = ConstantVelocityEstimator::new(CAMERA_FRAME, Vector3::new(0.0, 0.0, 1.0), 0.0);
        let odom = est.estimate(&snapshot(10.0));
        assert_eq!(odom.pose.position, Vector3::ZERO);
        assert_eq!(odom.timestamp(), 10.0);
    }

    #[test]
    fn integrates_velocity() {
        let mut est = ConstantVelocityEstimator::new(CAMERA_FRAME, Vector3::new(0.0, 0.0, 2.0), 0.0);
        est.estimate(&snapshot(0.0));
        est.estimate(&snapshot(0.1));
        let odom = est.estimate(&snapshot(0.2));
        assert_relative_eq!(odom.pose.position.z, 0.4, epsilon = 1e-12);
        assert_relative_eq!(odom.pose.position.x, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn integrates_yaw_rate() {
        let mut est = ConstantVelocityEstimator::new(CAMERA_FRAME, Vector3::ZERO, 0.5);
        est.estimate(&snapshot(0.0));
        let odom = est.estimate(&snapshot(1.0));
        let angles = to_internal(&odom.pose.orientation);
        assert_relative_eq!(angles.ry, 0.5, epsilon = 1e-9);
    }

    #[test]
    fn stale_snapshot_does_not_rewind() {
        let mut est = ConstantVelocityEstimator::new(CAMERA_FRAME, Vector3::new(1.0, 0.0, 0.0), 0.0);
        est.estimate(&snapshot(1.0));
        let ahead = est.estimate(&snapshot(2.0));
        let stale = est.estimate(&snapshot(1.5));
        assert_eq!(ahead.pose.position, stale.pose.position);
    }
}
