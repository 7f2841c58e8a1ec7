//! Frame snapshots and odometry messages
//!
//! Everything that flows downstream of the synchronization gate.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{PoseStamped, Quaternion, StreamId, StreamPacket, Twist, Vector3};

/// Number of entries in a row-major 6x6 covariance matrix
pub const COVARIANCE_LEN: usize = 36;

/// Snapshot of every stream slot taken by `consume_all`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameSnapshot {
    /// Anchor stream used for the skew check
    pub anchor: StreamId,

    /// Anchor stream timestamp (seconds); stamps everything published for this cycle
    pub t_anchor: f64,

    /// Largest timestamp spread across the snapshot (seconds)
    pub skew: f64,

    /// One packet per declared stream, in declaration order
    pub packets: Vec<StreamPacket>,
}

impl FrameSnapshot {
    /// Packet of a given stream, if present
    pub fn packet(&self, stream_id: &str) -> Option<&StreamPacket> {
        self.packets.iter().find(|p| p.stream_id == stream_id)
    }
}

/// Raw incremental pose estimate from the scan-matching stage.
///
/// Orientation is in the sensor-native convention.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawOdometry {
    pub pose: PoseStamped,
}

impl RawOdometry {
    pub const fn new(pose: PoseStamped) -> Self {
        Self { pose }
    }

    pub fn timestamp(&self) -> f64 {
        self.pose.timestamp
    }
}

/// Pre/post pose pair emitted by the slow-rate correction stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrectionMessage {
    /// Seconds
    pub timestamp: f64,

    /// Pose before the correction stage refined it
    pub pre: PoseStamped,

    /// Refined pose
    pub post: PoseStamped,

    /// Optional velocities, passed through unmodified
    #[serde(default)]
    pub twist: Option<Twist>,
}

/// Odometry output: a pose in the output convention with covariance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OdometryMessage {
    /// Topic the message is published on
    pub topic: String,

    /// Seconds
    pub timestamp: f64,

    /// Parent frame name (informational)
    pub frame_id: String,

    /// Child frame name (informational)
    pub child_frame_id: String,

    pub position: Vector3,

    pub orientation: Quaternion,

    /// Row-major 6x6 covariance; only the diagonal is ever filled
    pub covariance: Vec<f64>,

    /// Velocities from the most recent correction, if any
    #[serde(default)]
    pub twist: Option<Twist>,
}

/// Rigid-transform broadcast mirroring an odometry message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformStamped {
    /// Seconds
    pub timestamp: f64,
    pub parent_frame: String,
    pub child_frame: String,
    pub translation: Vector3,
    pub rotation: Quaternion,
}

/// Heavy per-frame payload, emitted at the throttled rate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeavyPayload {
    pub topic: String,

    /// Anchor timestamp of the cycle that produced it
    pub timestamp: f64,

    /// Frame name the clouds are expressed in
    pub frame_id: String,

    /// Frame counter value of the producing cycle
    pub frame_count: u64,

    /// Packets of the heavy streams
    pub packets: Vec<StreamPacket>,
}

/// Everything one processing cycle produced, before publication policy.
#[derive(Debug, Clone)]
pub struct CycleOutput {
    /// Frame counter after this cycle completed (starts at 1)
    pub frame_count: u64,

    /// Anchor timestamp
    pub timestamp: f64,

    /// Raw estimate, output convention
    pub raw: PoseStamped,

    /// Corrected estimate, output convention
    pub corrected: PoseStamped,

    /// Velocities carried by the last correction
    pub twist: Option<Twist>,

    /// Packets eligible for heavy publication
    pub heavy_packets: Vec<StreamPacket>,
}

/// A single item handed to sinks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Publication {
    Odometry(OdometryMessage),
    Transform(TransformStamped),
    Heavy(HeavyPayload),
}

impl Publication {
    /// Timestamp of the published item
    pub fn timestamp(&self) -> f64 {
        match self {
            Publication::Odometry(m) => m.timestamp,
            Publication::Transform(t) => t.timestamp,
            Publication::Heavy(h) => h.timestamp,
        }
    }

    /// Short label used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Publication::Odometry(_) => "odometry",
            Publication::Transform(_) => "transform",
            Publication::Heavy(_) => "heavy",
        }
    }
}

/// Gate slot status (for diagnostics)
#[derive(Debug, Clone, Default)]
pub struct GateStats {
    /// Streams holding an unconsumed sample
    pub pending: Vec<StreamId>,

    /// Arrivals per stream since start
    pub arrivals: HashMap<StreamId, u64>,

    /// Samples lost to overwrite-on-arrival per stream
    pub overwritten: HashMap<StreamId, u64>,

    /// Oldest timestamp held in any slot
    pub oldest_timestamp: Option<f64>,

    /// Newest timestamp held in any slot
    pub newest_timestamp: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PointCloudData, StreamPayload};

    #[test]
    fn snapshot_lookup_by_stream() {
        let snapshot = FrameSnapshot {
            anchor: "flat".into(),
            t_anchor: 1.0,
            skew: 0.0,
            packets: vec![
                StreamPacket::new("sharp", 1.0, StreamPayload::PointCloud(PointCloudData::empty())),
                StreamPacket::new("flat", 1.0, StreamPayload::PointCloud(PointCloudData::empty())),
            ],
        };
        assert!(snapshot.packet("sharp").is_some());
        assert!(snapshot.packet("full").is_none());
    }

    #[test]
    fn publication_is_tagged_by_kind() {
        let publication = Publication::Transform(TransformStamped {
            timestamp: 2.0,
            parent_frame: "/camera_init".into(),
            child_frame: "/camera".into(),
            translation: Vector3::ZERO,
            rotation: Quaternion::IDENTITY,
        });
        let json = serde_json::to_value(&publication).unwrap();
        assert_eq!(json["kind"], "transform");
        assert_eq!(publication.kind(), "transform");
        assert_eq!(publication.timestamp(), 2.0);
    }
}
