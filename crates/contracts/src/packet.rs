//! StreamPacket - what an upstream stage deposits into the gate
//!
//! Payloads are opaque to the fusion layer; only the timestamp takes part in
//! synchronization.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::StreamId;

/// One timestamped sample of one stream.
///
/// Identity is `(stream_id, timestamp)`. Samples of one stream are consumed
/// in arrival order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamPacket {
    /// Stream this sample belongs to
    pub stream_id: StreamId,

    /// Source timestamp (seconds, monotonic per source)
    pub timestamp: f64,

    /// Opaque payload
    pub payload: StreamPayload,
}

impl StreamPacket {
    pub fn new(stream_id: impl Into<StreamId>, timestamp: f64, payload: StreamPayload) -> Self {
        Self {
            stream_id: stream_id.into(),
            timestamp,
            payload,
        }
    }

    /// Approximate payload size, used for heavy-payload accounting.
    pub fn payload_len(&self) -> usize {
        match &self.payload {
            StreamPayload::PointCloud(cloud) => cloud.data.len(),
            StreamPayload::MotionCorrection(_) => std::mem::size_of::<MotionCorrectionData>(),
            StreamPayload::Raw(bytes) => bytes.len(),
        }
    }
}

/// Stream payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StreamPayload {
    /// Feature or full-resolution point cloud
    PointCloud(PointCloudData),

    /// Auxiliary motion-correction sample of a sweep
    MotionCorrection(MotionCorrectionData),

    /// Anything else
    Raw(Bytes),
}

/// Packed point cloud
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointCloudData {
    /// Number of points
    pub num_points: u32,

    /// Bytes per point (16 for x, y, z, intensity as f32)
    pub point_stride: u32,

    /// Packed point data
    pub data: Bytes,
}

impl PointCloudData {
    /// Empty cloud with the usual xyz+intensity stride
    pub fn empty() -> Self {
        Self {
            num_points: 0,
            point_stride: 16,
            data: Bytes::new(),
        }
    }
}

/// IMU state at sweep start/end, carried alongside the feature clouds.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MotionCorrectionData {
    /// Orientation (pitch, yaw, roll) at sweep start
    pub start_orientation: Vector3,

    /// Orientation (pitch, yaw, roll) at sweep end
    pub end_orientation: Vector3,

    /// Accumulated position shift from start to end
    pub shift_from_start: Vector3,

    /// Velocity change from start to end
    pub velocity_from_start: Vector3,
}

/// 3D vector
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    #[inline]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}
