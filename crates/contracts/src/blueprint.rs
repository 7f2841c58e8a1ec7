//! FusionBlueprint - Config Loader output
//!
//! Describes the whole fusion layer: declared streams, sync tolerance,
//! driver timing, publication policy and output routing. Built once at
//! startup and handed to each component by reference.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete fusion configuration blueprint
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct FusionBlueprint {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Declared input streams, one gate slot each
    #[serde(default = "default_streams")]
    #[validate(length(min = 1), nested)]
    pub streams: Vec<StreamConfig>,

    /// Synchronization gate settings
    #[serde(default)]
    #[validate(nested)]
    pub sync: SyncConfig,

    /// Driver loop timing
    #[serde(default)]
    #[validate(nested)]
    pub driver: DriverConfig,

    /// Publication policy
    #[serde(default)]
    #[validate(nested)]
    pub publish: PublishConfig,

    /// Frame names (informational)
    #[serde(default)]
    pub frames: FrameNames,

    /// Output topic names (informational)
    #[serde(default)]
    pub topics: TopicNames,

    /// Output routing
    #[serde(default)]
    #[validate(nested)]
    pub sinks: Vec<SinkConfig>,
}

/// One input stream
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StreamConfig {
    /// Unique identifier, used as the gate slot key
    #[validate(length(min = 1))]
    pub id: String,

    /// Upstream topic (informational)
    #[serde(default)]
    pub topic: Option<String>,

    /// Whether this stream is forwarded in the throttled heavy payload
    #[serde(default)]
    pub heavy: bool,
}

impl StreamConfig {
    pub fn new(id: impl Into<String>, heavy: bool) -> Self {
        let id = id.into();
        Self {
            topic: Some(format!("/{id}")),
            id,
            heavy,
        }
    }
}

/// Reference pipeline: four feature clouds, the full-resolution cloud and
/// the IMU motion-correction stream.
pub fn default_streams() -> Vec<StreamConfig> {
    vec![
        StreamConfig::new("laser_cloud_sharp", false),
        StreamConfig::new("laser_cloud_less_sharp", true),
        StreamConfig::new("laser_cloud_flat", false),
        StreamConfig::new("laser_cloud_less_flat", true),
        StreamConfig::new("velodyne_cloud_2", true),
        StreamConfig::new("imu_trans", false),
    ]
}

/// Skew check mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkewCheck {
    /// Max minus min timestamp across all streams
    #[default]
    Pairwise,
    /// Each stream checked against the anchor independently
    Anchor,
}

/// Synchronization gate configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SyncConfig {
    /// Stream whose timestamp stamps every cycle output
    #[serde(default = "default_anchor_stream")]
    #[validate(length(min = 1))]
    pub anchor_stream: String,

    /// Maximum tolerated timestamp skew (seconds)
    #[serde(default = "default_tolerance")]
    #[validate(range(exclusive_min = 0.0))]
    pub tolerance_sec: f64,

    /// How skew is measured
    #[serde(default)]
    pub skew_check: SkewCheck,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            anchor_stream: default_anchor_stream(),
            tolerance_sec: default_tolerance(),
            skew_check: SkewCheck::default(),
        }
    }
}

fn default_anchor_stream() -> String {
    "laser_cloud_less_flat".to_string()
}

fn default_tolerance() -> f64 {
    0.005
}

/// Driver loop configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DriverConfig {
    /// Readiness polling rate (Hz)
    #[serde(default = "default_poll_rate")]
    #[validate(range(exclusive_min = 0.0, max = MAX_POLL_RATE_HZ))]
    pub poll_rate_hz: f64,

    /// Nominal sweep period of the upstream sensor (seconds)
    #[serde(default = "default_scan_period")]
    #[validate(range(exclusive_min = 0.0))]
    pub scan_period_sec: f64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            poll_rate_hz: default_poll_rate(),
            scan_period_sec: default_scan_period(),
        }
    }
}

impl DriverConfig {
    /// Polling interval derived from `poll_rate_hz`, never shorter than 1 µs
    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(1.0 / self.poll_rate_hz).max(MIN_POLL_INTERVAL)
    }
}

/// Highest accepted `driver.poll_rate_hz`
pub const MAX_POLL_RATE_HZ: f64 = 100_000.0;

const MIN_POLL_INTERVAL: std::time::Duration = std::time::Duration::from_micros(1);

fn default_poll_rate() -> f64 {
    100.0
}

fn default_scan_period() -> f64 {
    0.1
}

/// Publication policy
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PublishConfig {
    /// Throttle ratio `k`; heavy payloads go out iff `k < 2 || n % k == 1`
    #[serde(default = "default_io_ratio")]
    #[validate(range(min = 1))]
    pub io_ratio: u32,

    /// Emit a transform broadcast alongside each odometry message
    #[serde(default = "default_true")]
    pub output_transforms: bool,

    /// Diagonal of the 6x6 pose covariance
    #[serde(default = "default_covariance")]
    #[validate(length(equal = 6))]
    pub pose_covariance: Vec<f64>,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            io_ratio: default_io_ratio(),
            output_transforms: true,
            pose_covariance: default_covariance(),
        }
    }
}

fn default_io_ratio() -> u32 {
    2
}

fn default_true() -> bool {
    true
}

fn default_covariance() -> Vec<f64> {
    vec![0.0; 6]
}

/// Frame names
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameNames {
    pub init_frame: String,
    pub odom_frame: String,
    pub lidar_frame: String,
}

impl Default for FrameNames {
    fn default() -> Self {
        Self {
            init_frame: "/camera_init".into(),
            odom_frame: "/laser_odom".into(),
            lidar_frame: "/camera".into(),
        }
    }
}

/// Output topic names
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicNames {
    pub raw_odometry: String,
    pub corrected_odometry: String,
    /// Topic stamped on every heavy payload
    pub heavy: String,
}

impl Default for TopicNames {
    fn default() -> Self {
        Self {
            raw_odometry: "/laser_odom_to_init".into(),
            corrected_odometry: "/integrated_to_init".into(),
            heavy: "/laser_cloud_surround".into(),
        }
    }
}

/// Sink output configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SinkConfig {
    /// Sink name
    #[validate(length(min = 1))]
    pub name: String,

    /// Sink type
    pub sink_type: SinkType,

    /// Queue capacity
    #[serde(default = "default_queue_capacity")]
    #[validate(range(min = 1))]
    pub queue_capacity: usize,

    /// Type-specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

fn default_queue_capacity() -> usize {
    100
}

/// Sink type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// Log output
    Log,
    /// File output
    File,
    /// Network output (UDP)
    Network,
}

impl FusionBlueprint {
    /// Blueprint with the reference streams and default settings
    pub fn reference() -> Self {
        Self {
            version: ConfigVersion::V1,
            streams: default_streams(),
            sync: SyncConfig::default(),
            driver: DriverConfig::default(),
            publish: PublishConfig::default(),
            frames: FrameNames::default(),
            topics: TopicNames::default(),
            sinks: Vec::new(),
        }
    }

    /// Declared stream ids, in declaration order
    pub fn stream_ids(&self) -> impl Iterator<Item = &str> {
        self.streams.iter().map(|s| s.id.as_str())
    }

    /// Ids of the streams carried in the heavy payload
    pub fn heavy_stream_ids(&self) -> Vec<&str> {
        self.streams
            .iter()
            .filter(|s| s.heavy)
            .map(|s| s.id.as_str())
            .collect()
    }

    /// Full row-major 6x6 covariance with the configured diagonal
    pub fn covariance_matrix(&self) -> Vec<f64> {
        let mut matrix = vec![0.0; crate::COVARIANCE_LEN];
        for (i, value) in self.publish.pose_covariance.iter().take(6).enumerate() {
            matrix[i * 7] = *value;
        }
        matrix
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_blueprint_is_valid() {
        let blueprint = FusionBlueprint::reference();
        assert!(blueprint.validate().is_ok());
        assert_eq!(blueprint.streams.len(), 6);
        assert!(blueprint
            .stream_ids()
            .any(|id| id == blueprint.sync.anchor_stream));
    }

    #[test]
    fn heavy_streams_follow_flags() {
        let blueprint = FusionBlueprint::reference();
        assert_eq!(
            blueprint.heavy_stream_ids(),
            vec!["laser_cloud_less_sharp", "laser_cloud_less_flat", "velodyne_cloud_2"]
        );
    }

    #[test]
    fn covariance_fills_the_diagonal() {
        let mut blueprint = FusionBlueprint::reference();
        blueprint.publish.pose_covariance = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let matrix = blueprint.covariance_matrix();
        assert_eq!(matrix.len(), 36);
        for (i, idx) in [0, 7, 14, 21, 28, 35].into_iter().enumerate() {
            assert_eq!(matrix[idx], (i + 1) as f64);
        }
        assert_eq!(matrix.iter().filter(|v| **v != 0.0).count(), 6);
    }

    #[test]
    fn derive_rules_reject_bad_ranges() {
        let mut blueprint = FusionBlueprint::reference();
        blueprint.publish.io_ratio = 0;
        blueprint.driver.poll_rate_hz = 0.0;
        let errors = blueprint.validate().unwrap_err();
        assert!(errors.errors().contains_key("publish"));
        assert!(errors.errors().contains_key("driver"));
        assert!(!errors.errors().contains_key("sync"));
    }

    #[test]
    fn poll_interval_from_rate() {
        let driver = DriverConfig::default();
        assert!((driver.poll_interval().as_secs_f64() - 0.01).abs() < 1e-9);
    }

    #[test]
    fn huge_poll_rate_never_yields_zero_interval() {
        let driver = DriverConfig {
            poll_rate_hz: 1e12,
            ..Default::default()
        };
        assert_eq!(driver.poll_interval(), std::time::Duration::from_micros(1));
    }
}
