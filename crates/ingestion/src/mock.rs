//! Mock producers
//!
//! Stand-ins for the upstream feature-extraction and refinement stages, for
//! running without them. Each source runs on its own thread and pushes
//! through the registered callback, like a real subscriber would.
//!
//! Timestamps come from a simulated scan clock, not the wall clock, so a
//! run is reproducible: sample `n` of a stream is stamped
//! `start_time + n * period + offset + jitter(n)`, with jitter drawn from a
//! per-stream seeded RNG.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, error, trace};

use contracts::{
    CorrectionCallback, CorrectionMessage, CorrectionSource, FusionBlueprint,
    MotionCorrectionData, PointCloudData, PoseStamped, Quaternion, StreamDataCallback,
    StreamPacket, StreamPayload, StreamSource, Twist, Vector3,
};

use crate::error::{IngestionError, Result};

/// Spacing between consecutive streams' offsets in [`MockStreamSource::reference_set`]
pub const REFERENCE_OFFSET_STEP: f64 = 0.0007;

/// What a mock stream carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockPayload {
    /// Zero-filled cloud of `points` xyz+intensity points
    PointCloud { points: u32 },
    /// Synthetic IMU sweep correction
    MotionCorrection,
    /// Empty raw payload
    Empty,
}

#[derive(Debug, Clone)]
pub struct MockStreamConfig {
    pub stream_id: String,
    /// Samples per simulated second
    pub rate_hz: f64,
    /// Fixed offset from the scan start (seconds)
    pub offset_sec: f64,
    /// Uniform jitter amplitude (seconds), 0 for none
    pub jitter_sec: f64,
    pub payload: MockPayload,
    /// Simulated time of sample 0
    pub start_time: f64,
    /// Simulated seconds per wall second
    pub speed: f64,
    /// Stop after this many samples
    pub max_samples: Option<u64>,
    pub seed: u64,
}

impl MockStreamConfig {
    pub fn new(stream_id: impl Into<String>, rate_hz: f64) -> Self {
        Self {
            stream_id: stream_id.into(),
            rate_hz,
            offset_sec: 0.0,
            jitter_sec: 0.0,
            payload: MockPayload::Empty,
            start_time: 0.0,
            speed: 1.0,
            max_samples: None,
            seed: 0,
        }
    }

    fn validate(&self) -> Result<()> {
        let check = |field: &'static str, ok: bool, value: f64| {
            if ok {
                Ok(())
            } else {
                Err(IngestionError::InvalidMock {
                    stream_id: self.stream_id.clone(),
                    field,
                    value,
                })
            }
        };
        check("rate_hz", self.rate_hz > 0.0 && self.rate_hz.is_finite(), self.rate_hz)?;
        check("speed", self.speed > 0.0, self.speed)?;
        check(
            "jitter_sec",
            self.jitter_sec >= 0.0 && self.jitter_sec.is_finite(),
            self.jitter_sec,
        )
    }
}

/// Shared run flag plus sample counter
#[derive(Debug, Default)]
struct RunState {
    listening: AtomicBool,
    emitted: AtomicU64,
}

/// One mock feature stream
pub struct MockStreamSource {
    config: MockStreamConfig,
    state: Arc<RunState>,
}

impl MockStreamSource {
    pub fn new(config: MockStreamConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            state: Arc::new(RunState::default()),
        })
    }

    /// One source per declared stream, at the scan rate, with offsets
    /// `i * REFERENCE_OFFSET_STEP` in declaration order.
    ///
    /// Heavy streams carry a point cloud; `imu_trans` carries motion
    /// correction data.
    pub fn reference_set(blueprint: &FusionBlueprint, speed: f64) -> Result<Vec<Self>> {
        let rate_hz = 1.0 / blueprint.driver.scan_period_sec;
        blueprint
            .streams
            .iter()
            .enumerate()
            .map(|(i, stream)| {
                let payload = if stream.id == "imu_trans" {
                    MockPayload::MotionCorrection
                } else if stream.heavy {
                    MockPayload::PointCloud { points: 1024 }
                } else {
                    MockPayload::PointCloud { points: 64 }
                };
                Self::new(MockStreamConfig {
                    offset_sec: i as f64 * REFERENCE_OFFSET_STEP,
                    payload,
                    speed,
                    seed: i as u64 + 1,
                    ..MockStreamConfig::new(stream.id.clone(), rate_hz)
                })
            })
            .collect()
    }

    pub fn config(&self) -> &MockStreamConfig {
        &self.config
    }

    /// Samples pushed so far
    pub fn emitted(&self) -> u64 {
        self.state.emitted.load(Ordering::Relaxed)
    }

    /// Timestamp of sample `n`, without jitter
    pub fn nominal_timestamp(&self, n: u64) -> f64 {
        self.config.start_time + n as f64 / self.config.rate_hz + self.config.offset_sec
    }

    fn sample(config: &MockStreamConfig, n: u64, rng: &mut StdRng) -> StreamPacket {
        let jitter = if config.jitter_sec > 0.0 {
            rng.random_range(-config.jitter_sec..=config.jitter_sec)
        } else {
            0.0
        };
        let timestamp = config.start_time + n as f64 / config.rate_hz + config.offset_sec + jitter;

        let payload = match config.payload {
            MockPayload::PointCloud { points } => StreamPayload::PointCloud(PointCloudData {
                num_points: points,
                point_stride: 16,
                data: Bytes::from(vec![0u8; points as usize * 16]),
            }),
            MockPayload::MotionCorrection => {
                let t = n as f64 / config.rate_hz;
                StreamPayload::MotionCorrection(MotionCorrectionData {
                    start_orientation: Vector3::new(0.0, 0.01 * t, 0.0),
                    end_orientation: Vector3::new(0.0, 0.01 * (t + 1.0 / config.rate_hz), 0.0),
                    shift_from_start: Vector3::new(0.0, 0.0, 0.1 / config.rate_hz),
                    velocity_from_start: Vector3::ZERO,
                })
            }
            MockPayload::Empty => StreamPayload::Raw(Bytes::new()),
        };

        StreamPacket::new(config.stream_id.as_str(), timestamp, payload)
    }
}

impl StreamSource for MockStreamSource {
    fn stream_id(&self) -> &str {
        &self.config.stream_id
    }

    fn listen(&self, callback: StreamDataCallback) {
        if self.state.listening.swap(true, Ordering::SeqCst) {
            return;
        }

        let config = self.config.clone();
        let state = Arc::clone(&self.state);
        let spawned = std::thread::Builder::new()
            .name(format!("mock-{}", config.stream_id))
            .spawn(move || {
                let mut rng = StdRng::seed_from_u64(config.seed);
                let pause = Duration::from_secs_f64(1.0 / config.rate_hz / config.speed);
                let mut n = 0u64;
                debug!(stream_id = %config.stream_id, rate_hz = config.rate_hz, "mock stream started");

                while state.listening.load(Ordering::Relaxed)
                    && config.max_samples.is_none_or(|max| n < max)
                {
                    let packet = Self::sample(&config, n, &mut rng);
                    trace!(stream_id = %config.stream_id, timestamp = packet.timestamp, "mock sample");
                    callback(packet);
                    n += 1;
                    state.emitted.store(n, Ordering::Relaxed);
                    std::thread::sleep(pause);
                }

                state.listening.store(false, Ordering::SeqCst);
                debug!(stream_id = %config.stream_id, samples = n, "mock stream stopped");
            });

        if let Err(e) = spawned {
            error!(stream_id = %self.config.stream_id, error = %e, "failed to spawn mock stream");
            self.state.listening.store(false, Ordering::SeqCst);
        }
    }

    fn stop(&self) {
        self.state.listening.store(false, Ordering::SeqCst);
    }

    fn is_listening(&self) -> bool {
        self.state.listening.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone)]
pub struct MockCorrectionConfig {
    /// Corrections per simulated second
    pub rate_hz: f64,
    /// Forward velocity of the simulated platform (internal z, m/s)
    pub velocity: f64,
    /// Translation drift the correction removes, per simulated second
    pub drift_per_sec: Vector3,
    pub start_time: f64,
    pub speed: f64,
    pub max_messages: Option<u64>,
}

impl Default for MockCorrectionConfig {
    fn default() -> Self {
        Self {
            rate_hz: 1.0,
            velocity: 1.0,
            drift_per_sec: Vector3::new(0.0, 0.01, 0.0),
            start_time: 0.0,
            speed: 1.0,
            max_messages: None,
        }
    }
}

/// Mock slow-rate refinement stage.
///
/// Message `n` pairs the drifted pose at `t_n` with the pose shifted back by
/// the accumulated drift.
pub struct MockCorrectionSource {
    config: MockCorrectionConfig,
    state: Arc<RunState>,
}

impl MockCorrectionSource {
    pub fn new(config: MockCorrectionConfig) -> Result<Self> {
        if !(config.rate_hz > 0.0 && config.rate_hz.is_finite()) {
            return Err(IngestionError::InvalidMock {
                stream_id: "corrections".into(),
                field: "rate_hz",
                value: config.rate_hz,
            });
        }
        if config.speed <= 0.0 {
            return Err(IngestionError::InvalidMock {
                stream_id: "corrections".into(),
                field: "speed",
                value: config.speed,
            });
        }
        Ok(Self {
            config,
            state: Arc::new(RunState::default()),
        })
    }

    pub fn emitted(&self) -> u64 {
        self.state.emitted.load(Ordering::Relaxed)
    }

    /// Correction message `n`
    pub fn message(config: &MockCorrectionConfig, n: u64) -> CorrectionMessage {
        let elapsed = n as f64 / config.rate_hz;
        let t = config.start_time + elapsed;
        let drift = config.drift_per_sec;
        let pre_position = Vector3::new(
            drift.x * elapsed,
            drift.y * elapsed,
            config.velocity * elapsed + drift.z * elapsed,
        );
        let post_position = Vector3::new(0.0, 0.0, config.velocity * elapsed);

        CorrectionMessage {
            timestamp: t,
            pre: PoseStamped::new(t, pre_position, Quaternion::IDENTITY),
            post: PoseStamped::new(t, post_position, Quaternion::IDENTITY),
            twist: Some(Twist {
                angular: Vector3::ZERO,
                linear: Vector3::new(0.0, 0.0, config.velocity),
            }),
        }
    }
}

impl CorrectionSource for MockCorrectionSource {
    fn listen(&self, callback: CorrectionCallback) {
        if self.state.listening.swap(true, Ordering::SeqCst) {
            return;
        }

        let config = self.config.clone();
        let state = Arc::clone(&self.state);
        let spawned = std::thread::Builder::new()
            .name("mock-corrections".into())
            .spawn(move || {
                let pause = Duration::from_secs_f64(1.0 / config.rate_hz / config.speed);
                let mut n = 0u64;
                while state.listening.load(Ordering::Relaxed)
                    && config.max_messages.is_none_or(|max| n < max)
                {
                    callback(Self::message(&config, n));
                    n += 1;
                    state.emitted.store(n, Ordering::Relaxed);
                    std::thread::sleep(pause);
                }
                state.listening.store(false, Ordering::SeqCst);
                debug!(messages = n, "mock corrections stopped");
            });

        if let Err(e) = spawned {
            error!(error = %e, "failed to spawn mock correction source");
            self.state.listening.store(false, Ordering::SeqCst);
        }
    }

    fn stop(&self) {
        self.state.listening.store(false, Ordering::SeqCst);
    }

    fn is_listening(&self) -> bool {
        self.state.listening.load(Ordering::Relaxed)
    }
}
