//! One processing cycle: estimate, compose, publish.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, instrument};

use contracts::{
    CycleOutput, FrameSnapshot, FusionBlueprint, PoseStamped, Publication, RawOdometry, StreamId,
};
use dispatcher::{PublishSummary, Publisher, PublisherConfig};
use pose_fusion::{ComposedPose, OdometryEstimator, PoseComposer};

use crate::error::DriverError;

/// What a completed cycle produced
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleReport {
    pub frame_count: u64,
    /// Anchor timestamp stamped on every publication of the cycle
    pub timestamp: f64,
    pub skew: f64,
    pub summary: PublishSummary,
}

/// Owns the frame counter and everything downstream of the gate.
pub struct FusionCycle {
    estimator: Box<dyn OdometryEstimator>,
    composer: Arc<PoseComposer>,
    publisher: Publisher,
    heavy_streams: Vec<StreamId>,
    frame_count: u64,
}

impl FusionCycle {
    pub fn new(
        estimator: Box<dyn OdometryEstimator>,
        composer: Arc<PoseComposer>,
        publisher: Publisher,
        heavy_streams: Vec<StreamId>,
    ) -> Self {
        Self {
            estimator,
            composer,
            publisher,
            heavy_streams,
            frame_count: 0,
        }
    }

    /// Wire a cycle from the blueprint, publishing into `tx`.
    pub fn from_blueprint(
        blueprint: &FusionBlueprint,
        estimator: Box<dyn OdometryEstimator>,
        composer: Arc<PoseComposer>,
        tx: mpsc::Sender<Publication>,
    ) -> Result<Self, DriverError> {
        let publisher = Publisher::new(PublisherConfig::from_blueprint(blueprint)?, tx);
        let heavy_streams = blueprint
            .heavy_stream_ids()
            .into_iter()
            .map(StreamId::from)
            .collect();
        Ok(Self::new(estimator, composer, publisher, heavy_streams))
    }

    /// Completed cycles so far
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn composer(&self) -> &Arc<PoseComposer> {
        &self.composer
    }

    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    /// Run one cycle over a consumed snapshot.
    #[instrument(
        level = "debug",
        name = "fusion_cycle",
        skip_all,
        fields(t_anchor = snapshot.t_anchor, frame = self.frame_count + 1)
    )]
    pub fn process(&mut self, snapshot: FrameSnapshot) -> CycleReport {
        let started = Instant::now();
        self.frame_count += 1;
        let timestamp = snapshot.t_anchor;

        let estimate = self.estimator.estimate(&snapshot);
        // everything of this cycle carries the anchor timestamp
        let raw = PoseStamped::new(
            timestamp,
            estimate.pose.position,
            estimate.pose.orientation,
        );
        let ComposedPose {
            raw,
            corrected,
            twist,
        } = self.composer.on_raw_pose(&raw);

        let heavy_packets = if self
            .publisher
            .config()
            .throttle
            .should_emit_heavy(self.frame_count)
        {
            snapshot
                .packets
                .into_iter()
                .filter(|p| self.heavy_streams.contains(&p.stream_id))
                .collect()
        } else {
            Vec::new()
        };

        let output = CycleOutput {
            frame_count: self.frame_count,
            timestamp,
            raw,
            corrected,
            twist,
            heavy_packets,
        };
        let summary = self.publisher.publish(&output);

        metrics::counter!("driver_cycles_total").increment(1);
        metrics::histogram!("driver_cycle_duration_seconds").record(started.elapsed().as_secs_f64());
        if summary.heavy {
            metrics::counter!("driver_heavy_publications_total").increment(1);
        }
        debug!(
            frame = self.frame_count,
            heavy = summary.heavy,
            dropped = summary.dropped,
            "Cycle complete"
        );

        CycleReport {
            frame_count: self.frame_count,
            timestamp,
            skew: snapshot.skew,
            summary,
        }
    }

    /// Correct and publish a raw pose delivered outside the gated cycle.
    ///
    /// Does not advance the frame counter and never carries heavy payloads.
    pub fn on_raw_odometry(&self, raw: &RawOdometry) -> PublishSummary {
        let composed = self.composer.on_raw_pose(&raw.pose);
        self.publisher
            .publish_corrected(&composed.corrected, composed.twist)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use contracts::{Quaternion, StreamPacket, StreamPayload, Vector3};
    use pose_fusion::{ConstantVelocityEstimator, CAMERA_FRAME};

    fn snapshot(t: f64, blueprint: &FusionBlueprint) -> FrameSnapshot {
        FrameSnapshot {
            anchor: blueprint.sync.anchor_stream.as_str().into(),
            t_anchor: t,
            skew: 0.001,
            packets: blueprint
                .stream_ids()
                .map(|id| StreamPacket::new(id, t, StreamPayload::Raw(Bytes::from_static(b"x"))))
                .collect(),
        }
    }

    fn cycle(io_ratio: u32) -> (FusionCycle, mpsc::Receiver<Publication>, FusionBlueprint) {
        let mut blueprint = FusionBlueprint::reference();
        blueprint.publish.io_ratio = io_ratio;
        let (tx, rx) = mpsc::channel(64);
        let cycle = FusionCycle::from_blueprint(
            &blueprint,
            Box::new(ConstantVelocityEstimator::stationary(CAMERA_FRAME)),
            Arc::new(PoseComposer::new(CAMERA_FRAME)),
            tx,
        )
        .unwrap();
        (cycle, rx, blueprint)
    }

    fn drain(rx: &mut mpsc::Receiver<Publication>) -> Vec<Publication> {
        std::iter::from_fn(|| rx.try_recv().ok()).collect()
    }

    #[test]
    fn frame_counter_drives_heavy_phase() {
        let (mut cycle, mut rx, blueprint) = cycle(3);
        let mut heavy_on = Vec::new();
        for i in 0..7 {
            let report = cycle.process(snapshot(10.0 + i as f64 * 0.1, &blueprint));
            if report.summary.heavy {
                heavy_on.push(report.frame_count);
            }
        }
        assert_eq!(heavy_on, vec![1, 4, 7]);
        assert_eq!(cycle.frame_count(), 7);

        let heavy: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter_map(|p| match p {
                Publication::Heavy(h) => Some(h),
                _ => None,
            })
            .collect();
        assert_eq!(heavy.len(), 3);
        // only the streams flagged heavy travel in the payload
        assert_eq!(heavy[0].packets.len(), blueprint.heavy_stream_ids().len());
    }

    #[test]
    fn publications_carry_anchor_timestamp() {
        let (mut cycle, mut rx, blueprint) = cycle(1);
        let report = cycle.process(snapshot(42.5, &blueprint));
        assert_eq!(report.timestamp, 42.5);

        let pubs = drain(&mut rx);
        assert_eq!(pubs.len(), 5);
        assert!(pubs.iter().all(|p| p.timestamp() == 42.5));
    }

    #[test]
    fn correction_shifts_corrected_odometry() {
        let (mut cycle, mut rx, blueprint) = cycle(2);
        let pre = PoseStamped::new(1.0, Vector3::ZERO, Quaternion::IDENTITY);
        let post = PoseStamped::new(1.0, Vector3::new(0.0, 1.0, 0.0), Quaternion::IDENTITY);
        cycle.composer().on_correction(&pre, &post);

        cycle.process(snapshot(2.0, &blueprint));
        let corrected = drain(&mut rx)
            .into_iter()
            .find_map(|p| match p {
                Publication::Odometry(m) if m.topic == blueprint.topics.corrected_odometry => {
                    Some(m)
                }
                _ => None,
            })
            .unwrap();
        assert!((corrected.position.y - 1.0).abs() < 1e-9);
    }

    #[test]
    fn raw_odometry_side_path_keeps_counter() {
        let (cycle, mut rx, _) = cycle(2);
        let raw = RawOdometry::new(PoseStamped::new(
            3.0,
            Vector3::new(1.0, 0.0, 0.0),
            Quaternion::IDENTITY,
        ));
        let summary = cycle.on_raw_odometry(&raw);
        assert_eq!(summary.odometry, 1);
        assert_eq!(summary.transforms, 1);
        assert_eq!(cycle.frame_count(), 0);
        assert!(drain(&mut rx).iter().all(|p| !matches!(p, Publication::Heavy(_))));
    }
}
