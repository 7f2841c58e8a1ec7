//! Publisher - turns cycle outputs into publications
//!
//! Odometry (and the optional transform broadcast) goes out every cycle;
//! the heavy payload only when the throttle policy allows it. Hand-off to
//! the dispatcher never blocks: a full queue drops the publication.

use tokio::sync::mpsc;
use tracing::{instrument, trace, warn};

use contracts::{
    CycleOutput, FrameNames, FusionBlueprint, HeavyPayload, OdometryMessage, PoseStamped,
    Publication, TopicNames, TransformStamped, Twist,
};

use crate::error::DispatcherError;
use crate::throttle::ThrottlePolicy;

/// Publisher settings, read once from the blueprint
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    pub topics: TopicNames,
    pub frames: FrameNames,
    /// Row-major 6x6 covariance attached to corrected odometry
    pub covariance: Vec<f64>,
    pub output_transforms: bool,
    pub throttle: ThrottlePolicy,
}

impl PublisherConfig {
    pub fn from_blueprint(blueprint: &FusionBlueprint) -> Result<Self, DispatcherError> {
        Ok(Self {
            topics: blueprint.topics.clone(),
            frames: blueprint.frames.clone(),
            covariance: blueprint.covariance_matrix(),
            output_transforms: blueprint.publish.output_transforms,
            throttle: ThrottlePolicy::new(blueprint.publish.io_ratio)?,
        })
    }
}

/// What one `publish` call handed to the dispatcher
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishSummary {
    pub odometry: usize,
    pub transforms: usize,
    pub heavy: bool,
    /// Publications lost to a full queue
    pub dropped: usize,
}

#[derive(Debug)]
pub struct Publisher {
    config: PublisherConfig,
    tx: mpsc::Sender<Publication>,
}

impl Publisher {
    pub fn new(config: PublisherConfig, tx: mpsc::Sender<Publication>) -> Self {
        Self { config, tx }
    }

    pub fn config(&self) -> &PublisherConfig {
        &self.config
    }

    /// Build and send everything one cycle produces.
    #[instrument(
        level = "debug",
        name = "publisher_publish",
        skip(self, output),
        fields(frame_count = output.frame_count, timestamp = output.timestamp)
    )]
    pub fn publish(&self, output: &CycleOutput) -> PublishSummary {
        let publications = self.build(output);
        self.send_all(publications)
    }

    /// Corrected odometry only, for raw poses fed outside a cycle.
    pub fn publish_corrected(&self, corrected: &PoseStamped, twist: Option<Twist>) -> PublishSummary {
        let mut publications = Vec::with_capacity(2);
        self.push_corrected(&mut publications, corrected, twist);
        self.send_all(publications)
    }

    /// Publications for one cycle, in emission order:
    /// raw odometry, its transform, corrected odometry, its transform,
    /// then the heavy payload when due.
    pub fn build(&self, output: &CycleOutput) -> Vec<Publication> {
        let mut publications = Vec::with_capacity(5);
        let frames = &self.config.frames;

        publications.push(Publication::Odometry(OdometryMessage {
            topic: self.config.topics.raw_odometry.clone(),
            timestamp: output.timestamp,
            frame_id: frames.init_frame.clone(),
            child_frame_id: frames.odom_frame.clone(),
            position: output.raw.position,
            orientation: output.raw.orientation,
            covariance: vec![0.0; contracts::COVARIANCE_LEN],
            twist: None,
        }));
        if self.config.output_transforms {
            publications.push(Publication::Transform(TransformStamped {
                timestamp: output.timestamp,
                parent_frame: frames.init_frame.clone(),
                child_frame: frames.odom_frame.clone(),
                translation: output.raw.position,
                rotation: output.raw.orientation,
            }));
        }

        let corrected = PoseStamped::new(
            output.timestamp,
            output.corrected.position,
            output.corrected.orientation,
        );
        self.push_corrected(&mut publications, &corrected, output.twist);

        if self.config.throttle.should_emit_heavy(output.frame_count) {
            publications.push(Publication::Heavy(HeavyPayload {
                topic: self.config.topics.heavy.clone(),
                timestamp: output.timestamp,
                frame_id: frames.lidar_frame.clone(),
                frame_count: output.frame_count,
                packets: output.heavy_packets.clone(),
            }));
        }

        publications
    }

    fn push_corrected(
        &self,
        publications: &mut Vec<Publication>,
        corrected: &PoseStamped,
        twist: Option<Twist>,
    ) {
        let frames = &self.config.frames;
        publications.push(Publication::Odometry(OdometryMessage {
            topic: self.config.topics.corrected_odometry.clone(),
            timestamp: corrected.timestamp,
            frame_id: frames.init_frame.clone(),
            child_frame_id: frames.lidar_frame.clone(),
            position: corrected.position,
            orientation: corrected.orientation,
            covariance: self.config.covariance.clone(),
            twist,
        }));
        if self.config.output_transforms {
            publications.push(Publication::Transform(TransformStamped {
                timestamp: corrected.timestamp,
                parent_frame: frames.init_frame.clone(),
                child_frame: frames.lidar_frame.clone(),
                translation: corrected.position,
                rotation: corrected.orientation,
            }));
        }
    }

    fn send_all(&self, publications: Vec<Publication>) -> PublishSummary {
        let mut summary = PublishSummary::default();
        for publication in publications {
            let kind = publication.kind();
            match self.tx.try_send(publication) {
                Ok(()) => {
                    match kind {
                        "odometry" => summary.odometry += 1,
                        "transform" => summary.transforms += 1,
                        _ => summary.heavy = true,
                    }
                    metrics::counter!("publisher_sent_total", "kind" => kind).increment(1);
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    summary.dropped += 1;
                    metrics::counter!("publisher_dropped_total", "kind" => kind).increment(1);
                    warn!(
                        error = %DispatcherError::QueueFull { queue: "dispatcher".into(), kind },
                        "Publication dropped"
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    summary.dropped += 1;
                    trace!(kind, "Dispatcher closed, publication discarded");
                }
            }
        }
        summary
    }
}
