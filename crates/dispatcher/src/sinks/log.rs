//! LogSink - one tracing event per publication

use contracts::{ContractError, DataSink, Publication};
use tracing::{debug, info, instrument};

pub struct LogSink {
    name: String,
}

impl LogSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn log_publication(&self, publication: &Publication) {
        match publication {
            Publication::Odometry(odom) => info!(
                sink = %self.name,
                topic = %odom.topic,
                t = odom.timestamp,
                x = odom.position.x,
                y = odom.position.y,
                z = odom.position.z,
                "Odometry"
            ),
            Publication::Transform(tf) => debug!(
                sink = %self.name,
                parent = %tf.parent_frame,
                child = %tf.child_frame,
                t = tf.timestamp,
                "Transform"
            ),
            Publication::Heavy(heavy) => info!(
                sink = %self.name,
                topic = %heavy.topic,
                frame_count = heavy.frame_count,
                t = heavy.timestamp,
                packets = heavy.packets.len(),
                bytes = heavy.packets.iter().map(|p| p.payload_len()).sum::<usize>(),
                "Heavy payload"
            ),
        }
    }
}

impl DataSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_write",
        skip(self, publication),
        fields(sink = %self.name, kind = publication.kind())
    )]
    async fn write(&mut self, publication: &Publication) -> Result<(), ContractError> {
        self.log_publication(publication);
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(sink = %self.name, "LogSink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{HeavyPayload, OdometryMessage, Quaternion, Vector3};

    #[tokio::test]
    async fn writes_every_kind() {
        let mut sink = LogSink::new("test_log");
        let odom = Publication::Odometry(OdometryMessage {
            topic: "/integrated_to_init".into(),
            timestamp: 1.0,
            frame_id: "/camera_init".into(),
            child_frame_id: "/camera".into(),
            position: Vector3::ZERO,
            orientation: Quaternion::IDENTITY,
            covariance: vec![0.0; 36],
            twist: None,
        });
        let heavy = Publication::Heavy(HeavyPayload {
            topic: "/laser_cloud_surround".into(),
            timestamp: 1.0,
            frame_id: "/camera".into(),
            frame_count: 1,
            packets: Vec::new(),
        });

        assert!(sink.write(&odom).await.is_ok());
        assert!(sink.write(&heavy).await.is_ok());
        assert_eq!(sink.name(), "test_log");
    }
}
