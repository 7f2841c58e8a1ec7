//! Correction intake
//!
//! The slow refinement stage delivers correction pairs on its own schedule;
//! this task feeds them into the composer concurrently with the driver loop.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use contracts::CorrectionMessage;
use pose_fusion::PoseComposer;

/// Drain `rx` into `composer` until every sender is dropped.
///
/// Resolves to the number of corrections applied.
pub fn spawn_correction_intake(
    composer: Arc<PoseComposer>,
    mut rx: mpsc::Receiver<CorrectionMessage>,
) -> JoinHandle<u64> {
    tokio::spawn(async move {
        let mut applied = 0u64;
        let mut last_timestamp = f64::NEG_INFINITY;

        while let Some(message) = rx.recv().await {
            if message.timestamp < last_timestamp {
                // still applied: the latest arrival wins
                warn!(
                    timestamp = message.timestamp,
                    previous = last_timestamp,
                    "Correction out of order"
                );
            }
            last_timestamp = last_timestamp.max(message.timestamp);

            composer.on_correction_message(&message);
            applied += 1;
            debug!(timestamp = message.timestamp, applied, "Correction applied");
        }

        info!(applied, "Correction intake closed");
        applied
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{PoseStamped, Quaternion, Twist, Vector3};
    use pose_fusion::CAMERA_FRAME;

    fn message(t: f64, shift: f64) -> CorrectionMessage {
        CorrectionMessage {
            timestamp: t,
            pre: PoseStamped::new(t, Vector3::ZERO, Quaternion::IDENTITY),
            post: PoseStamped::new(t, Vector3::new(shift, 0.0, 0.0), Quaternion::IDENTITY),
            twist: Some(Twist {
                angular: Vector3::ZERO,
                linear: Vector3::new(1.0, 0.0, 0.0),
            }),
        }
    }

    #[tokio::test]
    async fn latest_correction_wins() {
        let composer = Arc::new(PoseComposer::new(CAMERA_FRAME));
        let (tx, rx) = mpsc::channel(8);
        let task = spawn_correction_intake(Arc::clone(&composer), rx);

        tx.send(message(1.0, 0.5)).await.unwrap();
        tx.send(message(2.0, 2.0)).await.unwrap();
        drop(tx);

        assert_eq!(task.await.unwrap(), 2);
        let correction = composer.correction();
        assert_eq!(correction.updates, 2);
        assert_eq!(correction.timestamp, Some(2.0));
        assert!(correction.twist.is_some());

        let raw = PoseStamped::new(3.0, Vector3::ZERO, Quaternion::IDENTITY);
        let out = composer.on_raw_pose(&raw);
        assert!((out.corrected.position.x - 2.0).abs() < 1e-9);
    }
}
