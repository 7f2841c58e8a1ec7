//! Pipeline orchestrator - wires producers, gate, driver and sinks.
//!
//! ```text
//! mock streams ──► SharedGate ◄──poll── DriverLoop ──► Publisher ──► Dispatcher ──► sinks
//! mock corrections ──► intake ──► PoseComposer ◄────────┘
//! ```

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use contracts::{FrameSnapshot, FusionBlueprint, StreamPacket, Vector3};
use driver::{spawn_correction_intake, DriverLoop, FusionCycle, LoopConfig};
use ingestion::{IngestionPipeline, MockCorrectionConfig, MockCorrectionSource, MockStreamSource};
use observability::{record_gate_stats, record_snapshot, FusionMetricsAggregator};
use pose_fusion::{ConstantVelocityEstimator, PoseComposer, CAMERA_FRAME};
use sync_engine::{SharedGate, SyncGate};

use super::PipelineStats;
use crate::error::CliError;

/// How long sinks get to drain after the loop stops
const DISPATCHER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);
const INTAKE_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub blueprint: FusionBlueprint,
    pub max_cycles: Option<u64>,
    pub timeout: Option<Duration>,
    /// Capacity of the publication and correction queues
    pub buffer_size: usize,
    pub metrics_port: Option<u16>,
    /// None disables the mock refinement stage
    pub correction_rate_hz: Option<f64>,
    /// Simulated seconds per wall second
    pub speed: f64,
}

pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run until `shutdown` resolves, the timeout elapses or `max_cycles`
    /// cycles complete, then drain the sinks.
    pub async fn run(self, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<PipelineStats> {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let gate = SharedGate::new(
            SyncGate::from_blueprint(blueprint).map_err(|e| CliError::pipeline_setup("gate", e))?,
        );

        // Ingestion
        let mut ingestion = IngestionPipeline::for_blueprint(blueprint);
        for source in MockStreamSource::reference_set(blueprint, self.config.speed)
            .context("Failed to build mock streams")?
        {
            ingestion.register_stream_source(Box::new(source))?;
        }
        let correction_config = MockCorrectionConfig {
            rate_hz: self.config.correction_rate_hz.unwrap_or(1.0),
            speed: self.config.speed,
            ..Default::default()
        };
        if self.config.correction_rate_hz.is_some() {
            ingestion.register_correction_source(Box::new(
                MockCorrectionSource::new(correction_config.clone())
                    .context("Failed to build mock correction source")?,
            ));
        }
        info!(
            streams = ingestion.stream_count(),
            corrections = ingestion.correction_source_count(),
            "Ingestion pipeline configured"
        );

        // Dispatcher
        let (publication_tx, publication_rx) = mpsc::channel(self.config.buffer_size);
        if blueprint.sinks.is_empty() {
            warn!("No sinks configured - publications will be dropped");
        }
        let dispatcher = dispatcher::create_dispatcher(blueprint.sinks.clone(), publication_rx)
            .await
            .context("Failed to create dispatcher")?;
        let active_sinks = dispatcher.sink_count();
        let dispatcher_handle = dispatcher.spawn();
        info!(active_sinks, "Dispatcher started");

        // Composer and correction intake
        let composer = Arc::new(PoseComposer::new(CAMERA_FRAME));
        let (correction_tx, correction_rx) = mpsc::channel(self.config.buffer_size);
        let intake = spawn_correction_intake(Arc::clone(&composer), correction_rx);

        // Driver. The mock estimator moves at the velocity the mock
        // corrections assume, so the offset stays a pure drift removal.
        let estimator = ConstantVelocityEstimator::new(
            CAMERA_FRAME,
            Vector3::new(0.0, 0.0, correction_config.velocity),
            0.0,
        );
        let cycle = FusionCycle::from_blueprint(blueprint, Box::new(estimator), composer, publication_tx)
            .map_err(|e| CliError::pipeline_setup("publisher", e))?;
        let loop_config = LoopConfig::from_blueprint(blueprint)
            .map_err(|e| CliError::pipeline_setup("driver", e))?
            .with_max_cycles(self.config.max_cycles);

        let aggregator = Arc::new(Mutex::new(FusionMetricsAggregator::new()));
        let observed = Arc::clone(&aggregator);
        let driver = DriverLoop::new(gate.clone(), cycle, loop_config).with_observer(Box::new(
            move |snapshot: &FrameSnapshot| {
                record_snapshot(snapshot);
                if let Ok(mut aggregator) = observed.lock() {
                    aggregator.update(snapshot);
                }
            },
        ));

        // Shutdown: external signal or timeout
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let timeout = self.config.timeout;
        let signal_task = tokio::spawn(async move {
            match timeout {
                Some(timeout) => tokio::select! {
                    _ = shutdown => {}
                    _ = tokio::time::sleep(timeout) => {
                        warn!(timeout_secs = timeout.as_secs(), "Pipeline timed out");
                    }
                },
                None => shutdown.await,
            }
            let _ = shutdown_tx.send(true);
        });

        // Start producers last so the first samples are not lost
        let arrivals = gate.clone();
        ingestion.start_streams(Arc::new(move |packet: StreamPacket| {
            arrivals.record_arrival(packet).map(|_| ())
        }));
        ingestion.start_corrections(correction_tx);

        info!(max_cycles = ?self.config.max_cycles, "Pipeline running");
        let driver_stats = driver.run(shutdown_rx).await;
        signal_task.abort();

        // Shutdown
        info!("Shutting down pipeline...");
        ingestion.stop_all();

        let gate_stats = gate.stats();
        record_gate_stats(&gate_stats);

        // the driver owned the last publication sender, so the dispatcher drains and exits
        let sink_reports = match tokio::time::timeout(DISPATCHER_DRAIN_TIMEOUT, dispatcher_handle).await {
            Ok(Ok(reports)) => reports,
            Ok(Err(e)) => {
                warn!(error = %e, "Dispatcher task failed");
                Vec::new()
            }
            Err(_) => {
                warn!("Dispatcher did not drain in time");
                Vec::new()
            }
        };

        let corrections_applied = match tokio::time::timeout(INTAKE_DRAIN_TIMEOUT, intake).await {
            Ok(Ok(applied)) => applied,
            _ => {
                warn!("Correction intake did not close in time");
                0
            }
        };

        let fusion = match aggregator.lock() {
            Ok(mut aggregator) => {
                aggregator.absorb_gate_stats(&gate_stats);
                aggregator.summary()
            }
            Err(_) => Default::default(),
        };

        let stats = PipelineStats {
            driver: driver_stats,
            ingestion: ingestion.metrics().snapshot(),
            sink_reports,
            corrections_applied,
            fusion,
            active_streams: ingestion.stream_count(),
            active_sinks,
            duration: start_time.elapsed(),
        };

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            cycles = stats.driver.cycles,
            "Pipeline shutdown complete"
        );

        Ok(stats)
    }
}
