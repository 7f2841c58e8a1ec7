//! Ingestion pipeline - wires producers to the fusion layer

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use contracts::{
    ContractError, CorrectionCallback, CorrectionMessage, CorrectionSource, FusionBlueprint,
    StreamDataCallback, StreamPacket, StreamSource,
};

use crate::error::{IngestionError, Result};
use crate::metrics::IngestionMetrics;

/// Downstream handler for stream packets, typically the gate's
/// `record_arrival`. Called from the producer's own thread.
pub type PacketHandler = Arc<dyn Fn(StreamPacket) -> std::result::Result<(), ContractError> + Send + Sync>;

/// Holds every registered producer and fans their output into one handler.
pub struct IngestionPipeline {
    declared: Option<HashSet<String>>,
    streams: Vec<Box<dyn StreamSource>>,
    corrections: Vec<Box<dyn CorrectionSource>>,
    metrics: Arc<IngestionMetrics>,
}

impl Default for IngestionPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl IngestionPipeline {
    /// Pipeline accepting any stream id
    pub fn new() -> Self {
        Self {
            declared: None,
            streams: Vec::new(),
            corrections: Vec::new(),
            metrics: Arc::new(IngestionMetrics::new()),
        }
    }

    /// Pipeline that only accepts the blueprint's declared streams
    pub fn for_blueprint(blueprint: &FusionBlueprint) -> Self {
        Self {
            declared: Some(blueprint.stream_ids().map(str::to_string).collect()),
            ..Self::new()
        }
    }

    #[instrument(name = "ingestion_register_stream", skip(self, source), fields(stream_id = %source.stream_id()))]
    pub fn register_stream_source(&mut self, source: Box<dyn StreamSource>) -> Result<()> {
        let stream_id = source.stream_id().to_string();
        if let Some(declared) = &self.declared {
            if !declared.contains(&stream_id) {
                return Err(IngestionError::UndeclaredStream { stream_id });
            }
        }
        if self.streams.iter().any(|s| s.stream_id() == stream_id) {
            return Err(IngestionError::DuplicateSource { stream_id });
        }
        debug!("registered stream source");
        self.streams.push(source);
        Ok(())
    }

    pub fn register_correction_source(&mut self, source: Box<dyn CorrectionSource>) {
        self.corrections.push(source);
    }

    /// Start every stream source, delivering into `handler`.
    #[instrument(name = "ingestion_start_streams", skip_all, fields(count = self.streams.len()))]
    pub fn start_streams(&self, handler: PacketHandler) {
        info!("starting stream sources");
        for source in self.streams.iter().filter(|s| !s.is_listening()) {
            let metrics = Arc::clone(&self.metrics);
            let handler = Arc::clone(&handler);
            let callback: StreamDataCallback = Arc::new(move |packet| {
                metrics.record_received();
                let stream_id = packet.stream_id.clone();
                ::metrics::counter!("ingestion_packets_total", "stream" => stream_id.to_string())
                    .increment(1);
                if let Err(e) = handler(packet) {
                    metrics.record_rejected();
                    warn!(stream_id = %stream_id, error = %e, "packet rejected");
                }
            });
            source.listen(callback);
        }
    }

    /// Start every correction source, forwarding into `tx`.
    ///
    /// Never blocks the producer: when the queue is full the new message is
    /// dropped and counted.
    #[instrument(name = "ingestion_start_corrections", skip_all, fields(count = self.corrections.len()))]
    pub fn start_corrections(&self, tx: mpsc::Sender<CorrectionMessage>) {
        for source in self.corrections.iter().filter(|s| !s.is_listening()) {
            source.listen(correction_forwarder(tx.clone(), Arc::clone(&self.metrics)));
        }
    }

    pub fn stop_all(&self) {
        info!(
            streams = self.streams.len(),
            corrections = self.corrections.len(),
            "stopping all sources"
        );
        for source in &self.streams {
            source.stop();
        }
        for source in &self.corrections {
            source.stop();
        }
    }

    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    pub fn correction_source_count(&self) -> usize {
        self.corrections.len()
    }

    pub fn is_stream_listening(&self, stream_id: &str) -> bool {
        self.streams
            .iter()
            .any(|s| s.stream_id() == stream_id && s.is_listening())
    }
}

fn correction_forwarder(
    tx: mpsc::Sender<CorrectionMessage>,
    metrics: Arc<IngestionMetrics>,
) -> CorrectionCallback {
    Arc::new(move |message: CorrectionMessage| {
        metrics.record_correction();
        match tx.try_send(message) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(m)) => {
                metrics.record_correction_dropped();
                warn!(timestamp = m.timestamp, "correction queue full, message dropped");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("correction intake closed");
            }
        }
    })
}
