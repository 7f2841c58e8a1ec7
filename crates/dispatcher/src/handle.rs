//! SinkHandle - one sink behind its own bounded queue and worker task

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use contracts::{DataSink, Publication};

use crate::metrics::SinkMetrics;

/// Handle to a running sink worker
pub struct SinkHandle {
    name: String,
    tx: mpsc::Sender<Publication>,
    metrics: Arc<SinkMetrics>,
    worker_handle: JoinHandle<()>,
}

impl SinkHandle {
    /// Spawn the worker task for `sink`.
    pub fn spawn<S: DataSink + Send + 'static>(sink: S, queue_capacity: usize) -> Self {
        let name = sink.name().to_string();
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let metrics = Arc::new(SinkMetrics::new());

        let worker_metrics = Arc::clone(&metrics);
        let worker_name = name.clone();
        let worker_handle = tokio::spawn(async move {
            sink_worker(sink, rx, worker_metrics, worker_name).await;
        });

        Self {
            name,
            tx,
            metrics,
            worker_handle,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Queue a publication without waiting.
    ///
    /// Returns false if the queue was full (publication dropped) or the
    /// worker is gone.
    pub fn try_send(&self, publication: Publication) -> bool {
        match self.tx.try_send(publication) {
            Ok(()) => {
                self.metrics
                    .set_queue_len(self.tx.max_capacity() - self.tx.capacity());
                true
            }
            Err(mpsc::error::TrySendError::Full(p)) => {
                self.metrics.inc_dropped_count();
                metrics::counter!("sink_dropped_total", "sink" => self.name.clone(), "kind" => p.kind())
                    .increment(1);
                warn!(
                    sink = %self.name,
                    kind = p.kind(),
                    timestamp = p.timestamp(),
                    "Queue full, publication dropped"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!(sink = %self.name, "Sink worker closed unexpectedly");
                false
            }
        }
    }

    /// Close the queue and wait for the worker to drain, flush and close.
    #[instrument(name = "sink_handle_shutdown", skip(self), fields(sink = %self.name))]
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.worker_handle.await {
            error!(sink = %self.name, error = ?e, "Worker task panicked");
        }
        debug!(sink = %self.name, "SinkHandle shutdown complete");
    }
}

#[instrument(name = "sink_worker_loop", skip(sink, rx, metrics), fields(sink = %name))]
async fn sink_worker<S: DataSink>(
    mut sink: S,
    mut rx: mpsc::Receiver<Publication>,
    metrics: Arc<SinkMetrics>,
    name: String,
) {
    debug!("Sink worker started");

    while let Some(publication) = rx.recv().await {
        metrics.set_queue_len(rx.len());

        match sink.write(&publication).await {
            Ok(()) => metrics.record_write(&publication),
            Err(e) => {
                // a failed write never stops the worker
                metrics.inc_failure_count();
                metrics::counter!("sink_write_failures_total", "sink" => name.clone()).increment(1);
                error!(
                    kind = publication.kind(),
                    timestamp = publication.timestamp(),
                    error = %e,
                    "Write failed"
                );
            }
        }
    }

    if let Err(e) = sink.flush().await {
        error!(error = %e, "Flush failed on shutdown");
    }
    if let Err(e) = sink.close().await {
        error!(error = %e, "Close failed on shutdown");
    }

    debug!("Sink worker stopped");
}
