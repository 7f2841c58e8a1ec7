//! Dispatcher - fans publications out to sinks

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use contracts::{Publication, SinkConfig, SinkType};

use crate::error::DispatcherError;
use crate::handle::SinkHandle;
use crate::metrics::MetricsSnapshot;
use crate::sinks::{FileSink, LogSink, NetworkSink};

/// Sink param selecting which publication kinds a sink receives,
/// e.g. `kinds = "odometry,transform"`. Absent means everything.
pub const KINDS_PARAM: &str = "kinds";

const KNOWN_KINDS: [&str; 3] = ["odometry", "transform", "heavy"];

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub sinks: Vec<SinkConfig>,
}

/// Sink handle plus the kinds routed to it
struct Route {
    handle: SinkHandle,
    kinds: Option<Vec<&'static str>>,
}

impl Route {
    fn accepts(&self, kind: &str) -> bool {
        self.kinds
            .as_ref()
            .is_none_or(|kinds| kinds.iter().any(|k| *k == kind))
    }
}

fn parse_kinds(config: &SinkConfig) -> Result<Option<Vec<&'static str>>, DispatcherError> {
    let Some(raw) = config.params.get(KINDS_PARAM) else {
        return Ok(None);
    };
    let mut kinds = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let kind = KNOWN_KINDS
            .iter()
            .find(|k| k.eq_ignore_ascii_case(part))
            .ok_or_else(|| {
                DispatcherError::sink_creation(
                    &config.name,
                    format!("unknown publication kind '{part}'"),
                )
            })?;
        kinds.push(*kind);
    }
    Ok(Some(kinds))
}

pub struct DispatcherBuilder {
    config: DispatcherConfig,
    input_rx: mpsc::Receiver<Publication>,
}

impl DispatcherBuilder {
    pub fn new(config: DispatcherConfig, input_rx: mpsc::Receiver<Publication>) -> Self {
        Self { config, input_rx }
    }

    /// Create every configured sink and start its worker.
    #[instrument(name = "dispatcher_builder_build", skip(self), fields(sink_count = self.config.sinks.len()))]
    pub async fn build(self) -> Result<Dispatcher, DispatcherError> {
        let mut routes = Vec::with_capacity(self.config.sinks.len());
        for sink_config in &self.config.sinks {
            let kinds = parse_kinds(sink_config)?;
            let handle = create_sink_handle(sink_config).await?;
            routes.push(Route { handle, kinds });
        }

        Ok(Dispatcher {
            routes,
            input_rx: self.input_rx,
        })
    }
}

#[instrument(
    name = "dispatcher_create_sink_handle",
    skip(config),
    fields(sink = %config.name, sink_type = ?config.sink_type)
)]
async fn create_sink_handle(config: &SinkConfig) -> Result<SinkHandle, DispatcherError> {
    match config.sink_type {
        SinkType::Log => {
            let sink = LogSink::new(&config.name);
            Ok(SinkHandle::spawn(sink, config.queue_capacity))
        }
        SinkType::File => {
            let sink = FileSink::from_params(&config.name, &config.params)
                .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string()))?;
            Ok(SinkHandle::spawn(sink, config.queue_capacity))
        }
        SinkType::Network => {
            let sink = NetworkSink::from_params(&config.name, &config.params)
                .await
                .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string()))?;
            Ok(SinkHandle::spawn(sink, config.queue_capacity))
        }
    }
}

/// Consumes publications and hands each to every sink that accepts its kind.
///
/// A slow sink only fills its own queue; the others keep receiving.
pub struct Dispatcher {
    routes: Vec<Route>,
    input_rx: mpsc::Receiver<Publication>,
}

impl Dispatcher {
    /// Dispatcher over pre-built handles, all receiving every kind
    pub fn with_handles(handles: Vec<SinkHandle>, input_rx: mpsc::Receiver<Publication>) -> Self {
        let routes = handles
            .into_iter()
            .map(|handle| Route { handle, kinds: None })
            .collect();
        Self { routes, input_rx }
    }

    pub fn sink_count(&self) -> usize {
        self.routes.len()
    }

    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.routes
            .iter()
            .map(|r| (r.handle.name().to_string(), r.handle.metrics().snapshot()))
            .collect()
    }

    /// Run until the input channel closes, then drain and close every sink.
    #[instrument(name = "dispatcher_run", skip(self))]
    pub async fn run(mut self) -> Vec<(String, MetricsSnapshot)> {
        info!(sinks = self.routes.len(), "Dispatcher started");

        let mut count: u64 = 0;
        while let Some(publication) = self.input_rx.recv().await {
            count += 1;
            self.dispatch(&publication);

            if count.is_multiple_of(500) {
                debug!(publications = count, "Dispatcher progress");
            }
        }

        info!(publications = count, "Dispatcher input closed, shutting down");

        let mut report = Vec::with_capacity(self.routes.len());
        for route in self.routes {
            let name = route.handle.name().to_string();
            let metrics = std::sync::Arc::clone(route.handle.metrics());
            route.handle.shutdown().await;
            report.push((name, metrics.snapshot()));
        }

        info!("Dispatcher shutdown complete");
        report
    }

    pub fn spawn(self) -> JoinHandle<Vec<(String, MetricsSnapshot)>> {
        tokio::spawn(self.run())
    }

    fn dispatch(&self, publication: &Publication) {
        let kind = publication.kind();
        let mut delivered = 0usize;
        for route in self.routes.iter().filter(|r| r.accepts(kind)) {
            if route.handle.try_send(publication.clone()) {
                delivered += 1;
            }
        }
        if delivered == 0 && !self.routes.is_empty() {
            warn!(kind, timestamp = publication.timestamp(), "Publication reached no sink");
        }
    }
}

/// Build a dispatcher straight from sink configs
#[instrument(name = "dispatcher_create", skip(sink_configs, input_rx))]
pub async fn create_dispatcher(
    sink_configs: Vec<SinkConfig>,
    input_rx: mpsc::Receiver<Publication>,
) -> Result<Dispatcher, DispatcherError> {
    let config = DispatcherConfig {
        sinks: sink_configs,
    };
    DispatcherBuilder::new(config, input_rx).build().await
}
