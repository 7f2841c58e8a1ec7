//! # Ingestion
//!
//! Producer side of the fusion layer.
//!
//! - [`IngestionPipeline`] registers stream and correction producers and
//!   fans their output into the gate and the correction intake
//! - [`MockStreamSource`] / [`MockCorrectionSource`] stand in for the
//!   upstream feature-extraction and refinement stages
//!
//! ```ignore
//! let mut pipeline = IngestionPipeline::for_blueprint(&blueprint);
//! for source in MockStreamSource::reference_set(&blueprint, 1.0)? {
//!     pipeline.register_stream_source(Box::new(source))?;
//! }
//! let gate = gate.clone();
//! pipeline.start_streams(Arc::new(move |p| gate.record_arrival(p).map(|_| ())));
//! ```

mod error;
mod metrics;
mod mock;
mod pipeline;

pub use error::{IngestionError, Result};
pub use metrics::{IngestionMetrics, MetricsSnapshot};
pub use mock::{
    MockCorrectionConfig, MockCorrectionSource, MockPayload, MockStreamConfig, MockStreamSource,
    REFERENCE_OFFSET_STEP,
};
pub use pipeline::{IngestionPipeline, PacketHandler};
