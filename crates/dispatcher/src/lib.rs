//! # Dispatcher
//!
//! Output side of the fusion loop.
//!
//! - [`Publisher`] turns each cycle output into odometry, transforms and
//!   (throttled) heavy payloads
//! - [`Dispatcher`] fans publications out to sinks, each behind its own
//!   bounded queue, so a slow sink never stalls the loop

pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod publisher;
pub mod sinks;
pub mod throttle;

pub use contracts::{DataSink, Publication};
pub use dispatcher::{create_dispatcher, Dispatcher, DispatcherBuilder, DispatcherConfig, KINDS_PARAM};
pub use error::DispatcherError;
pub use handle::SinkHandle;
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use publisher::{PublishSummary, Publisher, PublisherConfig};
pub use sinks::{FileSink, LogSink, MemorySink, MemoryStore, NetworkSink};
pub use throttle::ThrottlePolicy;
