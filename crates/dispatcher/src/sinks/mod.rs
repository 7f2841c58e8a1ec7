//! Sink implementations

mod file;
mod log;
mod memory;
mod network;

pub use self::file::{FileSink, FileSinkConfig};
pub use self::log::LogSink;
pub use self::memory::{MemorySink, MemoryStore};
pub use self::network::{NetworkFormat, NetworkSink, NetworkSinkConfig};
