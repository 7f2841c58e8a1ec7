//! DataSink trait - Publisher output interface
//!
//! Defines the abstract interface for Sinks.

use crate::{ContractError, Publication};

/// Data output trait
///
/// All sink implementations must implement this trait.
#[trait_variant::make(DataSink: Send)]
pub trait LocalDataSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Write one publication (odometry, transform or heavy payload)
    ///
    /// # Errors
    /// Returns write error (should include context)
    async fn write(&mut self, publication: &Publication) -> Result<(), ContractError>;

    /// Flush buffer (if any)
    async fn flush(&mut self) -> Result<(), ContractError>;

    /// Close sink
    async fn close(&mut self) -> Result<(), ContractError>;
}
