//! Driver setup errors

use thiserror::Error;

/// Failures while wiring the driver. The running loop itself never errors.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("gate setup failed: {0}")]
    Gate(#[from] contracts::ContractError),

    #[error("publisher setup failed: {0}")]
    Publisher(#[from] dispatcher::DispatcherError),

    #[error("invalid driver setting '{field}': {message}")]
    InvalidSetting { field: &'static str, message: String },
}
