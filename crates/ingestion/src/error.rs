//! Ingestion errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestionError {
    /// A mock producer was configured with an unusable value
    #[error("invalid mock setting {field} = {value} for '{stream_id}'")]
    InvalidMock {
        stream_id: String,
        field: &'static str,
        value: f64,
    },

    /// Two sources registered for one stream
    #[error("stream '{stream_id}' already has a source")]
    DuplicateSource { stream_id: String },

    /// Source registered for a stream the blueprint does not declare
    #[error("stream '{stream_id}' is not declared")]
    UndeclaredStream { stream_id: String },
}

pub type Result<T> = std::result::Result<T, IngestionError>;
