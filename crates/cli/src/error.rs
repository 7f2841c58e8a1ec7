//! Error types for CLI operations.

use std::path::Path;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    #[error("Invalid argument --{arg}: {message}")]
    InvalidArgument { arg: &'static str, message: String },

    #[error("Pipeline setup failed at {stage}: {message}")]
    PipelineSetup {
        stage: &'static str,
        message: String,
    },
}

impl CliError {
    pub fn config_not_found(path: &Path) -> Self {
        Self::ConfigNotFound {
            path: path.display().to_string(),
        }
    }

    pub fn invalid_argument(arg: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            arg,
            message: message.into(),
        }
    }

    pub fn pipeline_setup(stage: &'static str, error: impl std::fmt::Display) -> Self {
        Self::PipelineSetup {
            stage,
            message: error.to_string(),
        }
    }
}

/// Fail early with a uniform message when the config path is wrong
pub fn ensure_config_exists(path: &Path) -> Result<(), CliError> {
    if path.exists() {
        Ok(())
    } else {
        Err(CliError::config_not_found(path))
    }
}
