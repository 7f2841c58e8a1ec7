//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// LOAM Fusion - synchronization, pose composition and publication for a
/// multi-rate lidar odometry pipeline
#[derive(Parser, Debug)]
#[command(
    name = "loam-fusion",
    author,
    version,
    about = "LOAM localization fusion layer",
    long_about = "Gates the upstream feature streams on timestamp agreement, composes the\n\
                  fast odometry with the slow mapping correction, and publishes odometry,\n\
                  transforms and throttled point-cloud payloads to the configured sinks."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "LOAM_FUSION_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "LOAM_FUSION_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the fusion loop against the mock upstream stages
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "config.toml", env = "LOAM_FUSION_CONFIG")]
    pub config: PathBuf,

    /// Stop after this many processing cycles (0 = unlimited)
    #[arg(long, default_value = "0", env = "LOAM_FUSION_MAX_CYCLES")]
    pub max_cycles: u64,

    /// Stop after this many seconds (0 = no timeout)
    #[arg(long, default_value = "0", env = "LOAM_FUSION_TIMEOUT")]
    pub timeout: u64,

    /// Validate configuration and exit without running
    #[arg(long)]
    pub dry_run: bool,

    /// Capacity of the publication and correction queues
    #[arg(long, default_value = "100", env = "LOAM_FUSION_BUFFER_SIZE")]
    pub buffer_size: usize,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "LOAM_FUSION_METRICS_PORT")]
    pub metrics_port: u16,

    /// Rate of mock mapping corrections in Hz (0 = no corrections)
    #[arg(long, default_value = "1.0", env = "LOAM_FUSION_CORRECTION_RATE")]
    pub correction_rate_hz: f64,

    /// Simulated seconds per wall second for the mock streams
    #[arg(long, default_value = "1.0")]
    pub speed: f64,
}

#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show declared streams
    #[arg(long)]
    pub streams: bool,

    /// Show sink configuration
    #[arg(long)]
    pub sinks: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
