//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{info, warn};

use contracts::FusionBlueprint;

use crate::cli::RunArgs;
use crate::error::{ensure_config_exists, CliError};
use crate::pipeline::{Pipeline, PipelineConfig};

pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");
    ensure_config_exists(&args.config)?;

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    info!(
        anchor = %blueprint.sync.anchor_stream,
        streams = blueprint.streams.len(),
        tolerance_sec = blueprint.sync.tolerance_sec,
        poll_rate_hz = blueprint.driver.poll_rate_hz,
        io_ratio = blueprint.publish.io_ratio,
        sinks = blueprint.sinks.len(),
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let config = pipeline_config(args, blueprint)?;
    let pipeline = Pipeline::new(config);

    info!("Starting fusion pipeline...");
    let stats = pipeline
        .run(shutdown_signal())
        .await
        .context("Pipeline execution failed")?;

    info!(
        cycles = stats.driver.cycles,
        idle_polls = stats.driver.idle_polls,
        duration_secs = stats.duration.as_secs_f64(),
        rate = format!("{:.2}", stats.cycle_rate()),
        "Pipeline completed"
    );
    stats.print_summary();

    info!("LOAM Fusion finished");
    Ok(())
}

fn pipeline_config(args: &RunArgs, blueprint: FusionBlueprint) -> Result<PipelineConfig, CliError> {
    if args.buffer_size == 0 {
        return Err(CliError::invalid_argument("buffer-size", "must be at least 1"));
    }
    if !(args.speed > 0.0 && args.speed.is_finite()) {
        return Err(CliError::invalid_argument(
            "speed",
            format!("must be > 0, got {}", args.speed),
        ));
    }
    if !(args.correction_rate_hz >= 0.0 && args.correction_rate_hz.is_finite()) {
        return Err(CliError::invalid_argument(
            "correction-rate-hz",
            format!("must be >= 0, got {}", args.correction_rate_hz),
        ));
    }

    Ok(PipelineConfig {
        blueprint,
        max_cycles: (args.max_cycles > 0).then_some(args.max_cycles),
        timeout: (args.timeout > 0).then(|| Duration::from_secs(args.timeout)),
        buffer_size: args.buffer_size,
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
        correction_rate_hz: (args.correction_rate_hz > 0.0).then_some(args.correction_rate_hz),
        speed: args.speed,
    })
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    warn!("Received shutdown signal, stopping pipeline...");
}

fn print_config_summary(blueprint: &FusionBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!("Streams ({}):", blueprint.streams.len());
    for stream in &blueprint.streams {
        let anchor = if stream.id == blueprint.sync.anchor_stream {
            " [anchor]"
        } else {
            ""
        };
        let heavy = if stream.heavy { " [heavy]" } else { "" };
        println!("  - {}{}{}", stream.id, anchor, heavy);
    }

    println!("\nSync:");
    println!("  Tolerance: {:.1} ms", blueprint.sync.tolerance_sec * 1000.0);
    println!("  Skew check: {:?}", blueprint.sync.skew_check);

    println!("\nDriver:");
    println!("  Poll rate: {} Hz", blueprint.driver.poll_rate_hz);
    println!("  Scan period: {} s", blueprint.driver.scan_period_sec);

    println!("\nPublish:");
    println!("  IO ratio: {}", blueprint.publish.io_ratio);
    println!("  Transforms: {}", blueprint.publish.output_transforms);

    if !blueprint.sinks.is_empty() {
        println!("\nSinks ({}):", blueprint.sinks.len());
        for sink in &blueprint.sinks {
            println!("  - {} ({:?})", sink.name, sink.sink_type);
        }
    }

    println!();
}
