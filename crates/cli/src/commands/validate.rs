//! `validate` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use contracts::FusionBlueprint;

use crate::cli::ValidateArgs;

#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    anchor_stream: String,
    stream_count: usize,
    heavy_stream_count: usize,
    tolerance_ms: f64,
    poll_rate_hz: f64,
    io_ratio: u32,
    sink_count: usize,
}

pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    anchor_stream: blueprint.sync.anchor_stream.clone(),
                    stream_count: blueprint.streams.len(),
                    heavy_stream_count: blueprint.heavy_stream_ids().len(),
                    tolerance_ms: blueprint.sync.tolerance_sec * 1000.0,
                    poll_rate_hz: blueprint.driver.poll_rate_hz,
                    io_ratio: blueprint.publish.io_ratio,
                    sink_count: blueprint.sinks.len(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Non-fatal issues
fn collect_warnings(blueprint: &FusionBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.sinks.is_empty() {
        warnings.push("No sinks configured - publications will be dropped".to_string());
    }

    if blueprint.heavy_stream_ids().is_empty() {
        warnings.push("No stream flagged heavy - heavy payloads will be empty".to_string());
    }

    if blueprint.sync.tolerance_sec * 2.0 >= blueprint.driver.scan_period_sec {
        warnings.push(format!(
            "sync.tolerance_sec ({}) is at least half the scan period ({}) - samples from adjacent sweeps may be paired",
            blueprint.sync.tolerance_sec, blueprint.driver.scan_period_sec
        ));
    }

    if blueprint.driver.poll_rate_hz * blueprint.driver.scan_period_sec < 2.0 {
        warnings.push(format!(
            "driver.poll_rate_hz ({}) polls fewer than twice per scan - ready frames may be overwritten before they are consumed",
            blueprint.driver.poll_rate_hz
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Anchor stream: {}", summary.anchor_stream);
            println!(
                "  Streams: {} ({} heavy)",
                summary.stream_count, summary.heavy_stream_count
            );
            println!("  Tolerance: {:.1} ms", summary.tolerance_ms);
            println!("  Poll rate: {} Hz", summary.poll_rate_hz);
            println!("  IO ratio: {}", summary.io_ratio);
            println!("  Sinks: {}", summary.sink_count);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn args_for(content: &str) -> (tempfile::NamedTempFile, ValidateArgs) {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        let args = ValidateArgs {
            config: file.path().to_path_buf(),
            json: true,
        };
        (file, args)
    }

    #[test]
    fn defaults_are_valid_but_warn_about_sinks() {
        let (_file, args) = args_for("");
        let result = validate_config(&args);
        assert!(result.valid);
        let warnings = result.warnings.unwrap();
        assert!(warnings.iter().any(|w| w.contains("No sinks")));
        assert_eq!(result.summary.unwrap().stream_count, 6);
    }

    #[test]
    fn unknown_anchor_is_invalid() {
        let (_file, args) = args_for("[sync]\nanchor_stream = \"nope\"\n");
        let result = validate_config(&args);
        assert!(!result.valid);
        assert!(result.error.is_some());
    }

    #[test]
    fn missing_file_is_invalid() {
        let args = ValidateArgs {
            config: "/no/such/config.toml".into(),
            json: false,
        };
        assert!(!validate_config(&args).valid);
    }

    #[test]
    fn wide_tolerance_warns() {
        let mut blueprint = FusionBlueprint::reference();
        blueprint.sync.tolerance_sec = 0.06;
        assert!(collect_warnings(&blueprint)
            .iter()
            .any(|w| w.contains("adjacent sweeps")));
    }
}
