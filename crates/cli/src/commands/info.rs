//! `info` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use contracts::{FrameNames, FusionBlueprint, SkewCheck, TopicNames};

use crate::cli::InfoArgs;
use crate::error::ensure_config_exists;

#[derive(Serialize)]
struct ConfigInfo<'a> {
    version: String,
    sync: SyncInfo<'a>,
    driver: DriverInfo,
    publish: PublishInfo<'a>,
    frames: &'a FrameNames,
    topics: &'a TopicNames,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    streams: Vec<StreamInfo<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sinks: Vec<SinkInfo<'a>>,
}

#[derive(Serialize)]
struct SyncInfo<'a> {
    anchor_stream: &'a str,
    tolerance_sec: f64,
    skew_check: SkewCheck,
}

#[derive(Serialize)]
struct DriverInfo {
    poll_rate_hz: f64,
    scan_period_sec: f64,
}

#[derive(Serialize)]
struct PublishInfo<'a> {
    io_ratio: u32,
    output_transforms: bool,
    pose_covariance: &'a [f64],
}

#[derive(Serialize)]
struct StreamInfo<'a> {
    id: &'a str,
    heavy: bool,
    anchor: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    topic: Option<&'a str>,
}

#[derive(Serialize)]
struct SinkInfo<'a> {
    name: &'a str,
    sink_type: String,
    queue_capacity: usize,
    #[serde(skip_serializing_if = "std::collections::HashMap::is_empty")]
    params: &'a std::collections::HashMap<String, String>,
}

pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");
    ensure_config_exists(&args.config)?;

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&blueprint, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint, args);
    }

    Ok(())
}

fn build_config_info<'a>(blueprint: &'a FusionBlueprint, args: &InfoArgs) -> ConfigInfo<'a> {
    let streams = if args.streams {
        blueprint
            .streams
            .iter()
            .map(|s| StreamInfo {
                id: &s.id,
                heavy: s.heavy,
                anchor: s.id == blueprint.sync.anchor_stream,
                topic: s.topic.as_deref(),
            })
            .collect()
    } else {
        Vec::new()
    };

    let sinks = if args.sinks {
        blueprint
            .sinks
            .iter()
            .map(|s| SinkInfo {
                name: &s.name,
                sink_type: format!("{:?}", s.sink_type),
                queue_capacity: s.queue_capacity,
                params: &s.params,
            })
            .collect()
    } else {
        Vec::new()
    };

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        sync: SyncInfo {
            anchor_stream: &blueprint.sync.anchor_stream,
            tolerance_sec: blueprint.sync.tolerance_sec,
            skew_check: blueprint.sync.skew_check,
        },
        driver: DriverInfo {
            poll_rate_hz: blueprint.driver.poll_rate_hz,
            scan_period_sec: blueprint.driver.scan_period_sec,
        },
        publish: PublishInfo {
            io_ratio: blueprint.publish.io_ratio,
            output_transforms: blueprint.publish.output_transforms,
            pose_covariance: &blueprint.publish.pose_covariance,
        },
        frames: &blueprint.frames,
        topics: &blueprint.topics,
        streams,
        sinks,
    }
}

fn print_config_info(blueprint: &FusionBlueprint, args: &InfoArgs) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                 LOAM Fusion Configuration                    ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    let sync = &blueprint.sync;
    println!("⏱  Synchronization");
    println!("   ├─ Version: {:?}", blueprint.version);
    println!("   ├─ Anchor: {}", sync.anchor_stream);
    println!("   ├─ Tolerance: {:.1} ms", sync.tolerance_sec * 1000.0);
    println!("   └─ Skew check: {:?}", sync.skew_check);

    println!("\n📡 Streams ({})", blueprint.streams.len());
    if args.streams {
        for (i, stream) in blueprint.streams.iter().enumerate() {
            let prefix = if i == blueprint.streams.len() - 1 { "└─" } else { "├─" };
            let mut tags = Vec::new();
            if stream.id == sync.anchor_stream {
                tags.push("anchor");
            }
            if stream.heavy {
                tags.push("heavy");
            }
            if tags.is_empty() {
                println!("   {} {}", prefix, stream.id);
            } else {
                println!("   {} {} ({})", prefix, stream.id, tags.join(", "));
            }
        }
    } else {
        println!(
            "   └─ {} declared, {} heavy",
            blueprint.streams.len(),
            blueprint.heavy_stream_ids().len()
        );
    }

    println!("\n⚙️  Driver");
    println!("   ├─ Poll rate: {} Hz", blueprint.driver.poll_rate_hz);
    println!("   └─ Scan period: {} s", blueprint.driver.scan_period_sec);

    let publish = &blueprint.publish;
    println!("\n📤 Publication");
    println!("   ├─ IO ratio: {}", publish.io_ratio);
    println!("   ├─ Transforms: {}", publish.output_transforms);
    println!("   ├─ Covariance diagonal: {:?}", publish.pose_covariance);
    println!(
        "   ├─ Frames: {} → {} / {}",
        blueprint.frames.init_frame, blueprint.frames.odom_frame, blueprint.frames.lidar_frame
    );
    println!(
        "   └─ Topics: {}, {}, {}",
        blueprint.topics.raw_odometry, blueprint.topics.corrected_odometry, blueprint.topics.heavy
    );

    if !blueprint.sinks.is_empty() {
        println!("\n🗄  Sinks ({})", blueprint.sinks.len());
        for (i, sink) in blueprint.sinks.iter().enumerate() {
            let prefix = if i == blueprint.sinks.len() - 1 { "└─" } else { "├─" };
            if args.sinks {
                println!(
                    "   {} {} ({:?}, queue {}) {:?}",
                    prefix, sink.name, sink.sink_type, sink.queue_capacity, sink.params
                );
            } else {
                println!("   {} {} ({:?})", prefix, sink.name, sink.sink_type);
            }
        }
    }

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{SinkConfig, SinkType};

    #[test]
    fn json_lists_only_requested_sections() {
        let mut blueprint = FusionBlueprint::reference();
        blueprint.sinks.push(SinkConfig {
            name: "log".into(),
            sink_type: SinkType::Log,
            queue_capacity: 10,
            params: Default::default(),
        });
        let args = InfoArgs {
            config: "unused.toml".into(),
            json: true,
            streams: true,
            sinks: false,
        };

        let value = serde_json::to_value(build_config_info(&blueprint, &args)).unwrap();
        assert_eq!(value["streams"].as_array().unwrap().len(), 6);
        assert!(value.get("sinks").is_none());
        assert_eq!(value["sync"]["anchor_stream"], "laser_cloud_less_flat");
        assert_eq!(value["sync"]["skew_check"], "pairwise");
    }
}
