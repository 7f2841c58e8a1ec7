//! Config parsing
//!
//! TOML (primary) and JSON.

use std::path::Path;

use contracts::{ContractError, FusionBlueprint};

/// Config file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML (preferred)
    Toml,
    /// JSON
    Json,
}

impl ConfigFormat {
    /// Format implied by the file extension, case-insensitive
    pub fn from_path(path: &Path) -> Result<Self, ContractError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("toml") => Ok(Self::Toml),
            Some("json") => Ok(Self::Json),
            Some(other) => Err(ContractError::config_parse(format!(
                "unsupported config format: .{other}"
            ))),
            None => Err(ContractError::config_parse(format!(
                "cannot determine config format of {}",
                path.display()
            ))),
        }
    }
}

pub fn parse_toml(content: &str) -> Result<FusionBlueprint, ContractError> {
    toml::from_str(content)
        .map_err(|e| ContractError::config_parse_with(format!("TOML parse error: {e}"), e))
}

pub fn parse_json(content: &str) -> Result<FusionBlueprint, ContractError> {
    serde_json::from_str(content)
        .map_err(|e| ContractError::config_parse_with(format!("JSON parse error: {e}"), e))
}

/// Parse according to format
pub fn parse(content: &str, format: ConfigFormat) -> Result<FusionBlueprint, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_toml_defaults_everything_but_sinks() {
        let content = r#"
[sync]
tolerance_sec = 0.01

[[sinks]]
name = "log_sink"
sink_type = "log"
"#;
        let bp = parse_toml(content).unwrap();
        assert_eq!(bp.streams.len(), 6);
        assert_eq!(bp.sync.anchor_stream, "laser_cloud_less_flat");
        assert_eq!(bp.sync.tolerance_sec, 0.01);
        assert_eq!(bp.publish.io_ratio, 2);
        assert!(bp.publish.output_transforms);
        assert_eq!(bp.frames.init_frame, "/camera_init");
        assert_eq!(bp.sinks.len(), 1);
    }

    #[test]
    fn test_parse_json_custom_streams() {
        let content = r#"{
            "streams": [
                { "id": "a", "heavy": true },
                { "id": "b" }
            ],
            "sync": { "anchor_stream": "a", "skew_check": "anchor" },
            "publish": { "io_ratio": 3, "output_transforms": false },
            "sinks": [{ "name": "log", "sink_type": "log" }]
        }"#;
        let bp = parse_json(content).unwrap();
        assert_eq!(bp.streams.len(), 2);
        assert!(bp.streams[0].heavy);
        assert!(!bp.streams[1].heavy);
        assert_eq!(bp.sync.skew_check, contracts::SkewCheck::Anchor);
        assert_eq!(bp.publish.io_ratio, 3);
        assert!(!bp.publish.output_transforms);
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let content = "invalid toml [[[";
        let result = parse_toml(content);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
    }

    #[test]
    fn test_unknown_sink_type_is_parse_error() {
        let content = r#"
[[sinks]]
name = "x"
sink_type = "carrier_pigeon"
"#;
        assert!(matches!(
            parse_toml(content),
            Err(ContractError::ConfigParse { .. })
        ));
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            ConfigFormat::from_path(Path::new("fusion.TOML")).unwrap(),
            ConfigFormat::Toml
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("/etc/loam/fusion.json")).unwrap(),
            ConfigFormat::Json
        );
        assert!(ConfigFormat::from_path(Path::new("fusion.yaml")).is_err());
        assert!(ConfigFormat::from_path(Path::new("fusion")).is_err());
    }
}
