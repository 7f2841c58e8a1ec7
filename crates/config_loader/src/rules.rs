//! Config validation
//!
//! Two passes, both setup-time and fatal:
//! 1. Field rules declared on the blueprint (`validator` derive): rates and
//!    tolerance > 0, poll rate bounded above, io_ratio >= 1, covariance of length 6, non-empty ids.
//! 2. Cross-field rules: unique stream ids, anchor exists, finite
//!    covariance, unique sink names.

use std::collections::HashSet;

use contracts::{ContractError, FusionBlueprint};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

/// Validate a FusionBlueprint
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(blueprint: &FusionBlueprint) -> Result<(), ContractError> {
    blueprint.validate().map_err(|errors| first_violation(&errors))?;
    validate_stream_ids(blueprint)?;
    validate_anchor(blueprint)?;
    validate_covariance(blueprint)?;
    validate_sinks(blueprint)?;
    Ok(())
}

/// Flatten derive errors down to the first offending field path.
fn first_violation(errors: &ValidationErrors) -> ContractError {
    let mut path = Vec::new();
    match describe(errors, &mut path) {
        Some((field, message)) => ContractError::config_validation(field, message),
        None => ContractError::config_validation("<root>", "invalid configuration"),
    }
}

fn describe(errors: &ValidationErrors, path: &mut Vec<String>) -> Option<(String, String)> {
    let mut keys: Vec<_> = errors.errors().keys().collect();
    keys.sort();

    for key in keys {
        let kind = &errors.errors()[key];
        path.push(key.to_string());
        let found = match kind {
            ValidationErrorsKind::Field(list) => list.first().map(|err| {
                let message = match &err.message {
                    Some(message) => message.to_string(),
                    None => rule_message(&err.code, &err.params),
                };
                (path.join("."), message)
            }),
            ValidationErrorsKind::Struct(inner) => describe(inner, path),
            ValidationErrorsKind::List(items) => items.iter().find_map(|(idx, inner)| {
                if let Some(last) = path.last_mut() {
                    *last = format!("{key}[{idx}]");
                }
                describe(inner, path)
            }),
        };
        path.pop();
        if found.is_some() {
            return found;
        }
    }
    None
}

fn rule_message(
    code: &str,
    params: &std::collections::HashMap<std::borrow::Cow<'static, str>, serde_json::Value>,
) -> String {
    let value = params
        .get("value")
        .map(|v| v.to_string())
        .unwrap_or_else(|| "?".to_string());
    match code {
        "range" => {
            if let (Some(min), Some(max)) = (params.get("exclusive_min"), params.get("max")) {
                format!("must be in ({min}, {max}], got {value}")
            } else if let Some(min) = params.get("exclusive_min") {
                format!("must be > {min}, got {value}")
            } else if let Some(min) = params.get("min") {
                format!("must be >= {min}, got {value}")
            } else {
                format!("out of range, got {value}")
            }
        }
        "length" => {
            if let Some(equal) = params.get("equal") {
                format!("must have exactly {equal} entries")
            } else if let Some(min) = params.get("min") {
                format!("must have at least {min} entries")
            } else {
                "invalid length".to_string()
            }
        }
        other => format!("failed rule '{other}'"),
    }
}

/// Stream ids must be unique (one gate slot each)
fn validate_stream_ids(blueprint: &FusionBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for stream in &blueprint.streams {
        if !seen.insert(stream.id.as_str()) {
            return Err(ContractError::config_validation(
                format!("streams[id={}]", stream.id),
                "duplicate stream id",
            ));
        }
    }
    Ok(())
}

fn validate_anchor(blueprint: &FusionBlueprint) -> Result<(), ContractError> {
    let anchor = &blueprint.sync.anchor_stream;
    if !blueprint.stream_ids().any(|id| id == anchor) {
        return Err(ContractError::config_validation(
            "sync.anchor_stream",
            format!("anchor stream '{anchor}' not found in streams"),
        ));
    }
    Ok(())
}

fn validate_covariance(blueprint: &FusionBlueprint) -> Result<(), ContractError> {
    for (idx, value) in blueprint.publish.pose_covariance.iter().enumerate() {
        if !value.is_finite() {
            return Err(ContractError::config_validation(
                format!("publish.pose_covariance[{idx}]"),
                format!("covariance must be finite, got {value}"),
            ));
        }
    }
    Ok(())
}

/// Sink names must be unique
fn validate_sinks(blueprint: &FusionBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, sink) in blueprint.sinks.iter().enumerate() {
        if !seen.insert(sink.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("sinks[{idx}].name"),
                format!("duplicate sink name '{}'", sink.name),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{SinkConfig, SinkType, StreamConfig};

    fn minimal_blueprint() -> FusionBlueprint {
        let mut bp = FusionBlueprint::reference();
        bp.sinks = vec![SinkConfig {
            name: "log".into(),
            sink_type: SinkType::Log,
            queue_capacity: 100,
            params: Default::default(),
        }];
        bp
    }

    fn field_of(err: ContractError) -> String {
        match err {
            ContractError::ConfigValidation { field, .. } => field,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&minimal_blueprint()).is_ok());
    }

    #[test]
    fn test_io_ratio_zero_rejected() {
        let mut bp = minimal_blueprint();
        bp.publish.io_ratio = 0;
        let err = validate(&bp).unwrap_err();
        assert!(err.to_string().contains("publish.io_ratio"), "got: {err}");
        assert_eq!(field_of(err), "publish.io_ratio");
    }

    #[test]
    fn test_non_positive_rates_rejected() {
        let mut bp = minimal_blueprint();
        bp.driver.poll_rate_hz = 0.0;
        assert_eq!(field_of(validate(&bp).unwrap_err()), "driver.poll_rate_hz");

        let mut bp = minimal_blueprint();
        bp.driver.poll_rate_hz = 1e12;
        assert_eq!(field_of(validate(&bp).unwrap_err()), "driver.poll_rate_hz");

        let mut bp = minimal_blueprint();
        bp.driver.scan_period_sec = -0.1;
        assert_eq!(
            field_of(validate(&bp).unwrap_err()),
            "driver.scan_period_sec"
        );

        let mut bp = minimal_blueprint();
        bp.sync.tolerance_sec = 0.0;
        assert_eq!(field_of(validate(&bp).unwrap_err()), "sync.tolerance_sec");
    }

    #[test]
    fn test_covariance_length() {
        let mut bp = minimal_blueprint();
        bp.publish.pose_covariance = vec![0.1; 5];
        assert_eq!(
            field_of(validate(&bp).unwrap_err()),
            "publish.pose_covariance"
        );
    }

    #[test]
    fn test_covariance_must_be_finite() {
        let mut bp = minimal_blueprint();
        bp.publish.pose_covariance[3] = f64::NAN;
        assert_eq!(
            field_of(validate(&bp).unwrap_err()),
            "publish.pose_covariance[3]"
        );
    }

    #[test]
    fn test_empty_stream_list() {
        let mut bp = minimal_blueprint();
        bp.streams.clear();
        assert_eq!(field_of(validate(&bp).unwrap_err()), "streams");
    }

    #[test]
    fn test_empty_stream_id_reports_index() {
        let mut bp = minimal_blueprint();
        bp.streams[2].id = String::new();
        assert_eq!(field_of(validate(&bp).unwrap_err()), "streams[2].id");
    }

    #[test]
    fn test_duplicate_stream_id() {
        let mut bp = minimal_blueprint();
        bp.streams.push(StreamConfig::new("imu_trans", false));
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("duplicate stream id"), "got: {err}");
    }

    #[test]
    fn test_anchor_not_found() {
        let mut bp = minimal_blueprint();
        bp.sync.anchor_stream = "nonexistent".into();
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("not found"), "got: {err}");
    }

    #[test]
    fn test_empty_sink_name() {
        let mut bp = minimal_blueprint();
        bp.sinks[0].name = String::new();
        assert_eq!(field_of(validate(&bp).unwrap_err()), "sinks[0].name");
    }

    #[test]
    fn test_duplicate_sink_name() {
        let mut bp = minimal_blueprint();
        bp.sinks.push(bp.sinks[0].clone());
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("duplicate sink name"), "got: {err}");
    }
}
