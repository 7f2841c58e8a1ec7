//! Loads a `FusionBlueprint` from TOML or JSON and rejects it at setup time
//! if any rule fails. Nothing downstream re-validates.
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let blueprint = ConfigLoader::load_from_path(Path::new("config.toml")).unwrap();
//! println!("anchor: {}", blueprint.sync.anchor_stream);
//! ```

mod parser;
mod rules;

pub use contracts::FusionBlueprint;
pub use parser::ConfigFormat;

use contracts::ContractError;
use std::path::Path;
use tracing::debug;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Read, parse and validate a config file; the extension picks the format.
    pub fn load_from_path(path: &Path) -> Result<FusionBlueprint, ContractError> {
        let format = ConfigFormat::from_path(path)?;
        let content = std::fs::read_to_string(path).map_err(|e| {
            ContractError::config_parse_with(format!("cannot read {}", path.display()), e)
        })?;
        let blueprint = Self::load_from_str(&content, format)?;
        debug!(
            path = %path.display(),
            streams = blueprint.streams.len(),
            sinks = blueprint.sinks.len(),
            "fusion config loaded"
        );
        Ok(blueprint)
    }

    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<FusionBlueprint, ContractError> {
        let blueprint = parser::parse(content, format)?;
        rules::validate(&blueprint)?;
        Ok(blueprint)
    }

    /// Blueprint with every default filled in, as `info --json` prints it
    pub fn to_json(blueprint: &FusionBlueprint) -> Result<String, ContractError> {
        serde_json::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }
}
