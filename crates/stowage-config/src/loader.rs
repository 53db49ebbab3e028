//! Reading job documents from disk.

use std::fs;
use std::path::Path;

use crate::error::{ConfigError, ConfigResult};
use crate::model::OutputConfig;

/// Load an [`OutputConfig`] from a JSON file.
///
/// # Errors
///
/// Returns an error when the file cannot be read or does not decode.
pub fn load_output_config(path: &Path) -> ConfigResult<OutputConfig> {
    let raw =
        fs::read_to_string(path).map_err(|source| ConfigError::io("read job config", path, source))?;
    serde_json::from_str(&raw).map_err(|source| ConfigError::json("parse job config", path, source))
}

/// Decode an [`OutputConfig`] from an in-memory JSON document.
///
/// # Errors
///
/// Returns an error when the document does not decode.
pub fn parse_output_config(raw: &str) -> ConfigResult<OutputConfig> {
    serde_json::from_str(raw).map_err(|source| ConfigError::json("parse job config", "<inline>", source))
}
