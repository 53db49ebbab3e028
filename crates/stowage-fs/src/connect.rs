//! Backend construction from connection settings.

use std::collections::BTreeMap;
use std::fs;
use std::sync::Arc;

use stowage_config::ConnectionSettings;
use tracing::{debug, info};

use crate::client::FileSystem;
use crate::error::{FsError, FsResult};
use crate::local::LocalFileSystem;

/// Property naming the filesystem URI.
pub const DEFAULT_FS_KEY: &str = "fs.defaultFS";
const DEFAULT_FS_URI: &str = "file:///";

/// Merge connection properties: each of `config_files` in order, then `config`.
///
/// # Errors
///
/// Returns an error when a property file cannot be read or is not a JSON object of
/// strings.
pub fn resolve_properties(settings: &ConnectionSettings) -> FsResult<BTreeMap<String, String>> {
    let mut properties = BTreeMap::new();
    for path in &settings.config_files {
        let raw = fs::read_to_string(path)
            .map_err(|source| FsError::io("connect.read_config", path, source))?;
        let loaded: BTreeMap<String, String> =
            serde_json::from_str(&raw).map_err(|source| FsError::ConnectionConfig {
                path: path.clone(),
                source,
            })?;
        debug!(path = %path.display(), keys = loaded.len(), "loaded connection properties");
        properties.extend(loaded);
    }
    properties.extend(
        settings
            .config
            .iter()
            .map(|(key, value)| (key.clone(), value.clone())),
    );
    Ok(properties)
}

/// Build the filesystem backend selected by `fs.defaultFS`.
///
/// # Errors
///
/// Returns an error when the properties cannot be resolved or name an unsupported
/// scheme.
pub fn connect(settings: &ConnectionSettings) -> FsResult<Arc<dyn FileSystem>> {
    let properties = resolve_properties(settings)?;
    let uri = properties
        .get(DEFAULT_FS_KEY)
        .map_or(DEFAULT_FS_URI, String::as_str);
    let scheme = uri.split_once(':').map_or(uri, |(scheme, _)| scheme);

    match scheme {
        "file" => {
            info!(
                uri,
                doas = settings.doas.as_deref().unwrap_or("-"),
                "connected to local filesystem"
            );
            Ok(Arc::new(LocalFileSystem::new()))
        }
        _ => Err(FsError::Unsupported {
            operation: "connect",
            value: uri.to_string(),
        }),
    }
}
