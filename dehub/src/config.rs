use std::path::Path;

use anyhow::Result;
use config::{Config, Environment, File};
use serde::Deserialize;
use tracing::info;

use crate::cli::LogFormat;

/// Optional defaults layered under the CLI flags (spec §4's "CLI surface
/// (collaborators)... specified only abstractly" — this shape is this
/// crate's own, not dictated by the spec). Only `log_format` is currently
/// merged back into the parsed `Cli`; the rest are reserved for a future
/// config-driven deployment.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub log_format: Option<LogFormat>,
    pub hub: Option<String>,
    pub id: Option<String>,
    pub host_key: Option<String>,
    pub private_key: Option<String>,
    pub trusted_keys: Option<String>,
    pub retry: Option<String>,
}

/// Loads `path` as YAML, layered under `DEHUB_`-prefixed environment
/// variables. Returns the default (empty) config if `path` is `None`.
pub fn load_config(path: Option<&Path>) -> Result<FileConfig> {
    let Some(path) = path else {
        return Ok(FileConfig::default());
    };

    let config: FileConfig = Config::builder()
        .add_source(File::with_name(&path.to_string_lossy()))
        .add_source(Environment::with_prefix("DEHUB").separator("_"))
        .build()?
        .try_deserialize()?;
    info!(path = %path.display(), "loaded config file");
    Ok(config)
}
