//! Config resolution: CLI path, then `HISTORIAN_CONFIG`, then the XDG config
//! directory, then built-in defaults.
//!
//! An explicitly named file (CLI or env) must exist. The XDG file is
//! optional.

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::config::HistorianConfig;
use crate::error::ConfigError;
use crate::snapshot::ConfigSnapshot;
use crate::validate::validate;

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "HISTORIAN_CONFIG";

/// File name looked up under `$XDG_CONFIG_HOME/historian/`.
pub const CONFIG_FILE_NAME: &str = "historian.toml";

/// Where the effective configuration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigSource {
    Cli,
    Env,
    Xdg,
    Defaults,
}

/// Candidate config locations, highest precedence first.
#[derive(Debug, Clone, Default)]
pub struct ConfigPaths {
    pub cli: Option<PathBuf>,
    pub env: Option<PathBuf>,
    pub xdg: Option<PathBuf>,
}

impl ConfigPaths {
    /// Candidates for this process: the given CLI path, `HISTORIAN_CONFIG`,
    /// and the platform config directory.
    pub fn discover(cli: Option<PathBuf>) -> Self {
        let env = std::env::var_os(CONFIG_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        let xdg = dirs::config_dir().map(|d| d.join("historian").join(CONFIG_FILE_NAME));
        Self { cli, env, xdg }
    }
}

/// A validated configuration plus its provenance.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: HistorianConfig,
    pub snapshot: ConfigSnapshot,
}

/// Resolve, load, and validate the effective configuration.
pub fn resolve_config(paths: &ConfigPaths) -> Result<ResolvedConfig, ConfigError> {
    let (config, source, path) = if let Some(p) = &paths.cli {
        (load_required(p)?, ConfigSource::Cli, Some(p.clone()))
    } else if let Some(p) = &paths.env {
        (load_required(p)?, ConfigSource::Env, Some(p.clone()))
    } else if let Some(p) = paths.xdg.as_ref().filter(|p| p.is_file()) {
        (load_file(p)?, ConfigSource::Xdg, Some(p.clone()))
    } else {
        (HistorianConfig::default(), ConfigSource::Defaults, None)
    };

    let result = validate(&config);
    if !result.is_valid() {
        return Err(ConfigError::Invalid(result.errors));
    }

    let snapshot = ConfigSnapshot::new(&config, source, path);
    Ok(ResolvedConfig { config, snapshot })
}

fn load_required(path: &Path) -> Result<HistorianConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }
    load_file(path)
}

/// Load a config file, choosing the parser by extension.
pub fn load_file(path: &Path) -> Result<HistorianConfig, ConfigError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    match ext.as_deref() {
        Some("toml") => toml::from_str(&text).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        }),
        Some("json") => serde_json::from_str(&text).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        }),
        _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
    }
}
