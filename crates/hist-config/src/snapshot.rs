//! Config snapshots for run logs.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::PathBuf;

use crate::config::HistorianConfig;
use crate::resolve::ConfigSource;

/// The effective configuration, where it came from, and its fingerprint.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigSnapshot {
    pub source: ConfigSource,
    pub path: Option<PathBuf>,
    pub fingerprint: String,
}

impl ConfigSnapshot {
    pub fn new(config: &HistorianConfig, source: ConfigSource, path: Option<PathBuf>) -> Self {
        Self {
            source,
            path,
            fingerprint: fingerprint(config),
        }
    }
}

/// SHA-256 over the canonical JSON form of the config.
///
/// Equal configs hash equally regardless of the file format they came from.
pub fn fingerprint(config: &HistorianConfig) -> String {
    let canonical = serde_json::to_vec(config).unwrap_or_default();
    sha256_hex(&canonical)
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_stable() {
        let config = HistorianConfig::default();
        assert_eq!(fingerprint(&config), fingerprint(&config.clone()));
        assert_eq!(fingerprint(&config).len(), 64);
    }

    #[test]
    fn test_fingerprint_tracks_changes() {
        let mut other = HistorianConfig::default();
        other.tables.prefix = "h_".into();
        assert_ne!(fingerprint(&HistorianConfig::default()), fingerprint(&other));
    }
}
