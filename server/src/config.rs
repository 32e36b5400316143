//! Deployment configuration
//!
//! Everything that changes between revisions of the site lives here: the
//! cache version, the asset manifests, and the sensitive path suffixes.
//! Loaded once at startup and read-only afterwards.

use crate::cache::CacheError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Cache generation ID, e.g. "v17". Overridable with
    /// PAGEKEEPER_CACHE_VERSION so deployment tooling can bump it without
    /// editing the file.
    pub cache_version: String,
    /// The gateway's own origin, e.g. "http://127.0.0.1:8723"
    pub origin: String,
    /// Base URL of the real static-file origin
    pub upstream: String,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Assets that must all cache for an install to succeed
    #[serde(default)]
    pub required_assets: Vec<String>,
    /// Best-effort assets; failures are logged and skipped
    #[serde(default)]
    pub optional_assets: Vec<String>,
    /// Path suffixes of pages that bypass caching entirely
    #[serde(default)]
    pub sensitive_suffixes: Vec<String>,
    #[serde(default = "default_offline_path")]
    pub offline_path: String,
    #[serde(default = "default_home_path")]
    pub home_path: String,
}

fn default_listen_addr() -> String {
    "127.0.0.1:8723".to_string()
}

fn default_offline_path() -> String {
    "/offline.html".to_string()
}

fn default_home_path() -> String {
    "/".to_string()
}

impl Config {
    /// Load the configuration file named by PAGEKEEPER_CONFIG
    /// (default ./pagekeeper.json)
    pub fn load() -> Result<Self, CacheError> {
        let path = std::env::var("PAGEKEEPER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./pagekeeper.json"));
        Self::from_file(&path)
    }

    pub fn from_file(path: &Path) -> Result<Self, CacheError> {
        let raw = std::fs::read_to_string(path)?;
        let mut config: Config =
            serde_json::from_str(&raw).map_err(|e| CacheError::Storage(Box::new(e)))?;

        if let Ok(version) = std::env::var("PAGEKEEPER_CACHE_VERSION") {
            info!("Cache version overridden by environment: {}", version);
            config.cache_version = version;
        }

        info!(
            "Loaded configuration: generation {}, {} required + {} optional assets",
            config.cache_version,
            config.required_assets.len(),
            config.optional_assets.len()
        );
        Ok(config)
    }

    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        Self {
            cache_version: "v1".to_string(),
            origin: "http://site.example:8080".to_string(),
            upstream: "http://upstream.example:9000".to_string(),
            listen_addr: default_listen_addr(),
            required_assets: Vec::new(),
            optional_assets: Vec::new(),
            sensitive_suffixes: Vec::new(),
            offline_path: default_offline_path(),
            home_path: default_home_path(),
        }
    }
}
