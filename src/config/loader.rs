//! Configuration Loader
//!
//! Finds and reads the gateway config file.

use crate::config::router::GatewayConfig;
use crate::error::{GatewayError, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable pointing at a config file
pub const CONFIG_PATH_ENV: &str = "LLM_GATEWAY_CONFIG";

/// Configuration loader
#[derive(Debug)]
pub struct ConfigLoader {
    config: GatewayConfig,
    path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Load from the first config file found in the default locations.
    ///
    /// Variables from a `.env` file are loaded first so provider API keys can
    /// live there. With no config file around, the config is empty.
    pub fn new() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "Loaded environment file");
        }

        match Self::get_config_paths().into_iter().find(|p| p.exists()) {
            Some(path) => Self::from_path(path),
            None => Ok(Self {
                config: GatewayConfig::default(),
                path: None,
            }),
        }
    }

    /// Load a specific config file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config = Self::load_from_file(path)?;

        debug!(
            path = %path.display(),
            routers = config.routers.language.len(),
            "Loaded gateway config"
        );

        Ok(Self {
            config,
            path: Some(path.to_path_buf()),
        })
    }

    /// Parse config from a JSON string
    pub fn from_json(content: &str) -> Result<Self> {
        let config = serde_json::from_str(content)
            .map_err(|e| GatewayError::Config(format!("Failed to parse config: {}", e)))?;

        Ok(Self { config, path: None })
    }

    /// Get list of config paths to check, most specific first
    fn get_config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if let Ok(custom_path) = std::env::var(CONFIG_PATH_ENV) {
            paths.push(PathBuf::from(custom_path));
        }

        paths.push(PathBuf::from("gateway.json"));

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("llm-gateway").join("gateway.json"));
        }

        if let Some(home_dir) = dirs::home_dir() {
            paths.push(home_dir.join(".llm-gateway").join("gateway.json"));
        }

        paths
    }

    fn load_from_file(path: &Path) -> Result<GatewayConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            GatewayError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            GatewayError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// File the config came from, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Take ownership of the configuration
    pub fn into_config(self) -> GatewayConfig {
        self.config
    }
}
