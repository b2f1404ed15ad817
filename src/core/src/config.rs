//! Runtime configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, ScopeError};

/// Environment variable overriding [`ScopeConfig::temp_root`].
pub const ENV_TMPDIR: &str = "IMGSCOPE_TMPDIR";

/// Environment variable overriding [`ScopeConfig::docker_binary`].
pub const ENV_DOCKER: &str = "IMGSCOPE_DOCKER";

/// Environment variable overriding [`ScopeConfig::docker_host`].
pub const ENV_DOCKER_HOST: &str = "DOCKER_HOST";

/// imgscope configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    /// Directory under which scratch directories are created
    pub temp_root: PathBuf,

    /// Name prefix for every scratch directory
    pub temp_prefix: String,

    /// Docker CLI used to talk to the daemon
    pub docker_binary: String,

    /// Daemon address passed as `DOCKER_HOST` (optional)
    pub docker_host: Option<String>,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            temp_root: std::env::temp_dir(),
            temp_prefix: "imgscope-".to_string(),
            docker_binary: "docker".to_string(),
            docker_host: None,
        }
    }
}

impl ScopeConfig {
    /// Default config file location (~/.imgscope/config.yaml).
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .map(|h| h.join(".imgscope"))
            .unwrap_or_else(|| PathBuf::from(".imgscope"))
            .join("config.yaml")
    }

    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ScopeError::ConfigError(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        let config: ScopeConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the default path if present, else defaults; then apply
    /// environment overrides.
    pub fn load_default() -> Result<Self> {
        let path = Self::default_path();
        let config = if path.exists() {
            Self::load(&path)?
        } else {
            Self::default()
        };
        Ok(config.with_env_overrides(|key| std::env::var(key).ok()))
    }

    /// Apply overrides looked up through `lookup` (normally the process
    /// environment).
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(dir) = lookup(ENV_TMPDIR).filter(|v| !v.is_empty()) {
            self.temp_root = PathBuf::from(dir);
        }
        if let Some(bin) = lookup(ENV_DOCKER).filter(|v| !v.is_empty()) {
            self.docker_binary = bin;
        }
        if let Some(host) = lookup(ENV_DOCKER_HOST).filter(|v| !v.is_empty()) {
            self.docker_host = Some(host);
        }
        self
    }

    fn validate(&self) -> Result<()> {
        if self.temp_prefix.contains(std::path::MAIN_SEPARATOR) || self.temp_prefix.contains('/') {
            return Err(ScopeError::ConfigError(format!(
                "temp_prefix must not contain a path separator: '{}'",
                self.temp_prefix
            )));
        }
        if self.docker_binary.trim().is_empty() {
            return Err(ScopeError::ConfigError(
                "docker_binary must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
