//! Config file handling

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::errors::{BoltError, Result};
use crate::scripting::SandboxLimits;

/// `[defaults]` section: collection run settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RunDefaults {
    pub iterations: u32,
    pub delay_ms: u64,
    pub timeout_secs: u64,
}

impl Default for RunDefaults {
    fn default() -> Self {
        Self {
            iterations: 1,
            delay_ms: 0,
            timeout_secs: 30,
        }
    }
}

/// `[scripting]` section
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ScriptingConfig {
    pub timeout_ms: u64,
    pub memory_limit_mb: usize,
}

impl Default for ScriptingConfig {
    fn default() -> Self {
        let limits = SandboxLimits::default();
        Self {
            timeout_ms: limits.timeout.as_millis() as u64,
            memory_limit_mb: limits.memory_limit / (1024 * 1024),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: Option<PathBuf>,
}

/// Bolt configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub defaults: RunDefaults,
    pub scripting: ScriptingConfig,
    pub storage: StorageConfig,
}

impl Config {
    /// Load `config.toml` from the default config directory
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_config_dir().join("config.toml"))
    }

    /// Load from a specific file; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| BoltError::Config(format!("Failed to read config: {}", e)))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| BoltError::Config(format!("Invalid config TOML: {}", e)))?;
        if config.defaults.iterations == 0 {
            return Err(BoltError::Config("defaults.iterations must be at least 1".into()));
        }
        Ok(config)
    }

    /// Get the default config directory
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|p| p.join("bolt"))
            .unwrap_or_else(|| PathBuf::from(".bolt"))
    }

    /// Where environments, cookies and collections are stored
    pub fn data_dir(&self) -> PathBuf {
        self.storage.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .map(|p| p.join("bolt"))
                .unwrap_or_else(|| PathBuf::from(".bolt"))
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.defaults.timeout_secs)
    }

    pub fn run_delay(&self) -> Duration {
        Duration::from_millis(self.defaults.delay_ms)
    }

    pub fn sandbox_limits(&self) -> SandboxLimits {
        SandboxLimits {
            timeout: Duration::from_millis(self.scripting.timeout_ms),
            memory_limit: self.scripting.memory_limit_mb * 1024 * 1024,
            ..SandboxLimits::default()
        }
    }
}
