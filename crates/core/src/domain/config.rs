//! Configuration management for Warmth
//!
//! This module provides:
//! - Engine settings (sample rate, block size, channels, smoothing time)
//! - A TOML document pairing the engine settings with parameter values
//! - A manager for the user's default configuration file

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, error, info, instrument};

use crate::domain::audio::{BusLayout, ChannelCount, ProcessSpec};
use crate::domain::params::{ParameterState, ParameterStore};

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur during configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Processing settings of the strip
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Largest block the host will deliver, in frames
    pub block_size: usize,

    /// Channel count (1 or 2)
    pub channels: usize,

    /// Ramp time of every parameter smoother, in seconds
    pub smoothing_seconds: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            block_size: 512,
            channels: 2,
            smoothing_seconds: 0.25,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(ConfigError::Invalid("sample_rate must be positive".to_string()));
        }
        if self.block_size == 0 {
            return Err(ConfigError::Invalid("block_size must be positive".to_string()));
        }
        let supported = ChannelCount::from_count(self.channels)
            .map(BusLayout::symmetric)
            .is_some_and(|layout| layout.is_supported());
        if !supported {
            return Err(ConfigError::Invalid(format!(
                "channels must be 1 or 2, got {}",
                self.channels
            )));
        }
        if !self.smoothing_seconds.is_finite() || self.smoothing_seconds < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "smoothing_seconds must be zero or positive, got {}",
                self.smoothing_seconds
            )));
        }
        Ok(())
    }

    pub fn process_spec(&self) -> ProcessSpec {
        ProcessSpec::new(self.sample_rate as f32, self.block_size, self.channels)
    }
}

/// Complete Warmth configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WarmthConfig {
    #[serde(default)]
    pub engine: EngineConfig,

    /// Parameter values by identifier; missing entries keep their defaults
    #[serde(default)]
    pub parameters: ParameterState,
}

impl WarmthConfig {
    /// Capture the current values of a parameter store
    pub fn from_store(engine: EngineConfig, store: &ParameterStore) -> Self {
        Self {
            engine,
            parameters: store.snapshot(),
        }
    }

    /// Write the configured parameter values into a store
    pub fn apply_to(&self, store: &ParameterStore) -> usize {
        store.restore(&self.parameters)
    }

    /// Load configuration from TOML file
    #[instrument(skip(path))]
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let contents = fs::read_to_string(path).await?;
        let config: Self = toml::from_str(&contents)?;
        config.engine.validate()?;

        debug!(parameters = config.parameters.len(), "Configuration loaded successfully");
        Ok(config)
    }

    /// Save configuration to TOML file
    #[instrument(skip(self, path))]
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        info!(path = %path.display(), "Saving configuration");

        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let toml_str = toml::to_string_pretty(self)?;
        fs::write(path, toml_str).await?;

        debug!("Configuration saved successfully");
        Ok(())
    }

    /// Engine defaults with every parameter at its default value
    pub fn factory_default() -> Self {
        Self::from_store(EngineConfig::default(), &ParameterStore::new())
    }
}

/// Manager for the user's configuration file
///
/// Manages `~/.config/warmth/config.toml` (or the platform equivalent).
pub struct ConfigManager {
    config_dir: PathBuf,
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new(config_dir: PathBuf) -> Self {
        let config_path = config_dir.join("config.toml");
        Self {
            config_dir,
            config_path,
        }
    }

    /// Get the default config directory path
    ///
    /// Returns `~/.config/warmth` on Linux, the platform config directory
    /// elsewhere.
    pub fn default_config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join("warmth"))
            .ok_or_else(|| ConfigError::Invalid("Could not determine config directory".to_string()))
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load configuration from file
    ///
    /// A missing file yields (and writes) the factory default. A corrupt
    /// file is backed up next to the original and the factory default is
    /// returned.
    #[instrument(skip(self))]
    pub async fn load(&self) -> WarmthConfig {
        if !self.config_path.exists() {
            info!(
                path = %self.config_path.display(),
                "Config file not found, creating factory default"
            );

            let config = WarmthConfig::factory_default();
            if let Err(e) = config.save_to_file(&self.config_path).await {
                error!(
                    path = %self.config_path.display(),
                    error = %e,
                    "Failed to save factory default config"
                );
            }
            return config;
        }

        match WarmthConfig::load_from_file(&self.config_path).await {
            Ok(config) => config,
            Err(e) => {
                error!(
                    path = %self.config_path.display(),
                    error = %e,
                    "Failed to load config, using factory default"
                );

                let backup_path = self.config_path.with_extension("toml.corrupt");
                if let Err(copy_err) = fs::copy(&self.config_path, &backup_path).await {
                    error!(
                        path = %backup_path.display(),
                        error = %copy_err,
                        "Failed to backup corrupt config"
                    );
                }

                WarmthConfig::factory_default()
            }
        }
    }

    #[instrument(skip(self, config))]
    pub async fn save(&self, config: &WarmthConfig) -> Result<()> {
        fs::create_dir_all(&self.config_dir).await?;
        config.save_to_file(&self.config_path).await
    }

    pub fn exists(&self) -> bool {
        self.config_path.exists()
    }
}
