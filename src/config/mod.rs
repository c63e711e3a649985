// src/config/mod.rs
mod schema;

use std::path::{Path, PathBuf};
use config::{Config as ConfigLoader, FileFormat};
use tracing::{info, warn};

pub use schema::{Config, RunnerConfig, ShellConfig};

use crate::error::{RunnerResult, RunnerError};

impl Config {
    /// Load configuration from a file or fall back to built-in defaults
    pub fn load(config_path: Option<&Path>) -> RunnerResult<Self> {
        info!("Loading configuration");

        let mut config_builder = ConfigLoader::builder();

        // Default configuration
        config_builder = config_builder.add_source(
            config::File::from_str(
                include_str!("../../config/default.toml"),
                FileFormat::Toml
            )
        );

        // User-provided configuration
        if let Some(path) = config_path {
            if path.exists() {
                config_builder = config_builder.add_source(config::File::from(path));
                info!("Loading user configuration from: {}", path.display());
            } else {
                warn!("Specified configuration file not found: {}", path.display());
            }
        } else {
            let default_path = Self::get_default_config_path();
            if default_path.exists() {
                config_builder = config_builder.add_source(config::File::from(default_path.as_path()));
                info!("Loading default configuration from: {}", default_path.display());
            } else {
                info!("No existing configuration found, using built-in defaults");
            }
        }

        // e.g. CSVRUNNER_RUNNER__MAX_WORKERS=8
        config_builder = config_builder.add_source(
            config::Environment::with_prefix("CSVRUNNER")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
        );

        let config: Config = match config_builder.build() {
            Ok(c) => match c.try_deserialize() {
                Ok(config) => config,
                Err(e) => return Err(RunnerError::ConfigError(format!("Failed to parse configuration: {}", e))),
            },
            Err(e) => return Err(RunnerError::ConfigError(format!("Failed to build configuration: {}", e))),
        };

        config.runner.validate()?;

        Ok(config)
    }

    /// Get the default configuration path
    pub fn get_default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".csvrunner/config.toml")
    }

    /// Write the default configuration to the default location
    pub fn init(force: bool) -> RunnerResult<PathBuf> {
        let config_path = Self::get_default_config_path();
        Config::default().init_at(&config_path, force)?;
        Ok(config_path)
    }

    /// Write this configuration to `path`, creating parent directories
    pub fn init_at(&self, path: &Path, force: bool) -> RunnerResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| RunnerError::ConfigError(
                    format!("Failed to create directory {}: {}", parent.display(), e)
                ))?;
        }

        if path.exists() && !force {
            return Err(RunnerError::ConfigError(
                format!("Configuration already exists at {}. Use --force to overwrite.", path.display())
            ));
        }

        self.save(path)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> RunnerResult<()> {
        let config_str = toml::to_string_pretty(self)
            .map_err(|e| RunnerError::SerializationError(format!("Failed to serialize configuration: {}", e)))?;

        std::fs::write(path, config_str)
            .map_err(|e| RunnerError::ConfigError(
                format!("Failed to write configuration to {}: {}", path.display(), e)
            ))?;

        info!("Configuration saved to {}", path.display());

        Ok(())
    }
}

impl RunnerConfig {
    /// Reject settings the worker pool cannot run with
    pub fn validate(&self) -> RunnerResult<()> {
        if self.max_workers == 0 {
            return Err(RunnerError::ConfigError("max_workers must be a positive integer".to_string()));
        }
        Ok(())
    }
}
