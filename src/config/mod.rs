//! Configuration for the data-sync subsystem.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Configuration file support
//! - Environment variable overrides
mod sync;
pub use sync::*;

#[cfg(test)]
mod config_test;

use std::env;

use config::Config;
use config::Environment;
use config::File;

use crate::Result;

/// Prefix of environment overrides, e.g. `DATA_SYNC__REFRESH_INTERVAL_MS=5000`
pub const ENV_PREFIX: &str = "DATA_SYNC";

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
}

impl SyncConfig {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// Configuration sources are merged in the following order (later sources override earlier):
    /// 1. Type defaults (lowest priority)
    /// 2. Configuration file from `CONFIG_PATH` environment variable (if set)
    /// 3. Environment variables with `DATA_SYNC__` prefix (highest priority)
    ///
    /// # Note
    /// Validation is deferred so further overrides can be layered with
    /// `with_override_config()`. Call `validated()` before use.
    ///
    /// # Examples
    /// ```ignore
    /// std::env::set_var("DATA_SYNC__REFRESH_INTERVAL_MS", "5000");
    /// let cfg = SyncConfig::new()?.validated()?;
    /// ```
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        let config: Self = builder.add_source(env_source()).build()?.try_deserialize()?;
        Ok(config)
    }

    /// Applies additional configuration overrides from file without validation.
    ///
    /// Merging order (later sources override earlier):
    /// 1. Current configuration values
    /// 2. New configuration file
    /// 3. Latest environment variables (highest priority)
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(env_source())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Validates and returns the configuration.
    pub fn validated(self) -> Result<Self> {
        self.validate()?;
        Ok(self)
    }
}
