//! Configuration management for the price holder and its demo harness.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Configuration file support
//! - Environment variable overrides
//! - Section-wise validation
mod demo;
mod monitoring;
mod processing;
pub use demo::*;
pub use monitoring::*;
pub use processing::*;


use std::env;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

/// Prefix of environment overrides, e.g. `PRICE__PROCESSING__WORKER_THREADS=8`
const ENV_PREFIX: &str = "PRICE";

/// Main configuration container
///
/// Sources are merged with later ones overriding earlier ones:
/// 1. Default values from code
/// 2. Configuration file specified by `CONFIG_PATH`
/// 3. Environment variables (highest priority)
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct PriceHolderConfig {
    /// Worker pool parameters
    #[serde(default)]
    pub processing: ProcessingConfig,
    /// Metrics exposition
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    /// Synthetic load generator used by the binary
    #[serde(default)]
    pub demo: DemoConfig,
}

impl PriceHolderConfig {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// Callers MUST call `validate()` before using the configuration.
    ///
    /// # Examples
    /// ```ignore
    /// std::env::set_var("CONFIG_PATH", "config/prices.toml");
    /// std::env::set_var("PRICE__PROCESSING__WORKER_THREADS", "8");
    /// let cfg = PriceHolderConfig::new()?.validate()?;
    /// ```
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(environment());

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Applies additional overrides from `path` without validation.
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
            .add_source(environment())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Validates every section and returns the validated instance.
    pub fn validate(self) -> Result<Self> {
        self.processing.validate()?;
        self.monitoring.validate()?;
        self.demo.validate()?;
        Ok(self)
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
}
