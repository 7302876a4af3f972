use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MonitoringConfig {
    /// Serve `/metrics` from the demo binary
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            metrics_port: default_metrics_port(),
        }
    }
}

impl MonitoringConfig {
    pub fn validate(&self) -> Result<()> {
        if self.enabled && self.metrics_port == 0 {
            return Err(Error::Config(ConfigError::Message(
                "metrics_port cannot be 0 when monitoring is enabled".into(),
            )));
        }
        Ok(())
    }
}

fn default_metrics_port() -> u16 {
    9000
}
