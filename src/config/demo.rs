use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Synthetic load for the demo binary
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DemoConfig {
    /// Keys are named `0..entity_count`
    #[serde(default = "default_entity_count")]
    pub entity_count: u32,

    /// Generated prices fall in `[0, max_price)`
    #[serde(default = "default_max_price")]
    pub max_price: u32,

    #[serde(default = "default_put_interval_ms")]
    pub put_interval_ms: u64,

    #[serde(default = "default_get_interval_ms")]
    pub get_interval_ms: u64,

    /// Artificial processor latency
    #[serde(default)]
    pub process_delay_ms: u64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            entity_count: default_entity_count(),
            max_price: default_max_price(),
            put_interval_ms: default_put_interval_ms(),
            get_interval_ms: default_get_interval_ms(),
            process_delay_ms: 0,
        }
    }
}

impl DemoConfig {
    pub fn put_interval(&self) -> Duration {
        Duration::from_millis(self.put_interval_ms)
    }

    pub fn get_interval(&self) -> Duration {
        Duration::from_millis(self.get_interval_ms)
    }

    pub fn process_delay(&self) -> Duration {
        Duration::from_millis(self.process_delay_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.entity_count == 0 {
            return Err(Error::Config(ConfigError::Message(
                "entity_count must be greater than 0".into(),
            )));
        }

        if self.max_price == 0 {
            return Err(Error::Config(ConfigError::Message(
                "max_price must be greater than 0".into(),
            )));
        }

        if self.put_interval_ms == 0 || self.get_interval_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "put_interval_ms and get_interval_ms cannot be 0".into(),
            )));
        }

        Ok(())
    }
}

fn default_entity_count() -> u32 {
    10
}
fn default_max_price() -> u32 {
    10_000
}
fn default_put_interval_ms() -> u64 {
    1
}
fn default_get_interval_ms() -> u64 {
    500
}
