use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Worker pool parameters
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProcessingConfig {
    /// Number of workers draining the shared work queue.
    /// At most this many keys are transformed concurrently.
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,

    /// How long `stop` waits for in-flight processing before reporting a
    /// shutdown timeout (milliseconds)
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            worker_threads: default_worker_threads(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
        }
    }
}

impl ProcessingConfig {
    pub fn with_worker_threads(
        mut self,
        worker_threads: usize,
    ) -> Self {
        self.worker_threads = worker_threads;
        self
    }

    pub fn with_shutdown_timeout(
        mut self,
        timeout: Duration,
    ) -> Self {
        self.shutdown_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.worker_threads == 0 {
            return Err(Error::Config(ConfigError::Message(
                "worker_threads must be greater than 0".into(),
            )));
        }

        if self.shutdown_timeout_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "shutdown_timeout_ms must be at least 1ms".into(),
            )));
        }

        Ok(())
    }
}

fn default_worker_threads() -> usize {
    4
}
// in ms
fn default_shutdown_timeout_ms() -> u64 {
    1000
}
