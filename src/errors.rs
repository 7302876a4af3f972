//! Price Holder Error Hierarchy
//!
//! Errors are grouped by who sees them:
//! - [`AccessError`] is returned synchronously to producers and readers.
//! - [`ProcessingError`] stays inside the worker pool; it is logged and
//!   counted, never handed to a producer or reader.
//! - [`LifecycleError`] is returned to whoever drives `start`/`stop`.

use std::time::Duration;

use config::ConfigError;

use crate::ProcessorError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Producer/reader facing failures
    #[error(transparent)]
    Access(#[from] AccessError),

    /// Transform failures isolated to a single processing attempt
    #[error(transparent)]
    Processing(#[from] ProcessingError),

    /// Worker pool start/stop failures
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// Configuration loading and validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    /// Empty key handed to `put`
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Key was never referenced by `put` or `get_or_create`
    #[error("Entity: \"{key}\" does not exist")]
    NotFound { key: String },

    /// The waiting context was cancelled before a new price was published
    #[error("Wait for next price on \"{key}\" was cancelled")]
    Cancelled { key: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    /// Processor returned an error for the given input
    #[error("Processing price {price} for \"{key}\" failed: {source}")]
    TransformFailed {
        key: String,
        price: String,
        #[source]
        source: ProcessorError,
    },

    /// Processor panicked while handling the given input
    #[error("Processor panicked while handling price {price} for \"{key}\": {message}")]
    TransformPanicked {
        key: String,
        price: String,
        message: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// Workers did not finish within the configured deadline
    #[error("{pending} processing worker(s) still running after {timeout:?}")]
    ShutdownTimeout { pending: usize, timeout: Duration },

    /// `start` was called outside of a tokio runtime
    #[error("Worker pool requires a running tokio runtime")]
    RuntimeUnavailable,

    /// OS signal handler could not be registered
    #[error("Failed to install signal handler: {0}")]
    SignalInstallFailed(String),

    #[error("{0}")]
    SignalSendFailed(String),
}

impl Error {
    /// True for the producer/reader facing `NotFound` condition
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Access(AccessError::NotFound { .. }))
    }

    /// True when a blocked wait was cancelled
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Access(AccessError::Cancelled { .. }))
    }

    /// True for the `InvalidArgument` condition
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Error::Access(AccessError::InvalidArgument(_)))
    }
}
