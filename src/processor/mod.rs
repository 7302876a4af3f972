//! The `PriceProcessor` is the pluggable transform applied by the worker
//! pool to the latest pending price of a key before it is published.
//!
//! The holder guarantees that, for a given key, `process` is never invoked
//! concurrently with itself. Intermediate prices submitted while a key is
//! being processed are coalesced away: only the value pending at dequeue
//! time reaches the processor.
//!
//! A processor may be slow (that is the reason coalescing exists) and may
//! fail. A failure is isolated to the attempt that produced it.

mod delaying;
mod rewriting;
pub use delaying::*;
pub use rewriting::*;


use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::Price;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait PriceProcessor: Send + Sync + 'static {
    /// Produce the price to publish for `price`.
    async fn process(
        &self,
        price: Price,
    ) -> std::result::Result<Price, ProcessorError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    /// The processor refused the input
    #[error("Price rejected: {0}")]
    Rejected(String),

    /// The processor was interrupted before producing a value
    #[error("Processing interrupted")]
    Interrupted,

    #[error("{0}")]
    Other(String),
}
