use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::trace;

use super::PriceProcessor;
use super::ProcessorError;
use super::RewritingPriceProcessor;
use crate::Price;

/// Sleeps for a fixed delay, then hands the price to the inner processor.
///
/// Simulates a slow downstream transform; used by the demo binary and by
/// tests exercising coalescing. When a cancellation token is attached, a
/// pending delay is cut short with [`ProcessorError::Interrupted`].
#[derive(Debug, Clone)]
pub struct DelayingPriceProcessor<P = RewritingPriceProcessor> {
    delay: Duration,
    inner: P,
    cancel: Option<CancellationToken>,
}

impl DelayingPriceProcessor<RewritingPriceProcessor> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            inner: RewritingPriceProcessor,
            cancel: None,
        }
    }
}

impl<P> DelayingPriceProcessor<P>
where P: PriceProcessor
{
    pub fn with_inner(
        delay: Duration,
        inner: P,
    ) -> Self {
        Self {
            delay,
            inner,
            cancel: None,
        }
    }

    /// Interrupt delays in progress once `cancel` fires.
    pub fn with_cancellation(
        mut self,
        cancel: CancellationToken,
    ) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

#[async_trait]
impl<P> PriceProcessor for DelayingPriceProcessor<P>
where P: PriceProcessor
{
    async fn process(
        &self,
        price: Price,
    ) -> std::result::Result<Price, ProcessorError> {
        if !self.delay.is_zero() {
            trace!(delay = ?self.delay, %price, "delaying price processing");
            match &self.cancel {
                Some(cancel) => {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            debug!(%price, "price processing interrupted");
                            return Err(ProcessorError::Interrupted);
                        }
                        _ = tokio::time::sleep(self.delay) => {}
                    }
                }
                None => tokio::time::sleep(self.delay).await,
            }
        }
        self.inner.process(price).await
    }
}
