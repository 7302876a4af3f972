use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use super::Entity;
use super::Requeue;
use super::WorkQueue;
use crate::metrics::ENTITY_REQUEUES_TOTAL;
use crate::metrics::TRANSFORM_FAILURES_TOTAL;
use crate::metrics::TRANSFORM_INVOCATIONS_TOTAL;
use crate::Price;
use crate::PriceProcessor;
use crate::ProcessingError;
use crate::Result;

/// One slot of the worker pool.
///
/// Drains the shared queue until `shutdown` fires. The item in hand when
/// shutdown is signalled is always carried through publish and requeue.
pub(crate) struct PriceWorker {
    id: usize,
    queue: Arc<WorkQueue>,
    processor: Arc<dyn PriceProcessor>,
    shutdown: CancellationToken,
}

impl PriceWorker {
    pub(crate) fn new(
        id: usize,
        queue: Arc<WorkQueue>,
        processor: Arc<dyn PriceProcessor>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            id,
            queue,
            processor,
            shutdown,
        }
    }

    pub(crate) async fn run(self) -> Result<()> {
        debug!(worker = self.id, "price worker started");

        while let Some(entity) = self.queue.pop(&self.shutdown).await {
            trace!(worker = self.id, key = entity.key(), "took entity");
            self.process(&entity).await;
            self.requeue_if_needed(entity);
        }

        debug!(worker = self.id, "price worker stopped");
        Ok(())
    }

    async fn process(
        &self,
        entity: &Entity,
    ) {
        let Some(price) = entity.take_pending() else {
            return;
        };

        TRANSFORM_INVOCATIONS_TOTAL.inc();
        match self.transform(entity.key(), price).await {
            Ok(processed) => {
                entity.publish(processed);
                debug!(worker = self.id, key = entity.key(), %price, %processed, "processed");
            }
            Err(e) => {
                TRANSFORM_FAILURES_TOTAL.inc();
                warn!(worker = self.id, key = entity.key(), "{}", e);
            }
        }
    }

    async fn transform(
        &self,
        key: &str,
        price: Price,
    ) -> Result<Price> {
        match AssertUnwindSafe(self.processor.process(price)).catch_unwind().await {
            Ok(Ok(processed)) => Ok(processed),
            Ok(Err(source)) => Err(ProcessingError::TransformFailed {
                key: key.to_string(),
                price: price.to_string(),
                source,
            }
            .into()),
            Err(panic) => Err(ProcessingError::TransformPanicked {
                key: key.to_string(),
                price: price.to_string(),
                message: panic_message(panic.as_ref()),
            }
            .into()),
        }
    }

    fn requeue_if_needed(
        &self,
        entity: Arc<Entity>,
    ) {
        match entity.try_requeue() {
            Requeue::Reschedule => {
                ENTITY_REQUEUES_TOTAL.inc();
                debug!(worker = self.id, key = entity.key(), "requeued");
                self.queue.push(entity);
            }
            Requeue::Idle => {
                trace!(worker = self.id, key = entity.key(), "idle");
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
