use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::Price;
use crate::PriceProcessor;
use crate::ProcessorError;

/// Identity processor that records every input, optionally after a delay.
pub struct RecordingPriceProcessor {
    delay: Duration,
    inputs: Mutex<Vec<Price>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    count_tx: watch::Sender<usize>,
}

impl RecordingPriceProcessor {
    pub fn new(delay: Duration) -> Self {
        let (count_tx, _) = watch::channel(0);
        Self {
            delay,
            inputs: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            count_tx,
        }
    }

    pub fn inputs(&self) -> Vec<Price> {
        self.inputs.lock().clone()
    }

    pub fn invocation_count(&self) -> usize {
        *self.count_tx.borrow()
    }

    /// Highest number of concurrent `process` calls observed
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Wait until at least `count` invocations completed.
    pub async fn wait_for_invocations(
        &self,
        count: usize,
        timeout: Duration,
    ) -> bool {
        let mut rx = self.count_tx.subscribe();
        let reached = tokio::time::timeout(timeout, rx.wait_for(|c| *c >= count)).await.is_ok();
        reached
    }
}

#[async_trait]
impl PriceProcessor for RecordingPriceProcessor {
    async fn process(
        &self,
        price: Price,
    ) -> std::result::Result<Price, ProcessorError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        self.inputs.lock().push(price);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.count_tx.send_modify(|c| *c += 1);
        Ok(price)
    }
}
