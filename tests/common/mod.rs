#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use price_holder::Price;
use price_holder::PriceHolder;
use price_holder::PriceProcessor;
use price_holder::ProcessingConfig;
use price_holder::ProcessorError;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

pub const WAIT_FOR_SETTLE_IN_SEC: u64 = 10;

pub const WORKER_THREADS: usize = 4;

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
});

pub fn enable_logger() {
    *LOGGER_INIT;
}

/// Identity processor that counts invocations per input price.
pub struct CountingPriceProcessor {
    delay: Duration,
    seen: Mutex<Vec<Price>>,
    total_tx: watch::Sender<usize>,
}

impl CountingPriceProcessor {
    pub fn new(delay: Duration) -> Self {
        let (total_tx, _) = watch::channel(0);
        Self {
            delay,
            seen: Mutex::new(Vec::new()),
            total_tx,
        }
    }

    pub fn seen(&self) -> Vec<Price> {
        self.seen.lock().clone()
    }

    pub fn invocations_by_price(&self) -> HashMap<Price, usize> {
        let mut counts = HashMap::new();
        for price in self.seen.lock().iter() {
            *counts.entry(*price).or_insert(0) += 1;
        }
        counts
    }

    pub async fn wait_for_invocations(
        &self,
        count: usize,
    ) -> bool {
        let mut rx = self.total_tx.subscribe();
        let reached = tokio::time::timeout(Duration::from_secs(WAIT_FOR_SETTLE_IN_SEC), rx.wait_for(|n| *n >= count))
            .await
            .is_ok();
        reached
    }
}

#[async_trait]
impl PriceProcessor for CountingPriceProcessor {
    async fn process(
        &self,
        price: Price,
    ) -> std::result::Result<Price, ProcessorError> {
        self.seen.lock().push(price);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.total_tx.send_modify(|n| *n += 1);
        Ok(price)
    }
}

pub fn start_holder(processor: Arc<dyn PriceProcessor>) -> PriceHolder {
    enable_logger();
    let holder =
        PriceHolder::with_processor(processor, ProcessingConfig::default().with_worker_threads(WORKER_THREADS));
    holder.start().expect("holder should start inside a runtime");
    holder
}

/// Wait until no key is admitted for processing.
pub async fn wait_for_settle(holder: &PriceHolder) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(WAIT_FOR_SETTLE_IN_SEC);
    while tokio::time::Instant::now() < deadline {
        let busy = holder
            .keys()
            .iter()
            .any(|key| holder.snapshot(key).map(|s| s.admitted).unwrap_or(false));
        if !busy && holder.queue_len() == 0 {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
