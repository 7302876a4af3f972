use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::trace;
use tracing::warn;

use super::Admission;
use super::Entity;
use super::EntitySnapshot;
use super::PriceReader;
use super::PriceWorker;
use super::ReaderId;
use super::WorkQueue;
use crate::metrics::PRICE_COALESCED_TOTAL;
use crate::metrics::PRICE_PUTS_TOTAL;
use crate::metrics::REGISTERED_ENTITIES;
use crate::utils::async_task::join_with_deadline;
use crate::utils::async_task::spawn_task;
use crate::AccessError;
use crate::LifecycleError;
use crate::Price;
use crate::PriceProcessor;
use crate::ProcessingConfig;
use crate::Result;

/// Registry of entities plus the worker pool that processes them.
///
/// Cloning is cheap; every clone drives the same registry, queue and pool.
///
/// # Example
///
/// ```ignore
/// let holder = PriceHolder::new(RewritingPriceProcessor, ProcessingConfig::default());
/// holder.start()?;
///
/// let reader = holder.reader();
/// holder.put("AAPL", Decimal::from(100))?;
/// let next = reader.wait_for_next("AAPL", &CancellationToken::new()).await?;
///
/// holder.stop().await?;
/// ```
#[derive(Clone)]
pub struct PriceHolder {
    inner: Arc<HolderInner>,
}

struct HolderInner {
    entities: DashMap<Arc<str>, Arc<Entity>>,
    queue: Arc<WorkQueue>,
    processor: Arc<dyn PriceProcessor>,
    config: ProcessingConfig,
    /// `Some` while a pool is running
    pool: Mutex<Option<WorkerPool>>,
    next_reader_id: AtomicU64,
}

struct WorkerPool {
    shutdown: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl Drop for HolderInner {
    fn drop(&mut self) {
        // Workers only hold the queue and processor, so they never see the
        // holder go away on their own.
        if let Some(pool) = self.pool.get_mut().take() {
            debug!(workers = pool.handles.len(), "holder dropped while running, cancelling workers");
            pool.shutdown.cancel();
        }
    }
}

impl std::fmt::Debug for PriceHolder {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("PriceHolder")
            .field("entities", &self.inner.entities.len())
            .field("queued", &self.inner.queue.len())
            .field("running", &self.is_running())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl PriceHolder {
    /// Create a stopped holder. Call [`PriceHolder::start`] to begin processing.
    pub fn new<P>(
        processor: P,
        config: ProcessingConfig,
    ) -> Self
    where
        P: PriceProcessor,
    {
        Self::with_processor(Arc::new(processor), config)
    }

    pub fn with_processor(
        processor: Arc<dyn PriceProcessor>,
        config: ProcessingConfig,
    ) -> Self {
        Self {
            inner: Arc::new(HolderInner {
                entities: DashMap::new(),
                queue: Arc::new(WorkQueue::new()),
                processor,
                config,
                pool: Mutex::new(None),
                next_reader_id: AtomicU64::new(1),
            }),
        }
    }

    /// Allocate a fresh reader identity.
    pub fn next_reader_id(&self) -> ReaderId {
        ReaderId(self.inner.next_reader_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Create a reader handle with its own change baselines.
    pub fn reader(&self) -> PriceReader {
        PriceReader::new(self.next_reader_id(), self.clone())
    }

    /// Resolve `key`, creating its entity on first reference.
    pub fn get_or_create(
        &self,
        key: &str,
    ) -> Arc<Entity> {
        if let Some(entity) = self.inner.entities.get(key) {
            return entity.value().clone();
        }

        let key: Arc<str> = Arc::from(key);
        self.inner
            .entities
            .entry(key.clone())
            .or_insert_with(|| {
                REGISTERED_ENTITIES.inc();
                debug!(key = %key, "entity created");
                Arc::new(Entity::new(key))
            })
            .value()
            .clone()
    }

    /// Submit a new price for `key`.
    ///
    /// Never blocks. If a worker already owns the key the price replaces its
    /// pending value; otherwise the entity is queued for processing.
    pub fn put(
        &self,
        key: &str,
        price: Price,
    ) -> Result<()> {
        trace!(key, %price, "received");
        if key.is_empty() {
            return Err(AccessError::InvalidArgument("Entity name provided is empty".into()).into());
        }

        PRICE_PUTS_TOTAL.inc();
        let entity = self.get_or_create(key);
        match entity.claim_or_update(price) {
            Admission::Schedule => {
                self.inner.queue.push(entity);
                trace!(key, %price, "queued");
            }
            Admission::AlreadyScheduled => {
                PRICE_COALESCED_TOTAL.inc();
            }
        }
        Ok(())
    }

    /// Last published price for `key`, recorded as `reader`'s baseline.
    pub fn get(
        &self,
        reader: ReaderId,
        key: &str,
    ) -> Result<Option<Price>> {
        Ok(self.entity(key)?.record_read(reader))
    }

    /// Whether `key` published a price `reader` has not observed yet.
    pub fn has_changed(
        &self,
        reader: ReaderId,
        key: &str,
    ) -> Result<bool> {
        Ok(self.entity(key)?.has_changed_for(reader))
    }

    /// Suspend until `key` publishes a price `reader` has not observed yet.
    ///
    /// Fails with `Cancelled` if `cancel` fires first.
    pub async fn wait_for_next(
        &self,
        reader: ReaderId,
        key: &str,
        cancel: &CancellationToken,
    ) -> Result<Price> {
        let entity = self.entity(key)?;
        entity.wait_for_next_for(reader, cancel).await
    }

    /// Spin up the worker pool. No-op while a pool is already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> Result<()> {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(LifecycleError::RuntimeUnavailable.into());
        }

        let mut pool = self.inner.pool.lock();
        if pool.is_some() {
            debug!("price processing already running");
            return Ok(());
        }

        let shutdown = CancellationToken::new();
        let mut handles = Vec::with_capacity(self.inner.config.worker_threads);
        for id in 0..self.inner.config.worker_threads {
            let worker = PriceWorker::new(
                id,
                self.inner.queue.clone(),
                self.inner.processor.clone(),
                shutdown.clone(),
            );
            spawn_task(&format!("price-processing-{id}"), move || worker.run(), Some(&mut handles));
        }

        *pool = Some(WorkerPool { shutdown, handles });
        info!(
            workers = self.inner.config.worker_threads,
            queued = self.inner.queue.len(),
            "price processing started"
        );
        Ok(())
    }

    /// Stop the worker pool. No-op when not running.
    ///
    /// Workers stop taking entities off the queue; whatever they hold is
    /// finished. Entities still queued stay admitted until the next
    /// [`PriceHolder::start`].
    pub async fn stop(&self) -> Result<()> {
        warn!("Stop processing invoked");

        let pool = self.inner.pool.lock().take();
        let Some(pool) = pool else {
            return Ok(());
        };

        pool.shutdown.cancel();
        let timeout = self.inner.config.shutdown_timeout();
        let pending = join_with_deadline(pool.handles, timeout).await;
        if pending > 0 {
            return Err(LifecycleError::ShutdownTimeout { pending, timeout }.into());
        }

        info!(queued = self.inner.queue.len(), "price processing stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.inner.pool.lock().is_some()
    }

    pub fn entity_count(&self) -> usize {
        self.inner.entities.len()
    }

    /// Entities waiting for a worker
    pub fn queue_len(&self) -> usize {
        self.inner.queue.len()
    }

    pub fn keys(&self) -> Vec<String> {
        self.inner.entities.iter().map(|e| e.key().to_string()).collect()
    }

    pub fn snapshot(
        &self,
        key: &str,
    ) -> Result<EntitySnapshot> {
        Ok(self.entity(key)?.snapshot())
    }

    pub(crate) fn forget_reader(
        &self,
        reader: ReaderId,
    ) {
        for entity in self.inner.entities.iter() {
            entity.value().forget_reader(reader);
        }
    }

    fn entity(
        &self,
        key: &str,
    ) -> Result<Arc<Entity>> {
        self.inner
            .entities
            .get(key)
            .map(|e| e.value().clone())
            .ok_or_else(|| AccessError::NotFound { key: key.to_string() }.into())
    }
}
