use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::*;
use crate::test_utils::enable_logger;
use crate::test_utils::price;
use crate::test_utils::wait_until;
use crate::test_utils::within;
use crate::MockPriceProcessor;
use crate::ProcessorError;

struct Harness {
    queue: Arc<WorkQueue>,
    shutdown: CancellationToken,
    handle: JoinHandle<crate::Result<()>>,
}

fn spawn_worker(processor: MockPriceProcessor) -> Harness {
    enable_logger();
    let queue = Arc::new(WorkQueue::new());
    let shutdown = CancellationToken::new();
    let worker = PriceWorker::new(0, queue.clone(), Arc::new(processor), shutdown.clone());
    let handle = tokio::spawn(worker.run());
    Harness {
        queue,
        shutdown,
        handle,
    }
}

fn admit(
    queue: &WorkQueue,
    entity: &Arc<Entity>,
    value: i64,
) {
    if entity.claim_or_update(price(value)) == Admission::Schedule {
        queue.push(entity.clone());
    }
}

async fn settled(entity: &Entity) -> bool {
    wait_until(Duration::from_secs(1), || !entity.is_admitted()).await
}

#[tokio::test]
async fn processed_price_is_published_and_entity_goes_idle() {
    let mut processor = MockPriceProcessor::new();
    processor.expect_process().times(1).returning(|p| Ok(p * price(2)));
    let harness = spawn_worker(processor);
    let entity = Arc::new(Entity::new(Arc::from("AAPL")));

    admit(&harness.queue, &entity, 50);

    assert!(settled(&entity).await);
    assert_eq!(entity.published(), Some(price(100)));
    assert_eq!(entity.snapshot().pending, None);

    harness.shutdown.cancel();
    within(Duration::from_secs(1), harness.handle).await.unwrap().unwrap();
}

#[tokio::test]
async fn failed_transform_does_not_orphan_entity() {
    let mut processor = MockPriceProcessor::new();
    processor
        .expect_process()
        .times(2)
        .returning(|p| if p == price(13) { Err(ProcessorError::Rejected("unlucky".into())) } else { Ok(p) });
    let harness = spawn_worker(processor);
    let entity = Arc::new(Entity::new(Arc::from("AAPL")));

    admit(&harness.queue, &entity, 13);
    assert!(settled(&entity).await);
    assert_eq!(entity.published(), None);

    // Still schedulable after the failure
    admit(&harness.queue, &entity, 14);
    assert!(settled(&entity).await);
    assert_eq!(entity.published(), Some(price(14)));

    harness.shutdown.cancel();
    within(Duration::from_secs(1), harness.handle).await.unwrap().unwrap();
}

struct PanicOnZero;

#[async_trait::async_trait]
impl crate::PriceProcessor for PanicOnZero {
    async fn process(
        &self,
        p: crate::Price,
    ) -> std::result::Result<crate::Price, ProcessorError> {
        if p.is_zero() {
            panic!("division by zero");
        }
        Ok(p)
    }
}

#[tokio::test]
async fn panicking_transform_is_isolated() {
    enable_logger();
    let queue = Arc::new(WorkQueue::new());
    let shutdown = CancellationToken::new();
    let worker = PriceWorker::new(0, queue.clone(), Arc::new(PanicOnZero), shutdown.clone());
    let handle = tokio::spawn(worker.run());
    let entity = Arc::new(Entity::new(Arc::from("AAPL")));

    admit(&queue, &entity, 0);
    assert!(settled(&entity).await);
    assert_eq!(entity.published(), None);

    admit(&queue, &entity, 7);
    assert!(settled(&entity).await);
    assert_eq!(entity.published(), Some(price(7)));
    assert!(!handle.is_finished());

    shutdown.cancel();
    within(Duration::from_secs(1), handle).await.unwrap().unwrap();
}

#[tokio::test]
async fn price_submitted_during_failed_attempt_is_still_processed() {
    let entity = Arc::new(Entity::new(Arc::from("AAPL")));
    let racing = entity.clone();
    let mut processor = MockPriceProcessor::new();
    processor.expect_process().times(2).returning(move |p| {
        if p == price(100) {
            // Put racing with the transform
            racing.claim_or_update(price(102));
            return Err(ProcessorError::Other("upstream unavailable".into()));
        }
        Ok(p)
    });
    let harness = spawn_worker(processor);

    admit(&harness.queue, &entity, 100);

    assert!(settled(&entity).await);
    assert_eq!(entity.published(), Some(price(102)));

    harness.shutdown.cancel();
    within(Duration::from_secs(1), harness.handle).await.unwrap().unwrap();
}

#[tokio::test]
async fn worker_exits_on_shutdown_and_leaves_queue_intact() {
    let mut processor = MockPriceProcessor::new();
    processor.expect_process().times(0);
    let harness = spawn_worker(processor);

    harness.shutdown.cancel();
    within(Duration::from_secs(1), harness.handle).await.unwrap().unwrap();

    let entity = Arc::new(Entity::new(Arc::from("AAPL")));
    admit(&harness.queue, &entity, 1);
    assert_eq!(harness.queue.len(), 1);
    assert!(entity.is_admitted());
}
