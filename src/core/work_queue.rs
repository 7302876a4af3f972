use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use super::Entity;

/// FIFO queue of entities awaiting processing, shared by every worker.
///
/// An entity is only pushed by whoever flipped or kept its `admitted` flag,
/// so it appears at most once. The queue outlives worker pools: items left
/// here by `stop` are picked up after the next `start`.
#[derive(Debug)]
pub(crate) struct WorkQueue {
    sender: mpsc::UnboundedSender<Arc<Entity>>,
    receiver: Mutex<mpsc::UnboundedReceiver<Arc<Entity>>>,
    len: AtomicUsize,
}

impl WorkQueue {
    pub(crate) fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Mutex::new(receiver),
            len: AtomicUsize::new(0),
        }
    }

    pub(crate) fn push(
        &self,
        entity: Arc<Entity>,
    ) {
        self.len.fetch_add(1, Ordering::AcqRel);
        // The receiver is owned by `self`, so the channel cannot be closed here.
        if self.sender.send(entity).is_err() {
            self.len.fetch_sub(1, Ordering::AcqRel);
        }
    }

    /// Wait for the next entity. Returns `None` once `cancel` fires.
    pub(crate) async fn pop(
        &self,
        cancel: &CancellationToken,
    ) -> Option<Arc<Entity>> {
        let mut receiver = tokio::select! {
            biased;
            _ = cancel.cancelled() => return None,
            guard = self.receiver.lock() => guard,
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            entity = receiver.recv() => {
                if entity.is_some() {
                    self.len.fetch_sub(1, Ordering::AcqRel);
                }
                entity
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }
}
