use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::trace;

use super::ReaderId;
use crate::AccessError;
use crate::Error;
use crate::Price;
use crate::Result;

/// Outcome of [`Entity::claim_or_update`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The entity was idle; the caller must push it onto the work queue.
    Schedule,
    /// A worker already owns the entity; the pending price was replaced.
    AlreadyScheduled,
}

/// Outcome of [`Entity::try_requeue`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requeue {
    /// A newer price is waiting; the entity stays admitted and must be queued again.
    Reschedule,
    /// Nothing left to process; the entity can be admitted by the next `put`.
    Idle,
}

/// Point-in-time copy of an entity's state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySnapshot {
    pub key: Arc<str>,
    pub published: Option<Price>,
    pub pending: Option<Price>,
    pub admitted: bool,
    pub version: u64,
    pub readers: usize,
}

#[derive(Debug, Default)]
struct EntityState {
    published: Option<Price>,
    /// Latest submitted price not yet taken by a worker
    pending: Option<Price>,
    /// Queued or being processed
    admitted: bool,
    /// Bumped on every publish
    version: u64,
    baselines: HashMap<ReaderId, Price>,
}

impl EntityState {
    fn changed_for(
        &self,
        reader: ReaderId,
    ) -> Option<Price> {
        let published = self.published?;
        match self.baselines.get(&reader) {
            Some(seen) if *seen == published => None,
            _ => Some(published),
        }
    }
}

/// Per-key state holder.
///
/// Every field that takes part in an admission, requeue or change decision
/// lives behind one mutex, so a `put` racing with a worker's requeue check
/// is linearized either before or after it. The change signal carries the
/// publish version and is only written while that mutex is held.
#[derive(Debug)]
pub struct Entity {
    key: Arc<str>,
    state: Mutex<EntityState>,
    version_tx: watch::Sender<u64>,
}

impl Entity {
    pub(crate) fn new(key: Arc<str>) -> Self {
        let (version_tx, _) = watch::channel(0);
        Self {
            key,
            state: Mutex::new(EntityState::default()),
            version_tx,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Last price produced by a worker, if any.
    pub fn published(&self) -> Option<Price> {
        self.state.lock().published
    }

    pub fn is_admitted(&self) -> bool {
        self.state.lock().admitted
    }

    /// Store a processed price and wake every waiter.
    ///
    /// Waiters are woken even when the price equals the previous one; each
    /// re-checks against its own baseline.
    pub fn publish(
        &self,
        price: Price,
    ) {
        let mut state = self.state.lock();
        state.published = Some(price);
        state.version += 1;
        self.version_tx.send_replace(state.version);
        trace!(key = %self.key, %price, version = state.version, "published");
    }

    /// Admission control for producers.
    ///
    /// Always replaces the pending price. Only the call that flips the
    /// entity from idle to admitted is told to schedule it.
    pub fn claim_or_update(
        &self,
        price: Price,
    ) -> Admission {
        let mut state = self.state.lock();
        state.pending = Some(price);
        if state.admitted {
            trace!(key = %self.key, %price, "coalesced into pending");
            Admission::AlreadyScheduled
        } else {
            state.admitted = true;
            Admission::Schedule
        }
    }

    /// Hand the pending price to the worker that owns this entity.
    pub(crate) fn take_pending(&self) -> Option<Price> {
        self.state.lock().pending.take()
    }

    /// Decide, after a processing attempt, whether the entity needs another round.
    ///
    /// Reschedules only when a price submitted during processing is still
    /// pending and differs from what is now published. Otherwise any leftover
    /// pending price is dropped and the entity goes idle.
    pub fn try_requeue(&self) -> Requeue {
        let mut state = self.state.lock();
        match state.pending {
            Some(pending) if Some(pending) != state.published => Requeue::Reschedule,
            _ => {
                state.pending = None;
                state.admitted = false;
                Requeue::Idle
            }
        }
    }

    /// Return the published price and remember it as `reader`'s baseline.
    pub fn record_read(
        &self,
        reader: ReaderId,
    ) -> Option<Price> {
        let mut state = self.state.lock();
        let published = state.published;
        if let Some(price) = published {
            state.baselines.insert(reader, price);
        }
        published
    }

    /// Whether the published price differs from what `reader` last observed.
    ///
    /// A reader that never observed this entity sees any published price as a
    /// change. Nothing published yet means nothing changed.
    pub fn has_changed_for(
        &self,
        reader: ReaderId,
    ) -> bool {
        self.state.lock().changed_for(reader).is_some()
    }

    /// Suspend until the published price differs from `reader`'s baseline.
    ///
    /// The observed price becomes the new baseline. Returns
    /// [`AccessError::Cancelled`] if `cancel` fires first.
    pub async fn wait_for_next_for(
        &self,
        reader: ReaderId,
        cancel: &CancellationToken,
    ) -> Result<Price> {
        // Subscribe before the first check so a publish in between is not missed.
        let mut changes = self.version_tx.subscribe();

        loop {
            if let Some(price) = self.observe_if_changed(reader) {
                debug!(key = %self.key, %reader, %price, "next price observed");
                return Ok(price);
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(key = %self.key, %reader, "wait for next price cancelled");
                    return Err(AccessError::Cancelled { key: self.key.to_string() }.into());
                }
                changed = changes.changed() => {
                    if changed.is_err() {
                        return Err(Error::Fatal(format!("change signal for \"{}\" closed", self.key)));
                    }
                }
            }
        }
    }

    /// Drop `reader`'s baseline.
    pub(crate) fn forget_reader(
        &self,
        reader: ReaderId,
    ) {
        self.state.lock().baselines.remove(&reader);
    }

    pub fn snapshot(&self) -> EntitySnapshot {
        let state = self.state.lock();
        EntitySnapshot {
            key: self.key.clone(),
            published: state.published,
            pending: state.pending,
            admitted: state.admitted,
            version: state.version,
            readers: state.baselines.len(),
        }
    }

    fn observe_if_changed(
        &self,
        reader: ReaderId,
    ) -> Option<Price> {
        let mut state = self.state.lock();
        let price = state.changed_for(reader)?;
        state.baselines.insert(reader, price);
        Some(price)
    }
}
