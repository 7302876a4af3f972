//! Coalescing price distribution core.
//!
//! Data flow:
//!
//! ```text
//! put(key, price) ──► Entity::claim_or_update ──(Schedule)──► WorkQueue
//!                                                               │
//!                      ┌────────────────────────────────────────┘
//!                      ▼
//!               PriceWorker: take_pending ─► PriceProcessor ─► Entity::publish
//!                      │                                            │
//!                      └── Entity::try_requeue ──(Reschedule)──► WorkQueue
//!                                                                   │
//!             readers: get / has_changed / wait_for_next ◄──────────┘ (change signal)
//! ```
//!
//! Only the producer that flips an entity from idle to admitted queues it, and
//! only the worker holding it may requeue it, so each key occupies at most one
//! queue slot and one worker at any time no matter how fast it is updated.

mod entity;
mod holder;
mod reader;
mod work_queue;
mod worker;

pub use entity::*;
pub use holder::*;
pub use reader::*;
pub(crate) use work_queue::*;
pub(crate) use worker::*;

#[cfg(test)]
mod worker_test;

/// Price domain. Equality is numeric: `10` equals `10.00`.
pub type Price = rust_decimal::Decimal;
