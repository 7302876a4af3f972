use std::fmt;

use tokio_util::sync::CancellationToken;

use super::PriceHolder;
use crate::Price;
use crate::Result;

/// Identity of a reader for change tracking.
///
/// Allocated by [`PriceHolder::next_reader_id`]; never reused within a holder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReaderId(pub(crate) u64);

impl ReaderId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ReaderId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "reader-{}", self.0)
    }
}

/// A reader's view of a [`PriceHolder`].
///
/// Each handle tracks, per key, the last price it observed, independently
/// of every other handle. Dropping the handle discards those baselines.
#[derive(Debug)]
pub struct PriceReader {
    id: ReaderId,
    holder: PriceHolder,
}

impl PriceReader {
    pub(crate) fn new(
        id: ReaderId,
        holder: PriceHolder,
    ) -> Self {
        Self { id, holder }
    }

    pub fn id(&self) -> ReaderId {
        self.id
    }

    /// See [`PriceHolder::get`]
    pub fn get(
        &self,
        key: &str,
    ) -> Result<Option<Price>> {
        self.holder.get(self.id, key)
    }

    /// See [`PriceHolder::has_changed`]
    pub fn has_changed(
        &self,
        key: &str,
    ) -> Result<bool> {
        self.holder.has_changed(self.id, key)
    }

    /// See [`PriceHolder::wait_for_next`]
    pub async fn wait_for_next(
        &self,
        key: &str,
        cancel: &CancellationToken,
    ) -> Result<Price> {
        self.holder.wait_for_next(self.id, key, cancel).await
    }
}

impl Drop for PriceReader {
    fn drop(&mut self) {
        self.holder.forget_reader(self.id);
    }
}
