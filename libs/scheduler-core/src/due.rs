//! Ordered index of card due times.
//!
//! Cards are keyed by `(due_at, card_id)`, which is exactly the order due
//! queries must return, so a range scan up to the cutoff yields a sorted,
//! deterministic result without a separate sort step.

use std::collections::{BTreeSet, HashMap};
use std::ops::Bound;

use chrono::{DateTime, Utc};

/// Sort key for due queries: ascending due time, ties broken by card id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DueKey {
    pub due_at: DateTime<Utc>,
    pub card_id: i64,
}

impl DueKey {
    pub fn new(due_at: DateTime<Utc>, card_id: i64) -> Self {
        Self { due_at, card_id }
    }
}

/// Due-time index. Each card appears at most once.
#[derive(Debug, Clone, Default)]
pub struct DueIndex {
    ordered: BTreeSet<DueKey>,
    positions: HashMap<i64, DateTime<Utc>>,
}

impl DueIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Insert a card or move it to a new due time.
    pub fn upsert(&mut self, card_id: i64, due_at: DateTime<Utc>) {
        if let Some(previous) = self.positions.insert(card_id, due_at) {
            self.ordered.remove(&DueKey::new(previous, card_id));
        }
        self.ordered.insert(DueKey::new(due_at, card_id));
    }

    /// Remove a card. Returns whether it was indexed.
    pub fn remove(&mut self, card_id: i64) -> bool {
        match self.positions.remove(&card_id) {
            Some(due_at) => {
                self.ordered.remove(&DueKey::new(due_at, card_id));
                true
            }
            None => false,
        }
    }

    /// Cards due at or before `cutoff`, in due order.
    ///
    /// The iterator borrows the index, so it can be restarted by calling again.
    pub fn due_until(&self, cutoff: DateTime<Utc>) -> impl Iterator<Item = DueKey> + '_ {
        let upper = DueKey::new(cutoff, i64::MAX);
        self.ordered
            .range((Bound::Unbounded, Bound::Included(upper)))
            .copied()
    }
}

/// Sort due cards in place by `(due_at, card_id)`.
pub fn sort_by_due<T>(items: &mut [T], key: impl Fn(&T) -> DueKey) {
    items.sort_by_key(key);
}
