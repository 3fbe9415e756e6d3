//! Pending-write queue.
//!
//! Writes that cannot reach the remote immediately are appended here with a
//! temporary identifier. Each record kind has its own cache slot; order is
//! append order and there is no deduplication. Persistence is fail-open, like
//! the rest of the cache.

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::cache::{CacheManager, CacheSlot};
use crate::models::{pending_id, Category, Draft, Expense};
use crate::store::KeyValueStore;

/// Which pending queue to address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PendingKind {
    Expense,
    Category,
}

impl PendingKind {
    pub fn slot(&self) -> CacheSlot {
        match self {
            PendingKind::Expense => CacheSlot::PendingExpenses,
            PendingKind::Category => CacheSlot::PendingCategories,
        }
    }
}

impl std::fmt::Display for PendingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PendingKind::Expense => write!(f, "expense"),
            PendingKind::Category => write!(f, "category"),
        }
    }
}

/// A record type that can sit in a pending queue.
pub trait PendingRecord: Clone + Serialize + DeserializeOwned {
    const KIND: PendingKind;

    fn id(&self) -> &str;
}

impl PendingRecord for Expense {
    const KIND: PendingKind = PendingKind::Expense;

    fn id(&self) -> &str {
        &self.id
    }
}

impl PendingRecord for Category {
    const KIND: PendingKind = PendingKind::Category;

    fn id(&self) -> &str {
        &self.id
    }
}

pub struct PendingQueue<'a, S> {
    cache: &'a CacheManager<S>,
}

impl<'a, S: KeyValueStore> PendingQueue<'a, S> {
    pub fn new(cache: &'a CacheManager<S>) -> Self {
        Self { cache }
    }

    /// Append a draft with a fresh temporary id and persist the whole queue.
    ///
    /// Returns the queued record even if persisting it failed; the failure is
    /// logged.
    pub fn enqueue<D>(&self, draft: D) -> D::Record
    where
        D: Draft,
        D::Record: PendingRecord,
    {
        let record = draft.into_record(pending_id());
        let mut pending: Vec<D::Record> = self.peek();
        pending.push(record.clone());
        self.persist(&pending);
        let kind = <D::Record as PendingRecord>::KIND;
        debug!(
            kind = %kind,
            id = record.id(),
            queued = pending.len(),
            "Queued pending record"
        );
        record
    }

    /// Current queue in append order, without modifying it.
    pub fn peek<R: PendingRecord>(&self) -> Vec<R> {
        match self.cache.read(R::KIND.slot()) {
            Ok(records) => records,
            Err(e) => {
                warn!(kind = %R::KIND, error = %e, "Failed to read pending queue, using empty list");
                Vec::new()
            }
        }
    }

    /// Take the whole queue, removing its slot.
    pub fn drain<R: PendingRecord>(&self) -> Vec<R> {
        let records = self.peek();
        self.clear(R::KIND);
        records
    }

    /// Overwrite the queue. An empty list removes the slot.
    pub fn replace<R: PendingRecord>(&self, records: &[R]) {
        if records.is_empty() {
            self.clear(R::KIND);
        } else {
            self.persist(records);
        }
    }

    /// Remove one record by id. Returns whether it was queued.
    pub fn remove<R: PendingRecord>(&self, id: &str) -> bool {
        let mut pending: Vec<R> = self.peek();
        let before = pending.len();
        pending.retain(|r| r.id() != id);
        let removed = pending.len() != before;
        if removed {
            self.replace(&pending);
        }
        removed
    }

    pub fn clear(&self, kind: PendingKind) {
        if let Err(e) = self.cache.remove(kind.slot()) {
            warn!(kind = %kind, error = %e, "Failed to clear pending queue");
        }
    }

    pub fn len(&self, kind: PendingKind) -> usize {
        match kind {
            PendingKind::Expense => self.peek::<Expense>().len(),
            PendingKind::Category => self.peek::<Category>().len(),
        }
    }

    pub fn has_pending(&self) -> bool {
        self.len(PendingKind::Expense) > 0 || self.len(PendingKind::Category) > 0
    }

    fn persist<R: PendingRecord>(&self, records: &[R]) {
        if let Err(e) = self.cache.write(R::KIND.slot(), records) {
            warn!(kind = %R::KIND, error = %e, "Failed to persist pending queue");
        }
    }
}
