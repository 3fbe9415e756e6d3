//! Offline-first reconciliation between the local cache and the remote.
//!
//! A list load is a two-phase transition published on a channel:
//!
//! 1. `ListUpdate::Cached` with whatever the cache holds (skipped when empty)
//! 2. `ListUpdate::Authoritative` with the server result, which also
//!    overwrites the cache wholesale
//!
//! Offline, only phase 1 happens and no remote call is made. A failed fetch
//! leaves the cached list on display. There is no retry, backoff or merge.
//!
//! Writes go to the remote when possible and to the pending queue otherwise;
//! [`Synchronizer::drain_pending`] pushes the queue back once online.

use std::collections::HashMap;

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::api::{ApiError, RemoteService};
use crate::cache::{CacheManager, CacheSlot};
use crate::connectivity::ConnectivityProbe;
use crate::error::ValidationError;
use crate::models::{is_pending_id, Category, Draft, Expense, NewCategory, NewExpense};
use crate::queue::PendingQueue;
use crate::store::KeyValueStore;

/// Buffer size for list update channels.
/// A single load publishes at most two updates.
pub const CHANNEL_BUFFER_SIZE: usize = 8;

/// What the list view should display next.
#[derive(Debug, Clone, PartialEq)]
pub enum ListUpdate<T> {
    /// Cached records, shown before (or instead of) the server answer
    Cached(Vec<T>),
    /// Server records, now also in the cache
    Authoritative(Vec<T>),
}

impl<T> ListUpdate<T> {
    pub fn records(&self) -> &[T] {
        match self {
            ListUpdate::Cached(r) | ListUpdate::Authoritative(r) => r,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// No network: the cached list is final for this load
    Offline,
    /// Server list displayed and cached
    Refreshed,
    /// Server unreachable or query rejected: the cached list stays
    FetchFailed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadReport<T> {
    /// Final list on display after this load
    pub displayed: Vec<T>,
    pub outcome: LoadOutcome,
    /// Present when pending writes were pushed before fetching
    pub drain: Option<DrainReport>,
}

/// Result of pushing the pending queues to the remote.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrainReport {
    pub sent_categories: usize,
    pub sent_expenses: usize,
    pub kept_categories: usize,
    pub kept_expenses: usize,
    /// Refused by the remote and taken out of the queue
    pub rejected_categories: Vec<Category>,
    pub rejected_expenses: Vec<Expense>,
    pub skipped_offline: bool,
}

impl DrainReport {
    pub fn sent(&self) -> usize {
        self.sent_categories + self.sent_expenses
    }

    pub fn kept(&self) -> usize {
        self.kept_categories + self.kept_expenses
    }

    pub fn rejected(&self) -> usize {
        self.rejected_categories.len() + self.rejected_expenses.len()
    }
}

/// Where an accepted write ended up.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome<T> {
    /// Confirmed by the remote, with the server-issued id
    Saved(T),
    /// Queued locally under a temporary id
    Queued(T),
}

impl<T> SubmitOutcome<T> {
    pub fn record(&self) -> &T {
        match self {
            SubmitOutcome::Saved(r) | SubmitOutcome::Queued(r) => r,
        }
    }

    pub fn is_queued(&self) -> bool {
        matches!(self, SubmitOutcome::Queued(_))
    }
}

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("This change needs a network connection")]
    Offline,
}

pub struct Synchronizer<'a, S, P, R> {
    cache: &'a CacheManager<S>,
    probe: &'a P,
    remote: &'a R,
    drain_on_reconnect: bool,
}

impl<'a, S, P, R> Synchronizer<'a, S, P, R>
where
    S: KeyValueStore,
    P: ConnectivityProbe,
    R: RemoteService,
{
    pub fn new(cache: &'a CacheManager<S>, probe: &'a P, remote: &'a R) -> Self {
        Self {
            cache,
            probe,
            remote,
            drain_on_reconnect: true,
        }
    }

    /// Whether an online expense load pushes pending writes first.
    pub fn with_drain_on_reconnect(mut self, enabled: bool) -> Self {
        self.drain_on_reconnect = enabled;
        self
    }

    pub fn is_online(&self) -> bool {
        self.probe.is_online()
    }

    // =========================================================================
    // Reconciliation
    // =========================================================================

    /// Load the main expense list for `user_id`.
    pub async fn load_expenses(
        &self,
        user_id: &str,
        tx: &mpsc::Sender<ListUpdate<Expense>>,
    ) -> LoadReport<Expense> {
        self.load_expenses_with(user_id, tx, self.drain_on_reconnect).await
    }

    async fn load_expenses_with(
        &self,
        user_id: &str,
        tx: &mpsc::Sender<ListUpdate<Expense>>,
        drain_first: bool,
    ) -> LoadReport<Expense> {
        let mut cached = self.show_cached(CacheSlot::Expenses, tx).await;

        if !self.probe.is_online() {
            info!(cached = cached.len(), "Offline, showing cached expenses");
            return Self::offline_report(cached);
        }

        let drain = if drain_first {
            let drain = self.drain_pending(user_id).await;
            if drain.sent_expenses > 0 {
                cached = self.show_cached(CacheSlot::Expenses, tx).await;
            }
            Some(drain)
        } else {
            None
        };

        let fetched = self.remote.fetch_expenses(user_id).await;
        let mut report = self.apply_fetch(CacheSlot::Expenses, cached, fetched, tx).await;
        report.drain = drain;
        report
    }

    /// Load the category list for `user_id` with the same policy as expenses.
    pub async fn load_categories(
        &self,
        user_id: &str,
        tx: &mpsc::Sender<ListUpdate<Category>>,
    ) -> LoadReport<Category> {
        let cached = self.show_cached(CacheSlot::Categories, tx).await;

        if !self.probe.is_online() {
            info!(cached = cached.len(), "Offline, showing cached categories");
            return Self::offline_report(cached);
        }

        let fetched = self.remote.fetch_categories(user_id).await;
        self.apply_fetch(CacheSlot::Categories, cached, fetched, tx).await
    }

    /// Show both cached lists, drain once, then fetch both lists concurrently.
    pub async fn refresh_all(
        &self,
        user_id: &str,
        expense_tx: &mpsc::Sender<ListUpdate<Expense>>,
        category_tx: &mpsc::Sender<ListUpdate<Category>>,
    ) -> (LoadReport<Expense>, LoadReport<Category>) {
        let mut cached_expenses = self.show_cached(CacheSlot::Expenses, expense_tx).await;
        let mut cached_categories = self.show_cached(CacheSlot::Categories, category_tx).await;

        if !self.probe.is_online() {
            info!("Offline, showing cached lists");
            return (
                Self::offline_report(cached_expenses),
                Self::offline_report(cached_categories),
            );
        }

        let drain = if self.drain_on_reconnect {
            let drain = self.drain_pending(user_id).await;
            if drain.sent_expenses > 0 {
                cached_expenses = self.show_cached(CacheSlot::Expenses, expense_tx).await;
            }
            if drain.sent_categories > 0 {
                cached_categories = self.show_cached(CacheSlot::Categories, category_tx).await;
            }
            Some(drain)
        } else {
            None
        };

        let (mut expenses, categories) = futures::join!(
            async {
                let fetched = self.remote.fetch_expenses(user_id).await;
                self.apply_fetch(CacheSlot::Expenses, cached_expenses, fetched, expense_tx)
                    .await
            },
            async {
                let fetched = self.remote.fetch_categories(user_id).await;
                self.apply_fetch(CacheSlot::Categories, cached_categories, fetched, category_tx)
                    .await
            },
        );
        expenses.drain = drain;
        (expenses, categories)
    }

    /// Cache read policy for list loads: a decode or store failure is shown
    /// as an empty list.
    fn cached_or_empty<T: DeserializeOwned>(&self, slot: CacheSlot) -> Vec<T> {
        match self.cache.read(slot) {
            Ok(records) => records,
            Err(e) => {
                warn!(
                    slot = ?slot,
                    decode = e.is_decode(),
                    error = %e,
                    "Cached list unreadable, treating as empty"
                );
                Vec::new()
            }
        }
    }

    async fn show_cached<T>(&self, slot: CacheSlot, tx: &mpsc::Sender<ListUpdate<T>>) -> Vec<T>
    where
        T: DeserializeOwned + Clone,
    {
        let cached: Vec<T> = self.cached_or_empty(slot);
        if !cached.is_empty() {
            debug!(slot = ?slot, count = cached.len(), "Showing cached list");
            Self::publish(tx, ListUpdate::Cached(cached.clone())).await;
        }
        cached
    }

    async fn apply_fetch<T>(
        &self,
        slot: CacheSlot,
        cached: Vec<T>,
        fetched: Result<Vec<T>, ApiError>,
        tx: &mpsc::Sender<ListUpdate<T>>,
    ) -> LoadReport<T>
    where
        T: Serialize + Clone,
    {
        match fetched {
            Ok(fresh) => {
                Self::publish(tx, ListUpdate::Authoritative(fresh.clone())).await;
                if let Err(e) = self.cache.write(slot, &fresh) {
                    warn!(slot = ?slot, error = %e, "Failed to cache server list");
                }
                self.cache.mark_synced_now();
                debug!(slot = ?slot, count = fresh.len(), "Server list displayed");
                LoadReport {
                    displayed: fresh,
                    outcome: LoadOutcome::Refreshed,
                    drain: None,
                }
            }
            Err(e) => {
                error!(slot = ?slot, error = %e, "Failed to load from remote");
                if cached.is_empty() {
                    Self::publish(tx, ListUpdate::Cached(Vec::new())).await;
                }
                LoadReport {
                    displayed: cached,
                    outcome: LoadOutcome::FetchFailed,
                    drain: None,
                }
            }
        }
    }

    /// Put a record the remote just confirmed at the top of its cached list.
    /// The next successful fetch replaces the whole slot anyway.
    fn cache_confirmed<T>(&self, slot: CacheSlot, saved: &T)
    where
        T: Serialize + DeserializeOwned + Clone,
    {
        let mut records: Vec<T> = self.cached_or_empty(slot);
        records.insert(0, saved.clone());
        if let Err(e) = self.cache.write(slot, &records) {
            warn!(slot = ?slot, error = %e, "Failed to cache confirmed record");
        }
    }

    fn offline_report<T>(cached: Vec<T>) -> LoadReport<T> {
        LoadReport {
            displayed: cached,
            outcome: LoadOutcome::Offline,
            drain: None,
        }
    }

    /// Send an update, ignoring a receiver that has gone away.
    async fn publish<T>(tx: &mpsc::Sender<ListUpdate<T>>, update: ListUpdate<T>) {
        if tx.send(update).await.is_err() {
            debug!("List receiver dropped, discarding update");
        }
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Validate and save an expense, queueing it when the remote is out of reach.
    ///
    /// An expense whose category is still pending is always queued so the
    /// drain can send the category first.
    pub async fn submit_expense(
        &self,
        draft: NewExpense,
    ) -> Result<SubmitOutcome<Expense>, SubmitError> {
        draft.validate()?;
        let queue = PendingQueue::new(self.cache);

        let needs_pending_category = draft.category_id.as_deref().is_some_and(is_pending_id);
        if !self.probe.is_online() || needs_pending_category {
            let queued = queue.enqueue(draft);
            info!(id = %queued.id, "Expense queued for later sync");
            return Ok(SubmitOutcome::Queued(queued));
        }

        match self.remote.insert_expense(&draft).await {
            Ok(saved) => {
                info!(id = %saved.id, "Expense saved");
                self.cache_confirmed(CacheSlot::Expenses, &saved);
                Ok(SubmitOutcome::Saved(saved))
            }
            Err(e) if e.is_unreachable() => {
                warn!(error = %e, "Remote unreachable, queueing expense");
                Ok(SubmitOutcome::Queued(queue.enqueue(draft)))
            }
            Err(e) => {
                error!(error = %e, "Failed to save expense");
                Err(e.into())
            }
        }
    }

    /// Validate and save a category, queueing it when the remote is out of reach.
    pub async fn submit_category(
        &self,
        draft: NewCategory,
    ) -> Result<SubmitOutcome<Category>, SubmitError> {
        draft.validate()?;
        let queue = PendingQueue::new(self.cache);

        if !self.probe.is_online() {
            let queued = queue.enqueue(draft);
            info!(id = %queued.id, "Category queued for later sync");
            return Ok(SubmitOutcome::Queued(queued));
        }

        match self.remote.insert_category(&draft).await {
            Ok(saved) => {
                info!(id = %saved.id, "Category saved");
                self.cache_confirmed(CacheSlot::Categories, &saved);
                Ok(SubmitOutcome::Saved(saved))
            }
            Err(e) if e.is_unreachable() => {
                warn!(error = %e, "Remote unreachable, queueing category");
                Ok(SubmitOutcome::Queued(queue.enqueue(draft)))
            }
            Err(e) => {
                error!(error = %e, "Failed to save category");
                Err(e.into())
            }
        }
    }

    /// Delete a category. A pending category is simply dropped from the queue
    /// and queued expenses pointing at it lose their category.
    pub async fn delete_category(&self, user_id: &str, category_id: &str) -> Result<(), SubmitError> {
        let queue = PendingQueue::new(self.cache);

        if is_pending_id(category_id) {
            if queue.remove::<Category>(category_id) {
                let expenses: Vec<Expense> = queue
                    .peek::<Expense>()
                    .into_iter()
                    .map(|mut e| {
                        if e.category_id.as_deref() == Some(category_id) {
                            e.category_id = None;
                        }
                        e
                    })
                    .collect();
                queue.replace(&expenses);
            }
            return Ok(());
        }

        if !self.probe.is_online() {
            return Err(SubmitError::Offline);
        }

        self.remote.delete_category(user_id, category_id).await?;

        let remaining: Vec<Category> = self
            .cached_or_empty::<Category>(CacheSlot::Categories)
            .into_iter()
            .filter(|c| c.id != category_id)
            .collect();
        self.cache.save_categories(&remaining);
        info!(id = category_id, "Category deleted");
        Ok(())
    }

    // =========================================================================
    // Pending drain
    // =========================================================================

    /// Push queued writes for `user_id` to the remote.
    ///
    /// Categories go first so queued expenses can be pointed at their server
    /// ids. Confirmed records leave the queue and join the cached list.
    /// Records the remote rejects leave the queue and are listed in the
    /// report; expenses pointing at a rejected category lose that category.
    /// Any other error keeps the record and stops further attempts. Records
    /// of other users are left alone.
    pub async fn drain_pending(&self, user_id: &str) -> DrainReport {
        if !self.probe.is_online() {
            return DrainReport {
                skipped_offline: true,
                ..Default::default()
            };
        }

        let queue = PendingQueue::new(self.cache);
        let mut report = DrainReport::default();
        let mut server_ids: HashMap<String, String> = HashMap::new();
        let mut halted = false;

        let mut kept_categories: Vec<Category> = Vec::new();
        for pending in queue.peek::<Category>() {
            if halted || pending.user_id != user_id {
                kept_categories.push(pending);
                continue;
            }
            match self.remote.insert_category(&pending.to_draft()).await {
                Ok(saved) => {
                    debug!(temp_id = %pending.id, id = %saved.id, "Pending category sent");
                    self.cache_confirmed(CacheSlot::Categories, &saved);
                    server_ids.insert(pending.id, saved.id);
                    report.sent_categories += 1;
                }
                Err(ApiError::Rejected(reason)) => {
                    warn!(id = %pending.id, %reason, "Pending category rejected, dropping it");
                    report.rejected_categories.push(pending);
                }
                Err(e) => {
                    warn!(id = %pending.id, error = %e, "Pending category not sent");
                    halted = true;
                    kept_categories.push(pending);
                }
            }
        }

        let mut kept_expenses: Vec<Expense> = Vec::new();
        for mut pending in queue.peek::<Expense>() {
            if let Some(temp_id) = pending.category_id.clone() {
                if let Some(id) = server_ids.get(&temp_id) {
                    pending.category_id = Some(id.clone());
                } else if report.rejected_categories.iter().any(|c| c.id == temp_id) {
                    pending.category_id = None;
                }
            }

            let blocked = pending.category_id.as_deref().is_some_and(is_pending_id);
            if halted || blocked || pending.user_id != user_id {
                kept_expenses.push(pending);
                continue;
            }
            match self.remote.insert_expense(&pending.to_draft()).await {
                Ok(saved) => {
                    debug!(temp_id = %pending.id, id = %saved.id, "Pending expense sent");
                    self.cache_confirmed(CacheSlot::Expenses, &saved);
                    report.sent_expenses += 1;
                }
                Err(ApiError::Rejected(reason)) => {
                    warn!(id = %pending.id, %reason, "Pending expense rejected, dropping it");
                    report.rejected_expenses.push(pending);
                }
                Err(e) => {
                    warn!(id = %pending.id, error = %e, "Pending expense not sent");
                    halted = true;
                    kept_expenses.push(pending);
                }
            }
        }

        report.kept_categories = kept_categories.len();
        report.kept_expenses = kept_expenses.len();
        queue.replace(&kept_categories);
        queue.replace(&kept_expenses);

        if report.sent() > 0 || report.kept() > 0 || report.rejected() > 0 {
            info!(
                sent = report.sent(),
                kept = report.kept(),
                rejected = report.rejected(),
                "Pending queue drained"
            );
        }
        report
    }
}
