use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::error::CacheError;
use crate::models::{Category, Expense};
use crate::store::KeyValueStore;

/// Key prefix used when the config does not override it.
pub const DEFAULT_NAMESPACE: &str = "cash_tracker";

/// One of the fixed cache keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheSlot {
    Expenses,
    Categories,
    PendingExpenses,
    PendingCategories,
    LastSync,
}

impl CacheSlot {
    pub const ALL: [CacheSlot; 5] = [
        CacheSlot::Expenses,
        CacheSlot::Categories,
        CacheSlot::PendingExpenses,
        CacheSlot::PendingCategories,
        CacheSlot::LastSync,
    ];

    fn suffix(&self) -> &'static str {
        match self {
            CacheSlot::Expenses => "expenses",
            CacheSlot::Categories => "categories",
            CacheSlot::PendingExpenses => "pending_expenses",
            CacheSlot::PendingCategories => "pending_categories",
            CacheSlot::LastSync => "last_sync",
        }
    }
}

/// Typed persistence over a key-value store.
///
/// Two layers are exposed. `read`/`write` return a [`CacheError`] that tells
/// decode failures apart from store failures. The `load_*`/`save_*` methods
/// are fail-open: they log and swallow every failure, returning an empty list
/// where a value was expected.
pub struct CacheManager<S> {
    store: S,
    namespace: String,
}

impl<S: KeyValueStore> CacheManager<S> {
    pub fn new(store: S) -> Self {
        Self::with_namespace(store, DEFAULT_NAMESPACE)
    }

    pub fn with_namespace(store: S, namespace: &str) -> Self {
        Self {
            store,
            namespace: namespace.to_string(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Full store key for a slot, e.g. `cash_tracker_pending_expenses`.
    pub fn key(&self, slot: CacheSlot) -> String {
        format!("{}_{}", self.namespace, slot.suffix())
    }

    // ===== Explicit layer =====

    /// Decode a list slot. An absent key is an empty list.
    pub fn read<T: DeserializeOwned>(&self, slot: CacheSlot) -> Result<Vec<T>, CacheError> {
        let key = self.key(slot);
        let raw = self
            .store
            .get_item(&key)
            .map_err(|source| CacheError::Store { key: key.clone(), source })?;

        match raw {
            None => Ok(Vec::new()),
            Some(text) => serde_json::from_str(&text)
                .map_err(|source| CacheError::Decode { key, source }),
        }
    }

    /// Serialize and write a full list, replacing the slot.
    pub fn write<T: Serialize>(&self, slot: CacheSlot, records: &[T]) -> Result<(), CacheError> {
        let key = self.key(slot);
        let text = serde_json::to_string(records)
            .map_err(|source| CacheError::Encode { key: key.clone(), source })?;
        self.store
            .set_item(&key, &text)
            .map_err(|source| CacheError::Store { key, source })
    }

    pub fn remove(&self, slot: CacheSlot) -> Result<(), CacheError> {
        let key = self.key(slot);
        self.store
            .remove_item(&key)
            .map_err(|source| CacheError::Store { key, source })
    }

    /// Last sync time in epoch milliseconds, `None` if never recorded.
    pub fn read_last_sync(&self) -> Result<Option<i64>, CacheError> {
        let key = self.key(CacheSlot::LastSync);
        let raw = self
            .store
            .get_item(&key)
            .map_err(|source| CacheError::Store { key: key.clone(), source })?;

        match raw {
            None => Ok(None),
            Some(text) => serde_json::from_str::<i64>(text.trim())
                .map(Some)
                .map_err(|source| CacheError::Decode { key, source }),
        }
    }

    // ===== Fail-open layer =====

    fn load_or_empty<T: DeserializeOwned>(&self, slot: CacheSlot) -> Vec<T> {
        match self.read(slot) {
            Ok(records) => {
                debug!(slot = ?slot, count = records.len(), "Loaded cache slot");
                records
            }
            Err(e) => {
                warn!(slot = ?slot, error = %e, "Failed to load cache slot, using empty list");
                Vec::new()
            }
        }
    }

    fn save_or_log<T: Serialize>(&self, slot: CacheSlot, records: &[T]) {
        if let Err(e) = self.write(slot, records) {
            warn!(slot = ?slot, error = %e, "Failed to save cache slot");
        }
    }

    // ===== Expenses =====

    pub fn load_expenses(&self) -> Vec<Expense> {
        self.load_or_empty(CacheSlot::Expenses)
    }

    pub fn save_expenses(&self, expenses: &[Expense]) {
        self.save_or_log(CacheSlot::Expenses, expenses)
    }

    // ===== Categories =====

    pub fn load_categories(&self) -> Vec<Category> {
        self.load_or_empty(CacheSlot::Categories)
    }

    pub fn save_categories(&self, categories: &[Category]) {
        self.save_or_log(CacheSlot::Categories, categories)
    }

    // ===== Last Sync =====

    pub fn set_last_sync(&self, millis: i64) {
        let key = self.key(CacheSlot::LastSync);
        if let Err(e) = self.store.set_item(&key, &millis.to_string()) {
            warn!(error = %e, "Failed to save last sync time");
        }
    }

    pub fn mark_synced_now(&self) {
        self.set_last_sync(Utc::now().timestamp_millis());
    }

    /// Last sync time in epoch milliseconds, 0 if unknown.
    pub fn last_sync(&self) -> i64 {
        match self.read_last_sync() {
            Ok(value) => value.unwrap_or(0),
            Err(e) => {
                warn!(error = %e, "Failed to load last sync time");
                0
            }
        }
    }

    pub fn last_sync_display(&self) -> String {
        match self.last_sync() {
            0 => "never".to_string(),
            millis => age_display(Utc::now().timestamp_millis() - millis),
        }
    }

    /// Remove every slot. Each removal is attempted even if an earlier one failed.
    pub fn clear_all(&self) {
        for slot in CacheSlot::ALL {
            if let Err(e) = self.remove(slot) {
                warn!(slot = ?slot, error = %e, "Failed to clear cache slot");
            }
        }
    }
}

/// Human readable age for an elapsed time in milliseconds.
pub fn age_display(elapsed_millis: i64) -> String {
    let minutes = elapsed_millis / 60_000;
    if minutes < 1 {
        // Also covers clock skew
        "just now".to_string()
    } else if minutes < 60 {
        format!("{}m ago", minutes)
    } else if minutes < 1440 {
        let hours = minutes / 60;
        if minutes % 60 >= 30 {
            format!("{}h ago", hours + 1)
        } else {
            format!("{}h ago", hours)
        }
    } else {
        let days = minutes / 1440;
        if (minutes % 1440) / 60 >= 12 {
            format!("{}d ago", days + 1)
        } else {
            format!("{}d ago", days)
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::MemoryStore;

    /// Store whose every operation fails.
    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get_item(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Unavailable("broken".into()))
        }
        fn set_item(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("broken".into()))
        }
        fn remove_item(&self, _key: &str) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("broken".into()))
        }
    }

    fn lunch() -> Expense {
        Expense {
            id: "1".into(),
            title: "Lunch".into(),
            amount: 500.0,
            category_id: Some("1".into()),
            category: None,
            date: "2024-01-01".into(),
            user_id: "1".into(),
            created_at: "2024-01-01".into(),
        }
    }

    #[test]
    fn test_keys_use_namespace() {
        let cache = CacheManager::new(MemoryStore::new());
        assert_eq!(cache.key(CacheSlot::Expenses), "cash_tracker_expenses");
        assert_eq!(cache.key(CacheSlot::Categories), "cash_tracker_categories");
        assert_eq!(cache.key(CacheSlot::PendingExpenses), "cash_tracker_pending_expenses");
        assert_eq!(cache.key(CacheSlot::PendingCategories), "cash_tracker_pending_categories");
        assert_eq!(cache.key(CacheSlot::LastSync), "cash_tracker_last_sync");

        let custom = CacheManager::with_namespace(MemoryStore::new(), "work");
        assert_eq!(custom.key(CacheSlot::Expenses), "work_expenses");
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let cache = CacheManager::new(MemoryStore::new());
        let expenses = vec![lunch()];
        cache.save_expenses(&expenses);
        assert_eq!(cache.load_expenses(), expenses);
    }

    #[test]
    fn test_stored_text_is_plain_json_list() {
        let cache = CacheManager::new(MemoryStore::new());
        cache.save_expenses(&[lunch()]);
        let raw = cache.store().get_item("cash_tracker_expenses").unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert!(value.is_array());
        assert_eq!(value[0]["title"], "Lunch");
    }

    #[test]
    fn test_load_absent_is_empty() {
        let cache = CacheManager::new(MemoryStore::new());
        assert!(cache.load_expenses().is_empty());
        assert!(cache.read::<Expense>(CacheSlot::Expenses).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_slot_is_decode_error_and_loads_empty() {
        let cache = CacheManager::new(MemoryStore::new());
        cache.store().set_item("cash_tracker_expenses", "{not json").unwrap();

        let err = cache.read::<Expense>(CacheSlot::Expenses).unwrap_err();
        assert!(err.is_decode());
        assert!(cache.load_expenses().is_empty());
    }

    #[test]
    fn test_failed_save_keeps_previous_value() {
        let cache = CacheManager::new(MemoryStore::with_quota(600));
        let first = vec![lunch()];
        cache.save_expenses(&first);

        let many: Vec<Expense> = (0..50)
            .map(|i| Expense { id: i.to_string(), ..lunch() })
            .collect();
        let err = cache.write(CacheSlot::Expenses, &many).unwrap_err();
        assert!(matches!(err, CacheError::Store { .. }));

        // Fail-open save does not surface anything either
        cache.save_expenses(&many);
        assert_eq!(cache.load_expenses(), first);
    }

    #[test]
    fn test_broken_store_never_surfaces() {
        let cache = CacheManager::new(BrokenStore);
        cache.save_expenses(&[lunch()]);
        cache.save_categories(&[]);
        cache.set_last_sync(42);
        cache.clear_all();

        assert!(cache.load_expenses().is_empty());
        assert!(cache.load_categories().is_empty());
        assert_eq!(cache.last_sync(), 0);
        assert!(matches!(
            cache.read::<Expense>(CacheSlot::Expenses),
            Err(CacheError::Store { .. })
        ));
    }

    #[test]
    fn test_clear_all_removes_exactly_five_keys() {
        let cache = CacheManager::new(MemoryStore::new());
        cache.save_expenses(&[lunch()]);
        cache.save_categories(&[]);
        cache.write(CacheSlot::PendingExpenses, &[lunch()]).unwrap();
        cache.write::<Category>(CacheSlot::PendingCategories, &[]).unwrap();
        cache.set_last_sync(1);
        cache.store().set_item("theme", "dark").unwrap();
        assert_eq!(cache.store().keys().len(), 6);

        cache.clear_all();
        assert_eq!(cache.store().keys(), vec!["theme".to_string()]);

        // Clearing an empty cache is fine
        cache.clear_all();
    }

    #[test]
    fn test_last_sync_defaults_and_round_trips() {
        let cache = CacheManager::new(MemoryStore::new());
        assert_eq!(cache.last_sync(), 0);
        assert_eq!(cache.last_sync_display(), "never");

        cache.set_last_sync(1_704_067_200_000);
        assert_eq!(cache.last_sync(), 1_704_067_200_000);
        assert_eq!(
            cache.store().get_item("cash_tracker_last_sync").unwrap().as_deref(),
            Some("1704067200000")
        );

        cache.store().set_item("cash_tracker_last_sync", "garbage").unwrap();
        assert_eq!(cache.last_sync(), 0);
    }

    #[test]
    fn test_mark_synced_now_is_just_now() {
        let cache = CacheManager::new(MemoryStore::new());
        cache.mark_synced_now();
        assert!(cache.last_sync() > 0);
        assert_eq!(cache.last_sync_display(), "just now");
    }

    #[test]
    fn test_age_display() {
        assert_eq!(age_display(-5_000), "just now");
        assert_eq!(age_display(30_000), "just now");
        assert_eq!(age_display(5 * 60_000), "5m ago");
        assert_eq!(age_display(90 * 60_000), "2h ago");
        assert_eq!(age_display(80 * 60_000), "1h ago");
        assert_eq!(age_display(36 * 60 * 60_000), "2d ago");
        assert_eq!(age_display(25 * 60 * 60_000), "1d ago");
    }
}
