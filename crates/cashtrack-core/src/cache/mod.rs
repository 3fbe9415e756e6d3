//! Local caching module for offline data access.
//!
//! This module provides the `CacheManager` for mirroring remote records into
//! a [`crate::store::KeyValueStore`]. Five fixed slots are kept under one key
//! namespace:
//!
//! - Expenses and categories (last authoritative read)
//! - Pending expenses and pending categories (writes not yet confirmed)
//! - Last successful sync time

pub mod manager;

pub use manager::{CacheManager, CacheSlot, DEFAULT_NAMESPACE};
