//! Error types for the local storage layers and form validation.
//!
//! Remote failures live in [`crate::api::ApiError`] and auth failures in
//! [`crate::auth::AuthError`].

use thiserror::Error;

/// Failure reported by a [`crate::store::KeyValueStore`] backend.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage quota exceeded: {needed} bytes requested, {limit} allowed")]
    QuotaExceeded { needed: usize, limit: usize },

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Failure reading or writing one cache slot.
///
/// Callers that want fail-open behaviour decide per call how to treat each
/// kind; the distinction is kept so that policy stays explicit.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Failed to decode cache slot {key}: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode cache slot {key}: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Store failure on cache slot {key}: {source}")]
    Store {
        key: String,
        #[source]
        source: StoreError,
    },
}

impl CacheError {
    pub fn is_decode(&self) -> bool {
        matches!(self, CacheError::Decode { .. })
    }
}

/// Form errors, reported inline before any network call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Enter an expense title")]
    EmptyTitle,

    #[error("Amount must be greater than 0")]
    NonPositiveAmount,

    #[error("Enter a category name")]
    EmptyName,
}
