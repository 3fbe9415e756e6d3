//! Data models for cashtrack entities.
//!
//! This module contains the records exchanged with the remote data service
//! and mirrored into the local cache:
//!
//! - `Expense`, `NewExpense`: spending records and their insert form
//! - `Category`, `NewCategory`: user-defined expense categories
//! - `User`: identity owned by the auth provider
//!
//! Records that have not been confirmed by the remote carry a temporary
//! identifier produced by [`pending_id`].

pub mod category;
pub mod expense;
pub mod user;

use chrono::Utc;
use rand::Rng;

pub use category::{Category, NewCategory};
pub use expense::{Expense, NewExpense};
pub use user::User;

use crate::error::ValidationError;

/// Prefix shared by every locally minted identifier.
pub const PENDING_ID_PREFIX: &str = "pending_";

/// Mint a temporary identifier of the form `pending_<epoch-millis>_<random>`.
///
/// The random part is a decimal in `[0, 1)`. Nothing prevents the remote from
/// issuing an id with the same shape.
pub fn pending_id() -> String {
    let millis = Utc::now().timestamp_millis();
    let random: f64 = rand::thread_rng().gen();
    format!("{}{}_{}", PENDING_ID_PREFIX, millis, random)
}

/// Check whether an identifier was minted locally by [`pending_id`].
pub fn is_pending_id(id: &str) -> bool {
    id.starts_with(PENDING_ID_PREFIX)
}

/// A record-without-id that can be queued and later confirmed by the remote.
pub trait Draft: Clone {
    /// The full record produced once an identifier is attached.
    type Record;

    /// Check the form before any network call is attempted.
    fn validate(&self) -> Result<(), ValidationError>;

    /// Attach an identifier (temporary or server-issued).
    fn into_record(self, id: String) -> Self::Record;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches_pending_shape(id: &str) -> bool {
        let Some(rest) = id.strip_prefix(PENDING_ID_PREFIX) else {
            return false;
        };
        let Some((millis, random)) = rest.split_once('_') else {
            return false;
        };
        !millis.is_empty()
            && millis.chars().all(|c| c.is_ascii_digit())
            && !random.is_empty()
            && random.chars().all(|c| c.is_ascii_digit() || c == '.')
    }

    #[test]
    fn test_pending_id_shape() {
        for _ in 0..100 {
            let id = pending_id();
            assert!(matches_pending_shape(&id), "unexpected id {}", id);
        }
    }

    #[test]
    fn test_pending_ids_differ() {
        assert_ne!(pending_id(), pending_id());
    }

    #[test]
    fn test_is_pending_id() {
        assert!(is_pending_id(&pending_id()));
        assert!(!is_pending_id("3f1c2a9e-0000-4000-8000-000000000000"));
        assert!(!is_pending_id(""));
    }
}
