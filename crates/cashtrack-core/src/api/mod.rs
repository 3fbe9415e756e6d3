//! Remote data service module.
//!
//! The remote is a table store queried by table, equality filter, foreign-key
//! join and ordering. Every call is scoped to the owning user. `RestClient`
//! speaks the PostgREST dialect over HTTPS; tests substitute their own
//! [`RemoteService`].

pub mod client;
pub mod error;

use std::future::Future;

pub use client::RestClient;
pub use error::ApiError;

use crate::models::{Category, Expense, NewCategory, NewExpense};

pub trait RemoteService: Send + Sync {
    /// All expenses owned by `user_id`, joined with their category, newest first.
    fn fetch_expenses(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Vec<Expense>, ApiError>> + Send;

    /// All categories owned by `user_id`, ordered by name.
    fn fetch_categories(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Vec<Category>, ApiError>> + Send;

    fn insert_expense(
        &self,
        expense: &NewExpense,
    ) -> impl Future<Output = Result<Expense, ApiError>> + Send;

    fn insert_category(
        &self,
        category: &NewCategory,
    ) -> impl Future<Output = Result<Category, ApiError>> + Send;

    fn delete_category(
        &self,
        user_id: &str,
        category_id: &str,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;
}
