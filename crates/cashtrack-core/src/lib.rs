//! Cashtrack core - offline-first personal expense tracking.
//!
//! Expenses and categories live on a remote table store. This crate keeps a
//! local mirror of them, queues writes made without a connection, and
//! reconciles the two whenever a list is loaded.

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod models;
pub mod queue;
pub mod routes;
pub mod stats;
pub mod store;
pub mod sync;
pub mod utils;

pub use cache::CacheManager;
pub use connectivity::{ConnectivityProbe, NetworkStatus};
pub use sync::{ListUpdate, Synchronizer};
