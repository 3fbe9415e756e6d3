//! Authentication module for managing user sessions and credentials.
//!
//! This module provides:
//! - `AuthProvider`: sign-in/sign-up/sign-out against the external auth service
//! - `Session`: token-based session persisted in the cache directory
//! - `CredentialStore`: optional OS keychain storage for the password
//!
//! Route protection only ever asks the session whether it is still valid.

pub mod client;
pub mod credentials;
pub mod session;

use std::future::Future;

use thiserror::Error;

pub use client::RestAuth;
pub use credentials::CredentialStore;
pub use session::{Session, SessionData};

use crate::api::ApiError;
use crate::models::User;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Check {0} for a confirmation link before signing in")]
    ConfirmationRequired(String),

    #[error("Session expired - sign in again")]
    SessionExpired,

    #[error(transparent)]
    Api(#[from] ApiError),
}

pub trait AuthProvider: Send + Sync {
    fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<SessionData, AuthError>> + Send;

    fn sign_up(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<SessionData, AuthError>> + Send;

    /// Trade a refresh token for a new grant before the current one lapses.
    fn refresh_session(
        &self,
        refresh_token: &str,
    ) -> impl Future<Output = Result<SessionData, AuthError>> + Send;

    fn sign_out(&self, access_token: &str) -> impl Future<Output = Result<(), AuthError>> + Send;

    /// Identity behind an access token.
    fn current_user(&self, access_token: &str) -> impl Future<Output = Result<User, AuthError>> + Send;
}
