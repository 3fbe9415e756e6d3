use std::time::Duration;

use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{AuthError, AuthProvider, SessionData};
use crate::api::ApiError;
use crate::config::Endpoint;
use crate::models::User;

/// Path prefix of the auth API.
const AUTH_PATH: &str = "auth/v1";

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Lifetime assumed when the grant omits `expires_in`.
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

#[derive(Debug, Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct RefreshGrant<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
    user: User,
}

fn default_expires_in() -> i64 {
    DEFAULT_EXPIRES_IN_SECS
}

impl TokenResponse {
    fn into_session(self) -> SessionData {
        SessionData::new(self.access_token, self.refresh_token, self.user, self.expires_in)
    }
}

/// Client for the hosted auth service (`/auth/v1`).
#[derive(Clone)]
pub struct RestAuth {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl RestAuth {
    pub fn new(endpoint: &Endpoint) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: endpoint.url.trim_end_matches('/').to_string(),
            anon_key: endpoint.anon_key.clone(),
        })
    }

    fn url(&self, path: &str) -> Result<String, ApiError> {
        if self.base_url.is_empty() {
            return Err(ApiError::NotConfigured);
        }
        Ok(format!("{}/{}/{}", self.base_url, AUTH_PATH, path))
    }

    async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn post_grant<B: Serialize>(&self, path: &str, body: &B) -> Result<serde_json::Value, ApiError> {
        let url = self.url(path)?;
        let response = self
            .client
            .post(&url)
            .header("apikey", &self.anon_key)
            .json(body)
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        Ok(response.json().await?)
    }
}

fn session_from_grant(body: serde_json::Value) -> Result<SessionData, AuthError> {
    let grant: TokenResponse =
        serde_json::from_value(body).map_err(|e| ApiError::InvalidResponse(e.to_string()))?;
    Ok(grant.into_session())
}

/// A sign-up either returns a full grant or, when email confirmation is on,
/// just the new user.
fn session_from_signup(email: &str, body: serde_json::Value) -> Result<SessionData, AuthError> {
    if body.get("access_token").is_some() {
        session_from_grant(body)
    } else {
        Err(AuthError::ConfirmationRequired(email.to_string()))
    }
}

impl AuthProvider for RestAuth {
    async fn sign_in(&self, email: &str, password: &str) -> Result<SessionData, AuthError> {
        let body = self
            .post_grant("token?grant_type=password", &PasswordGrant { email, password })
            .await
            .map_err(|e| match e {
                ApiError::Rejected(_) | ApiError::Unauthorized => AuthError::InvalidCredentials,
                other => AuthError::Api(other),
            })?;

        let session = session_from_grant(body)?;
        info!(user_id = %session.user.id, "Signed in");
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<SessionData, AuthError> {
        let body = self
            .post_grant("signup", &PasswordGrant { email, password })
            .await?;
        session_from_signup(email, body)
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<SessionData, AuthError> {
        let body = self
            .post_grant("token?grant_type=refresh_token", &RefreshGrant { refresh_token })
            .await
            .map_err(|e| match e {
                ApiError::Rejected(_) | ApiError::Unauthorized => AuthError::SessionExpired,
                other => AuthError::Api(other),
            })?;

        let session = session_from_grant(body)?;
        info!(user_id = %session.user.id, "Session refreshed");
        Ok(session)
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        let url = self.url("logout")?;
        let response = self
            .client
            .post(&url)
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(ApiError::from)?;

        match Self::check_response(response).await {
            Ok(_) => Ok(()),
            // Token already revoked or expired: nothing left to sign out
            Err(ApiError::Unauthorized) | Err(ApiError::NotFound(_)) => {
                debug!("Sign out with stale token");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn current_user(&self, access_token: &str) -> Result<User, AuthError> {
        let url = self.url("user")?;
        let response = self
            .client
            .get(&url)
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(ApiError::from)?;

        match Self::check_response(response).await {
            Ok(response) => Ok(response.json::<User>().await.map_err(ApiError::from)?),
            Err(ApiError::Unauthorized) => Err(AuthError::SessionExpired),
            Err(e) => Err(e.into()),
        }
    }
}
