use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::User;

/// Session file name in cache directory
const SESSION_FILE: &str = "session.json";

/// Buffer time before expiry to trigger refresh (5 minutes)
const TOKEN_REFRESH_BUFFER_MINUTES: i64 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub user: User,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl SessionData {
    /// Build session data from a token grant that is valid for `expires_in` seconds.
    pub fn new(access_token: String, refresh_token: Option<String>, user: User, expires_in: i64) -> Self {
        let created_at = Utc::now();
        Self {
            access_token,
            refresh_token,
            user,
            expires_at: created_at + Duration::seconds(expires_in),
            created_at,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Check if the session will expire soon and should be refreshed
    pub fn needs_refresh(&self) -> bool {
        Utc::now() > self.expires_at - Duration::minutes(TOKEN_REFRESH_BUFFER_MINUTES)
    }

    pub fn time_until_expiry(&self) -> Duration {
        self.expires_at - Utc::now()
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self) -> i64 {
        self.time_until_expiry().num_minutes().max(0)
    }
}

pub struct Session {
    cache_dir: PathBuf,
    pub data: Option<SessionData>,
}

impl Session {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self {
            cache_dir,
            data: None,
        }
    }

    /// Load session from disk. Expired sessions are ignored.
    pub fn load(&mut self) -> Result<bool> {
        let path = self.session_path();
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .context("Failed to read session file")?;
            let data: SessionData = serde_json::from_str(&contents)
                .context("Failed to parse session file")?;

            if !data.is_expired() {
                self.data = Some(data);
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Save session to disk
    pub fn save(&self) -> Result<()> {
        if let Some(ref data) = self.data {
            let path = self.session_path();
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let contents = serde_json::to_string_pretty(data)?;
            std::fs::write(path, contents)?;
        }
        Ok(())
    }

    /// Clear session data
    pub fn clear(&mut self) -> Result<()> {
        self.data = None;
        let path = self.session_path();
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    /// Update session with new data
    pub fn update(&mut self, data: SessionData) {
        self.data = Some(data);
    }

    /// Get the bearer token if session is valid
    pub fn token(&self) -> Option<&str> {
        self.valid_data().map(|d| d.access_token.as_str())
    }

    /// Current user if the session is valid
    pub fn user(&self) -> Option<&User> {
        self.valid_data().map(|d| &d.user)
    }

    /// Refresh token of a still valid session that is close to expiry.
    pub fn refresh_token_due(&self) -> Option<&str> {
        self.valid_data()
            .filter(|d| d.needs_refresh())
            .and_then(|d| d.refresh_token.as_deref())
    }

    /// Check if session is valid (exists and not expired)
    pub fn is_valid(&self) -> bool {
        self.valid_data().is_some()
    }

    fn valid_data(&self) -> Option<&SessionData> {
        self.data.as_ref().filter(|d| !d.is_expired())
    }

    fn session_path(&self) -> PathBuf {
        self.cache_dir.join(SESSION_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: "u1".into(),
            email: "a@example.com".into(),
            created_at: "2024-01-01T00:00:00Z".into(),
        }
    }

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("cashtrack-session-{}", rand::random::<u64>()))
    }

    #[test]
    fn test_fresh_session_is_valid() {
        let data = SessionData::new("token".into(), None, user(), 3600);
        assert!(!data.is_expired());
        assert!(!data.needs_refresh());
        assert!(data.minutes_until_expiry() >= 59);
    }

    #[test]
    fn test_short_session_needs_refresh() {
        let data = SessionData::new("token".into(), None, user(), 120);
        assert!(!data.is_expired());
        assert!(data.needs_refresh());
    }

    #[test]
    fn test_refresh_token_due_only_near_expiry() {
        let mut session = Session::new(temp_dir());
        session.update(SessionData::new("token".into(), Some("r1".into()), user(), 3600));
        assert_eq!(session.refresh_token_due(), None);

        session.update(SessionData::new("token".into(), Some("r1".into()), user(), 120));
        assert_eq!(session.refresh_token_due(), Some("r1"));

        session.update(SessionData::new("token".into(), None, user(), 120));
        assert_eq!(session.refresh_token_due(), None);

        let mut expired = SessionData::new("token".into(), Some("r1".into()), user(), 3600);
        expired.expires_at = Utc::now() - Duration::minutes(1);
        session.update(expired);
        assert_eq!(session.refresh_token_due(), None);
    }

    #[test]
    fn test_expired_session() {
        let mut data = SessionData::new("token".into(), None, user(), 3600);
        data.expires_at = Utc::now() - Duration::minutes(1);
        assert!(data.is_expired());
        assert_eq!(data.minutes_until_expiry(), 0);

        let mut session = Session::new(temp_dir());
        session.update(data);
        assert!(!session.is_valid());
        assert!(session.token().is_none());
        assert!(session.user().is_none());
    }

    #[test]
    fn test_save_load_clear() {
        let dir = temp_dir();
        let mut session = Session::new(dir.clone());
        session.update(SessionData::new("token".into(), Some("refresh".into()), user(), 3600));
        session.save().unwrap();

        let mut restored = Session::new(dir.clone());
        assert!(restored.load().unwrap());
        assert_eq!(restored.token(), Some("token"));
        assert_eq!(restored.user().map(|u| u.id.as_str()), Some("u1"));

        restored.clear().unwrap();
        let mut empty = Session::new(dir.clone());
        assert!(!empty.load().unwrap());

        let _ = std::fs::remove_dir_all(dir);
    }
}
