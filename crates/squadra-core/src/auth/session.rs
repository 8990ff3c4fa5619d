use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Session file name in the data directory
const SESSION_FILE: &str = "session.json";

/// Buffer before expiry at which a session should be refreshed (5 minutes)
const TOKEN_REFRESH_BUFFER_MINUTES: i64 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    pub access_token: String,
    pub refresh_token: String,
    pub user_id: String,
    pub email: String,
    pub expires_at: DateTime<Utc>,
}

impl SessionData {
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Check if the session will expire soon and should be refreshed
    pub fn needs_refresh(&self) -> bool {
        Utc::now() > self.expires_at - Duration::minutes(TOKEN_REFRESH_BUFFER_MINUTES)
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self) -> i64 {
        (self.expires_at - Utc::now()).num_minutes().max(0)
    }
}

/// The current session, optionally persisted to disk between runs.
pub struct Session {
    data_dir: PathBuf,
    persist: bool,
    pub data: Option<SessionData>,
}

impl Session {
    pub fn new(data_dir: PathBuf, persist: bool) -> Self {
        Self {
            data_dir,
            persist,
            data: None,
        }
    }

    /// Load session from disk. Returns whether a usable session is now held.
    ///
    /// An expired session is still kept when it can be refreshed, but
    /// `token()` stays `None` until it is.
    pub fn load(&mut self) -> Result<bool> {
        if !self.persist {
            return Ok(false);
        }
        let path = self.session_path();
        if path.exists() {
            let contents = std::fs::read_to_string(&path).context("Failed to read session file")?;
            let data: SessionData =
                serde_json::from_str(&contents).context("Failed to parse session file")?;

            let usable = !data.is_expired();
            if usable || !data.refresh_token.is_empty() {
                self.data = Some(data);
            }
            return Ok(usable);
        }
        Ok(false)
    }

    /// Save session to disk
    pub fn save(&self) -> Result<()> {
        if !self.persist {
            return Ok(());
        }
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

    /// Clear session data, in memory and on disk
    pub fn clear(&mut self) -> Result<()> {
        self.data = None;
        let path = self.session_path();
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    pub fn update(&mut self, data: SessionData) {
        self.data = Some(data);
    }

    /// Get the bearer token if session is valid
    pub fn token(&self) -> Option<&str> {
        self.data
            .as_ref()
            .filter(|d| !d.is_expired())
            .map(|d| d.access_token.as_str())
    }

    /// The session to refresh, if `auto_refresh` is on and its access
    /// token is near or past expiry.
    pub fn refresh_due(&self, auto_refresh: bool) -> Option<&SessionData> {
        self.data
            .as_ref()
            .filter(|d| auto_refresh && d.needs_refresh() && !d.refresh_token.is_empty())
    }

    pub fn user_id(&self) -> Option<&str> {
        self.data.as_ref().map(|d| d.user_id.as_str())
    }

    /// Check if session is valid (exists and not expired)
    pub fn is_valid(&self) -> bool {
        self.data.as_ref().map(|d| !d.is_expired()).unwrap_or(false)
    }

    fn session_path(&self) -> PathBuf {
        self.data_dir.join(SESSION_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_data(expires_in_minutes: i64) -> SessionData {
        SessionData {
            access_token: "jwt".to_string(),
            refresh_token: "refresh".to_string(),
            user_id: "u1".to_string(),
            email: "ana@example.com".to_string(),
            expires_at: Utc::now() + Duration::minutes(expires_in_minutes),
        }
    }

    #[test]
    fn test_expiry() {
        assert!(!session_data(60).is_expired());
        assert!(session_data(3).needs_refresh());
        assert!(session_data(-1).is_expired());
        assert_eq!(session_data(-10).minutes_until_expiry(), 0);
    }

    #[test]
    fn test_save_load_clear() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new(dir.path().to_path_buf(), true);
        session.update(session_data(60));
        session.save().unwrap();

        let mut reloaded = Session::new(dir.path().to_path_buf(), true);
        assert!(reloaded.load().unwrap());
        assert_eq!(reloaded.token(), Some("jwt"));
        assert_eq!(reloaded.user_id(), Some("u1"));

        reloaded.clear().unwrap();
        let mut empty = Session::new(dir.path().to_path_buf(), true);
        assert!(!empty.load().unwrap());
    }

    #[test]
    fn test_expired_session_kept_for_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new(dir.path().to_path_buf(), true);
        session.update(session_data(-5));
        session.save().unwrap();

        let mut reloaded = Session::new(dir.path().to_path_buf(), true);
        assert!(!reloaded.load().unwrap());
        assert!(!reloaded.is_valid());
        assert_eq!(reloaded.token(), None);
        assert_eq!(
            reloaded.refresh_due(true).map(|d| d.refresh_token.as_str()),
            Some("refresh")
        );
    }

    #[test]
    fn test_refresh_decision() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new(dir.path().to_path_buf(), false);
        assert!(session.refresh_due(true).is_none());

        session.update(session_data(60));
        assert!(session.refresh_due(true).is_none());

        session.update(session_data(3));
        assert!(session.refresh_due(true).is_some());
        assert!(session.refresh_due(false).is_none());

        session.update(SessionData {
            refresh_token: String::new(),
            ..session_data(-1)
        });
        assert!(session.refresh_due(true).is_none());
    }

    #[test]
    fn test_expired_session_without_refresh_token_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new(dir.path().to_path_buf(), true);
        session.update(SessionData {
            refresh_token: String::new(),
            ..session_data(-5)
        });
        session.save().unwrap();

        let mut reloaded = Session::new(dir.path().to_path_buf(), true);
        assert!(!reloaded.load().unwrap());
        assert!(reloaded.data.is_none());
    }

    #[test]
    fn test_non_persistent_session_skips_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new(dir.path().to_path_buf(), false);
        session.update(session_data(60));
        session.save().unwrap();

        assert!(!dir.path().join(SESSION_FILE).exists());
        assert!(session.is_valid());
    }
}
