use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::config::Config;
use crate::desktop::Platform;
use crate::error::{Result, WebDriverError};
use crate::session::{Session, SessionRepository};

/// Shared application state
pub struct AppState {
    pub config: Config,

    /// Live sessions: session_id -> session
    pub sessions: Arc<SessionRepository>,

    /// Automation backend shared by every session
    pub platform: Arc<dyn Platform>,

    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: Config, platform: Arc<dyn Platform>) -> Self {
        Self {
            config,
            sessions: Arc::new(SessionRepository::new()),
            platform,
            started_at: Utc::now(),
        }
    }

    /// Resolve a session and record command activity on it
    pub fn get_session(&self, session_id: &str) -> Result<Arc<Session>> {
        let session = self
            .sessions
            .find_by_id(session_id)
            .ok_or_else(|| WebDriverError::SessionNotFound(session_id.to_string()))?;
        session.touch();
        Ok(session)
    }

    /// Like [`get_session`](Self::get_session), but the session's application
    /// must still be running.
    pub async fn get_active_session(&self, session_id: &str) -> Result<Arc<Session>> {
        let session = self.get_session(session_id)?;
        session.ensure_app_running().await?;
        Ok(session)
    }
}
