use dashmap::DashMap;
use std::sync::Arc;
use tokio::time::Instant;

use super::Session;

/// All live sessions, keyed by session id
#[derive(Default)]
pub struct SessionRepository {
    sessions: DashMap<String, Arc<Session>>,
}

impl SessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, session: Arc<Session>) {
        self.sessions.insert(session.id.clone(), session);
    }

    pub fn find_by_id(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.get(id).map(|s| s.value().clone())
    }

    /// Remove a session. Only the caller that gets `Some` back owns disposal.
    pub fn delete(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.remove(id).map(|(_, session)| session)
    }

    pub fn find_all(&self) -> Vec<Arc<Session>> {
        self.sessions.iter().map(|s| s.value().clone()).collect()
    }

    pub fn find_timed_out(&self, now: Instant) -> Vec<Arc<Session>> {
        self.sessions
            .iter()
            .filter(|s| s.is_timed_out(now))
            .map(|s| s.value().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desktop::SimulatedDesktop;
    use crate::session::SessionOptions;
    use std::time::Duration;

    fn session(new_command_timeout: Duration) -> Arc<Session> {
        let options = SessionOptions {
            new_command_timeout,
            ..SessionOptions::default()
        };
        let session = tokio_test::block_on(Session::create(
            Arc::new(SimulatedDesktop::new()),
            options,
        ))
        .unwrap();
        Arc::new(session)
    }

    #[test]
    fn test_add_find_delete() {
        let repository = SessionRepository::new();
        let session = session(Duration::from_secs(60));
        repository.add(session.clone());

        assert_eq!(repository.len(), 1);
        assert!(repository.find_by_id(&session.id).is_some());
        assert!(repository.delete(&session.id).is_some());
        // the second delete loses the race and must not dispose again
        assert!(repository.delete(&session.id).is_none());
        assert!(repository.is_empty());
    }

    #[test]
    fn test_find_timed_out_uses_each_session_timeout() {
        let repository = SessionRepository::new();
        let short = session(Duration::from_secs(1));
        let long = session(Duration::from_secs(60));
        repository.add(short.clone());
        repository.add(long);

        let later = Instant::now() + Duration::from_secs(2);
        let timed_out = repository.find_timed_out(later);
        assert_eq!(timed_out.len(), 1);
        assert_eq!(timed_out[0].id, short.id);

        assert!(repository.find_timed_out(Instant::now()).is_empty());
    }
}
