use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::SessionRepository;

/// Remove and dispose every session idle for longer than its new command
/// timeout. Returns how many were removed.
pub async fn sweep(repository: &SessionRepository) -> usize {
    let timed_out = repository.find_timed_out(Instant::now());
    if timed_out.is_empty() {
        tracing::debug!("Session cleanup found no timed out sessions");
        return 0;
    }

    tracing::info!("Session cleanup removing {} timed out session(s)", timed_out.len());
    let mut removed = 0;
    for session in timed_out {
        // an explicit delete may have won the race
        if let Some(session) = repository.delete(&session.id) {
            tracing::info!(
                "Session {} timed out after {:?} without commands",
                session.id,
                session.new_command_timeout()
            );
            session.dispose().await;
            removed += 1;
        }
    }
    removed
}

/// Run [`sweep`] every `period` until `shutdown` flips to true or its sender
/// is dropped.
pub fn spawn_cleanup_task(
    repository: Arc<SessionRepository>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!("Session cleanup running every {:?}", period);
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    sweep(&repository).await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!("Session cleanup stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desktop::SimulatedDesktop;
    use crate::session::{Session, SessionOptions};

    async fn session_with_timeout(timeout: Duration) -> Arc<Session> {
        let session = Session::create(
            Arc::new(SimulatedDesktop::new()),
            SessionOptions {
                new_command_timeout: timeout,
                ..Default::default()
            },
        )
        .await
        .unwrap();
        Arc::new(session)
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_removes_only_timed_out_sessions() {
        let repository = SessionRepository::new();
        let short = session_with_timeout(Duration::from_secs(1)).await;
        let long = session_with_timeout(Duration::from_secs(60)).await;
        repository.add(short.clone());
        repository.add(long.clone());

        assert_eq!(sweep(&repository).await, 0);

        tokio::time::advance(Duration::from_millis(1500)).await;
        assert_eq!(sweep(&repository).await, 1);
        assert!(repository.find_by_id(&short.id).is_none());
        assert!(short.is_disposed());
        assert!(repository.find_by_id(&long.id).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_sweeps_periodically_and_stops() {
        let repository = Arc::new(SessionRepository::new());
        let session = session_with_timeout(Duration::from_secs(1)).await;
        repository.add(session.clone());

        let (tx, rx) = watch::channel(false);
        let task = spawn_cleanup_task(repository.clone(), Duration::from_secs(2), rx);

        tokio::time::sleep(Duration::from_millis(2100)).await;
        assert!(repository.is_empty());
        assert!(session.is_disposed());

        tx.send(true).unwrap();
        task.await.unwrap();
    }
}
