//! Polling helpers for implicit waits.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Repeatedly evaluates `check` until `done` accepts its result or `timeout`
/// elapses. The check always runs at least once; the last result is returned
/// either way.
pub async fn until<T, E, F, Fut, P>(timeout: Duration, mut check: F, done: P) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&T) -> bool,
{
    let deadline = Instant::now() + timeout;
    loop {
        let value = check().await?;
        if done(&value) || Instant::now() >= deadline {
            return Ok(value);
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        tokio::time::sleep(remaining.min(POLL_INTERVAL)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_returns_immediately_when_satisfied() {
        let calls = AtomicUsize::new(0);
        let result: Result<usize, ()> = until(
            Duration::from_secs(5),
            || async { Ok(calls.fetch_add(1, Ordering::SeqCst) + 1) },
            |n| *n >= 1,
        )
        .await;
        assert_eq!(result, Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_until_deadline() {
        let start = Instant::now();
        let result: Result<Option<u8>, ()> =
            until(Duration::from_millis(200), || async { Ok(None) }, Option::is_some).await;
        assert_eq!(result, Ok(None));
        assert!(start.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_timeout_checks_once() {
        let calls = AtomicUsize::new(0);
        let _: Result<bool, ()> = until(
            Duration::ZERO,
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(false)
            },
            |done| *done,
        )
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
