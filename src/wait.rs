//! Blocking-poll helpers.
//!
//! The cluster control plane is eventually consistent and offers the harness
//! no subscription primitive, so every readiness stage is a sleep-and-recheck
//! loop with a hard deadline.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

/// Polls `check` until it yields `Some`, starting with an immediate check and
/// then repeating every `interval` until `deadline` has elapsed.
///
/// A check that yields `None` means "not ready yet" — transient errors inside
/// the check must be mapped to `None` by the caller. Returns `None` once the
/// deadline has passed without a successful check.
pub async fn poll_immediate<F, Fut, T>(interval: Duration, deadline: Duration, mut check: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let start = Instant::now();
    loop {
        if let Some(value) = check().await {
            return Some(value);
        }
        if start.elapsed() + interval > deadline {
            return None;
        }
        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn first_check_runs_immediately() {
        let calls = AtomicU32::new(0);
        let result = poll_immediate(Duration::from_secs(2), Duration::from_secs(10), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Some(()) }
        })
        .await;

        assert!(result.is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_some_failures() {
        let calls = AtomicU32::new(0);
        let result = poll_immediate(Duration::from_secs(2), Duration::from_secs(10), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { (n >= 3).then_some(n) }
        })
        .await;

        assert_eq!(result, Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_at_deadline() {
        let calls = AtomicU32::new(0);
        let result: Option<()> =
            poll_immediate(Duration::from_secs(2), Duration::from_secs(10), || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { None }
            })
            .await;

        assert!(result.is_none());
        // immediate check + one every 2s within the 10s window
        assert_eq!(calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn never_sleeps_past_the_deadline() {
        let start = Instant::now();
        let _: Option<()> =
            poll_immediate(Duration::from_secs(3), Duration::from_secs(10), || async { None }).await;
        assert!(start.elapsed() <= Duration::from_secs(10));
    }
}
