//! Fixed-bound retry combinator for external call boundaries.
//!
//! Every generative collaborator call is wrapped in [`call_with_retry`]
//! with a uniform [`RetryPolicy`]: fixed attempt count, fixed delay between
//! attempts, no backoff, no jitter. Only transient failures are retried;
//! once the bound is consumed the combinator surfaces
//! [`WorkflowError::ExhaustedRetries`] and the caller aborts.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::WorkflowError;

/// Attempt count and inter-attempt delay applied uniformly to every
/// generative collaborator call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first (minimum 1).
    pub attempts: u32,
    /// Fixed delay between attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }

    /// A policy that never retries; useful in tests.
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(5))
    }
}

/// Invoke `op` until it succeeds, fails non-transiently, or the policy's
/// attempt bound is consumed.
///
/// `call` labels the boundary for logging and for the resulting
/// `ExhaustedRetries` error.
pub async fn call_with_retry<T, F, Fut>(
    policy: RetryPolicy,
    call: &str,
    mut op: F,
) -> Result<T, WorkflowError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, WorkflowError>>,
{
    let bound = policy.attempts.max(1);
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() => {
                if attempt >= bound {
                    return Err(WorkflowError::ExhaustedRetries {
                        call: call.to_string(),
                        attempts: bound,
                        last_error: e.to_string(),
                    });
                }
                tracing::warn!(call, attempt, error = %e, "transient failure, retrying");
                tokio::time::sleep(policy.delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn flaky(
        failures_before_success: u32,
        calls: &AtomicU32,
    ) -> impl Future<Output = Result<&'static str, WorkflowError>> + '_ {
        let n = calls.fetch_add(1, Ordering::SeqCst);
        async move {
            if n < failures_before_success {
                Err(WorkflowError::transient("chat", "timeout"))
            } else {
                Ok("annotated")
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_first_try() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_secs(5));
        let out = call_with_retry(policy, "chat", || flaky(0, &calls)).await;
        assert_eq!(out.unwrap(), "annotated");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_within_bound() {
        // Fails (bound - 1) times, then succeeds on the final attempt.
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_secs(5));
        let out = call_with_retry(policy, "chat", || flaky(2, &calls)).await;
        assert_eq!(out.unwrap(), "annotated");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_then_fails() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_secs(5));
        let out = call_with_retry(policy, "chat", || flaky(10, &calls)).await;
        match out {
            Err(WorkflowError::ExhaustedRetries { attempts, call, .. }) => {
                assert_eq!(attempts, 3);
                assert_eq!(call, "chat");
            }
            other => panic!("expected ExhaustedRetries, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn non_transient_passes_through_immediately() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(5, Duration::from_secs(5));
        let out: Result<(), _> = call_with_retry(policy, "verifier", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(WorkflowError::VerifierUnavailable("down".into())) }
        })
        .await;
        assert!(matches!(out, Err(WorkflowError::VerifierUnavailable(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_attempts_still_calls_once() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(0, Duration::ZERO);
        let out = call_with_retry(policy, "chat", || flaky(0, &calls)).await;
        assert!(out.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
