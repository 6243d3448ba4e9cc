//! services/api/src/retry.rs
//!
//! Bounded retry with exponential backoff for calls to external services.
//! Only transient failures are retried; input and auth failures surface
//! immediately.

use std::future::Future;
use std::time::Duration;

use rag_chat_core::ports::{PortError, PortResult};
use tracing::warn;

/// Default attempt budget for outbound service calls.
pub const DEFAULT_ATTEMPTS: u32 = 3;

const BASE_DELAY: Duration = Duration::from_millis(200);

/// Runs `call` up to `max_attempts` times, sleeping 200ms, 400ms, ... between
/// attempts. The final error is returned once the budget is exhausted.
pub async fn with_backoff<T, F, Fut>(op: &str, max_attempts: u32, mut call: F) -> PortResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = PortResult<T>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < max_attempts => {
                let delay = BASE_DELAY * 2u32.saturating_pow(attempt - 1);
                warn!(
                    op,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn returns_first_success() {
        let calls = AtomicU32::new(0);
        let result = with_backoff("op", 3, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, PortError>(42) }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_transient_failures_until_budget() {
        let calls = AtomicU32::new(0);
        let result: PortResult<()> = with_backoff("op", 3, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(PortError::Retrieval("down".to_string())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_deterministic_failures() {
        let calls = AtomicU32::new(0);
        let result: PortResult<()> = with_backoff("op", 3, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(PortError::InvalidInput("bad".to_string())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn eventual_success_within_budget() {
        let calls = AtomicU32::new(0);
        let result = with_backoff("op", 3, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 1 {
                    Err(PortError::Generation("flaky".to_string()))
                } else {
                    Ok("ok")
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
