//! Bounded retry with exponential backoff for provider calls.

use std::future::Future;
use std::time::Duration;

use stocklens_core::{CancelToken, CoreError};
use tracing::warn;

/// Runs `op` up to `attempts` times, sleeping `base_delay * 2^n` between
/// tries. Only retryable failures are attempted again, and never after
/// cancellation.
///
/// # Errors
/// The last provider error when all attempts are exhausted.
pub async fn with_retry<T, F, Fut>(
    attempts: u32,
    base_delay: Duration,
    cancel: &CancelToken,
    label: &str,
    mut op: F,
) -> Result<T, CoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CoreError>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt + 1 < attempts && !cancel.is_cancelled() => {
                attempt += 1;
                let delay = base_delay * 2u32.saturating_pow(attempt - 1);
                warn!(%label, %err, attempt, "transient failure, backing off");
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use stocklens_core::cancel_pair;

    fn transient() -> CoreError {
        CoreError::Transient {
            symbol: "HK.00700".to_string(),
            message: "timeout".to_string(),
        }
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let (_handle, cancel) = cancel_pair();
        let result = with_retry(3, Duration::from_millis(1), &cancel, "bars", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(transient())
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_attempts_exhausted() {
        let calls = AtomicU32::new(0);
        let (_handle, cancel) = cancel_pair();
        let result: Result<(), CoreError> =
            with_retry(3, Duration::from_millis(1), &cancel, "bars", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(transient()) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_fails_immediately() {
        let calls = AtomicU32::new(0);
        let (_handle, cancel) = cancel_pair();
        let result: Result<(), CoreError> =
            with_retry(3, Duration::from_millis(1), &cancel, "bars", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(CoreError::NotFound {
                        symbol: "US.NOPE".to_string(),
                    })
                }
            })
            .await;
        assert!(matches!(result, Err(CoreError::NotFound { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancellation_stops_retrying() {
        let calls = AtomicU32::new(0);
        let (handle, cancel) = cancel_pair();
        handle.cancel();
        let result: Result<(), CoreError> =
            with_retry(3, Duration::from_millis(1), &cancel, "bars", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(transient()) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
