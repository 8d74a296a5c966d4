//! Retry loop for optimistic-concurrency conflicts.

use std::fmt::Display;
use std::future::Future;

use lessonbook_core::ledger::LedgerError;
use lessonbook_core::refund::RefundError;
use tracing::warn;

/// Errors that may succeed on a fresh attempt.
pub(crate) trait Retryable {
    fn retryable(&self) -> bool;
}

impl Retryable for LedgerError {
    fn retryable(&self) -> bool {
        self.is_retryable()
    }
}

impl Retryable for RefundError {
    fn retryable(&self) -> bool {
        self.is_retryable()
    }
}

/// Runs `attempt`, retrying retryable failures up to `max_retries` times.
///
/// Each attempt opens its own transaction, so a failed attempt leaves nothing behind.
pub(crate) async fn with_retry<T, E, F, Fut>(
    max_retries: u32,
    operation: &'static str,
    mut attempt: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
{
    let mut retries = 0;
    loop {
        match attempt().await {
            Err(err) if err.retryable() && retries < max_retries => {
                retries += 1;
                warn!(operation, retries, error = %err, "Retrying after conflict");
            }
            result => return result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[tokio::test]
    async fn test_retries_until_success() {
        let calls = Cell::new(0);
        let result: Result<u32, LedgerError> = with_retry(3, "test", || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move {
                if n < 3 {
                    Err(LedgerError::ConcurrentModification)
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let calls = Cell::new(0);
        let result: Result<(), LedgerError> = with_retry(2, "test", || {
            calls.set(calls.get() + 1);
            async { Err(LedgerError::ConcurrentModification) }
        })
        .await;
        assert!(matches!(result, Err(LedgerError::ConcurrentModification)));
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_does_not_retry_business_errors() {
        let calls = Cell::new(0);
        let result: Result<(), RefundError> = with_retry(5, "test", || {
            calls.set(calls.get() + 1);
            async { Err(RefundError::RemarkRequired) }
        })
        .await;
        assert!(matches!(result, Err(RefundError::RemarkRequired)));
        assert_eq!(calls.get(), 1);
    }
}
