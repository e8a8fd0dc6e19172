// Retry and timeout utilities

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use crate::types::{AppError, AppResult};

/// Retry an async operation with exponential backoff (2^attempt seconds,
/// capped at 32s).
pub async fn with_retry<F, Fut, T, E>(mut operation: F, max_retries: u32) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(error) => {
                attempt += 1;
                if attempt >= max_retries {
                    return Err(error);
                }

                tracing::warn!(attempt, error = %error, "Operation failed, retrying");
                let delay = Duration::from_secs(2u64.pow(attempt.min(5)));
                sleep(delay).await;
            }
        }
    }
}

/// Bound an external call by a wall-clock budget. Elapsed budgets surface as
/// the caller's error type so tier-level degradation handles them like any
/// other upstream failure.
pub async fn with_timeout<Fut, T>(label: &str, secs: u64, fut: Fut) -> AppResult<T>
where
    Fut: Future<Output = AppResult<T>>,
{
    match tokio::time::timeout(Duration::from_secs(secs), fut).await {
        Ok(result) => result,
        Err(_) => Err(AppError::Internal(format!(
            "{} timed out after {}s",
            label, secs
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_retry_returns_first_success() {
        let mut calls = 0;
        let result: Result<i32, String> = tokio_test::block_on(with_retry(
            || {
                calls += 1;
                async move { Ok(42) }
            },
            3,
        ));
        assert_eq!(result, Ok(42));
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn with_timeout_elapses() {
        let result: AppResult<()> = with_timeout("slow call", 0, async {
            sleep(Duration::from_millis(50)).await;
            Ok(())
        })
        .await;
        assert!(result.is_err());
    }
}
