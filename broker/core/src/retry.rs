//! Retry-with-backoff wrapper for transient broker errors:
//! up to three attempts, base delay 2s, capped at 30s. Permanent errors
//! (4xx, auth failures) are returned to the caller on the first attempt.
use crate::error::Error;
use backoff::backoff::Backoff;
use backoff::ExponentialBackoffBuilder;
use std::future::Future;
use std::time::Duration;

const MAX_ATTEMPTS: u32 = 3;

pub async fn with_retry<T, F, Fut>(operation_name: &str, mut f: F) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let mut backoff = ExponentialBackoffBuilder::new()
        .with_initial_interval(Duration::from_secs(2))
        .with_max_interval(Duration::from_secs(30))
        .with_max_elapsed_time(None)
        .build();

    let mut attempt = 1;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < MAX_ATTEMPTS => {
                let delay = backoff.next_backoff().unwrap_or(Duration::from_secs(30));
                warn!(operation_name, attempt, delay_ms = delay.as_millis() as u64, error = %err, "transient broker error, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                if attempt >= MAX_ATTEMPTS {
                    error!(operation_name, attempt, error = %err, "exhausted retries");
                } else {
                    error!(operation_name, error = %err, "permanent broker error");
                }
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_after_two_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = with_retry("test_op", || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(Error::RateLimited)
            } else {
                Ok(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), Error> = with_retry("test_op", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::InvalidRequest("bad symbol".into()))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
