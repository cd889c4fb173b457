//! Database Retry Logic
//!
//! Exponential backoff for SQLite lock contention on the shared ledger.
//! Each statement already waits up to the connection's busy timeout; this
//! loop bounds the total wait across attempts.

use crate::error::LedgerAccessError;
use std::time::{Duration, Instant};

/// Retry a database operation with exponential backoff until `max_wait_ms` elapses.
///
/// **Algorithm:**
/// 1. Attempt operation
/// 2. If successful, return result
/// 3. If the database is locked/busy:
///    a. If time elapsed < max_wait_ms: log WARN, backoff, retry
///    b. Otherwise: log ERROR, return `LockTimeout`
/// 4. Any other error is returned immediately
///
/// **Backoff Strategy:** 10ms initial, doubling, capped at 1000ms.
pub async fn retry_on_lock<F, Fut, T>(
    operation_name: &str,
    max_wait_ms: u64,
    mut operation: F,
) -> Result<T, LedgerAccessError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, LedgerAccessError>>,
{
    let start_time = Instant::now();
    let max_duration = Duration::from_millis(max_wait_ms);
    let mut attempt: u32 = 0;
    let mut backoff_ms = 10u64;

    loop {
        attempt += 1;

        if attempt > 1 {
            tracing::debug!(
                operation = operation_name,
                attempt,
                "Retrying ledger operation"
            );
        }

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    let elapsed_ms = start_time.elapsed().as_millis();
                    if elapsed_ms > 2000 {
                        tracing::warn!(
                            operation = operation_name,
                            attempt,
                            elapsed_ms = elapsed_ms,
                            "Ledger operation succeeded after significant retry period (>2s)"
                        );
                    } else {
                        tracing::debug!(
                            operation = operation_name,
                            attempt,
                            elapsed_ms = elapsed_ms,
                            "Ledger operation succeeded after retry"
                        );
                    }
                }
                return Ok(result);
            }
            Err(err) => {
                if !is_lock_error(&err) {
                    return Err(err);
                }

                let elapsed = start_time.elapsed();

                if elapsed >= max_duration {
                    tracing::error!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = elapsed.as_millis(),
                        max_wait_ms,
                        "Ledger operation failed: max retry time exceeded"
                    );
                    return Err(LedgerAccessError::LockTimeout {
                        attempts: attempt,
                        elapsed_ms: elapsed.as_millis() as u64,
                        max_wait_ms,
                    });
                }

                let sleep_ms = backoff_ms
                    .min(1000)
                    .min(max_duration.saturating_sub(elapsed).as_millis() as u64)
                    .max(1);

                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    elapsed_ms = elapsed.as_millis(),
                    backoff_ms = sleep_ms,
                    remaining_ms = max_duration.saturating_sub(elapsed).as_millis(),
                    "Ledger locked, will retry after backoff"
                );

                tokio::time::sleep(Duration::from_millis(sleep_ms)).await;

                backoff_ms = (backoff_ms * 2).min(1000);
            }
        }
    }
}

/// SQLITE_BUSY / SQLITE_LOCKED, by code or by message, or no free pooled connection
pub fn is_lock_error(err: &LedgerAccessError) -> bool {
    match err {
        // Every pooled connection is held by other workers on this handle
        LedgerAccessError::Database(sqlx::Error::PoolTimedOut) => true,
        LedgerAccessError::Database(sqlx::Error::Database(db_err)) => {
            // Primary result code is the low byte of the extended code
            let code_is_busy = db_err
                .code()
                .and_then(|code| code.parse::<i32>().ok())
                .map(|code| matches!(code & 0xff, 5 | 6))
                .unwrap_or(false);
            code_is_busy
                || db_err.message().contains("database is locked")
                || db_err.message().contains("database table is locked")
        }
        _ => false,
    }
}
