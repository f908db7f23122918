//! Database Retry Logic
//!
//! Exponential backoff for transient SQLite lock errors. Two `run-task`
//! processes may write the task table at the same time; a busy database is
//! retried here before it is reported as an infrastructure failure.

use std::future::Future;
use std::time::{Duration, Instant};
use karaoke_common::{Error, Result};

/// Default upper bound on total retry time
pub const DEFAULT_MAX_LOCK_WAIT_MS: u64 = 5000;

/// Retry a database operation with exponential backoff until max_wait_ms elapses.
///
/// **Algorithm:**
/// 1. Attempt operation
/// 2. If successful, return result
/// 3. If "database is locked" error and time remains: backoff, retry
/// 4. Any other error: return immediately
///
/// **Backoff:** 10ms doubling per attempt, capped at 1000ms.
pub async fn retry_on_lock<F, Fut, T>(
    operation_name: &str,
    max_wait_ms: u64,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let start_time = Instant::now();
    let max_duration = Duration::from_millis(max_wait_ms);
    let mut attempt = 0u32;
    let mut backoff_ms = 10u64;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::debug!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = start_time.elapsed().as_millis() as u64,
                        "Database operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) if !err.is_database_locked() => return Err(err),
            Err(err) => {
                let elapsed = start_time.elapsed();

                if elapsed >= max_duration {
                    tracing::error!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = elapsed.as_millis() as u64,
                        max_wait_ms,
                        "Database operation failed: max retry time exceeded"
                    );
                    return Err(err);
                }

                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    backoff_ms,
                    "Database locked, will retry after backoff"
                );

                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms = (backoff_ms * 2).min(1000);
            }
        }
    }
}
