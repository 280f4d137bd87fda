//! Deadline-bounded execution of blocking work

use crate::error::{Result, ResumeMatchError};
use std::time::Duration;

/// Run `work` on tokio's blocking pool and wait at most `timeout` for it.
///
/// On timeout the caller gets `Timeout` and the late result is dropped.
/// The blocking thread cannot be interrupted, so anything `work` captures
/// (a concurrency permit, say) stays alive until it actually finishes.
pub async fn run_blocking<T, F>(operation: &'static str, timeout: Duration, work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let task = tokio::task::spawn_blocking(work);

    match tokio::time::timeout(timeout, task).await {
        Ok(joined) => joined.map_err(|e| ResumeMatchError::TaskFailed(e.to_string()))?,
        Err(_) => Err(ResumeMatchError::Timeout {
            operation,
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_result_passes_through() {
        let value = run_blocking("sum", Duration::from_secs(5), || Ok(2 + 2)).await.unwrap();
        assert_eq!(value, 4);
    }

    #[tokio::test]
    async fn test_slow_work_times_out() {
        let err = run_blocking("sleep", Duration::from_millis(1), || {
            std::thread::sleep(Duration::from_millis(300));
            Ok(())
        })
        .await
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(err.to_string(), "sleep timed out after 1 ms");
    }

    #[tokio::test]
    async fn test_captured_state_outlives_timeout() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&finished);

        let guard = Arc::new(());
        let held = Arc::clone(&guard);
        let result = run_blocking("sleep", Duration::from_millis(1), move || {
            let _held = held;
            std::thread::sleep(Duration::from_millis(100));
            flag.store(true, Ordering::SeqCst);
            Ok(())
        })
        .await;

        assert!(result.is_err());
        assert_eq!(Arc::strong_count(&guard), 2);

        // the closure drops its clone when it returns
        for _ in 0..200 {
            if finished.load(Ordering::SeqCst) && Arc::strong_count(&guard) == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(finished.load(Ordering::SeqCst));
        assert_eq!(Arc::strong_count(&guard), 1);
    }

    #[tokio::test]
    async fn test_panic_is_task_failure() {
        let err = run_blocking::<(), _>("panic", Duration::from_secs(5), || panic!("boom"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TaskFailed);
    }
}
