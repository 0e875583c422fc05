//! Store access: connection pool, per-connection pragmas, startup retry

pub mod backoff;
pub mod pool;
pub mod pragma;

pub use backoff::ExponentialBackoff;
pub use pool::{ConnectionPool, PoolOptions, PooledConnection};

use crate::error::{MonitorError, MonitorResult};
use std::path::Path;

/// Startup connection sequence
///
/// Retries opening the pool until the backoff budget is spent, then gives
/// up with `MonitorError::Connection`. This is the only retry loop in the
/// crate; everything after startup surfaces failures to its caller.
pub async fn connect_with_retry(
    path: impl AsRef<Path>,
    options: PoolOptions,
    mut backoff: ExponentialBackoff,
) -> MonitorResult<ConnectionPool> {
    let path = path.as_ref();
    loop {
        match ConnectionPool::open(path, options.clone()) {
            Ok(pool) => return Ok(pool),
            Err(e) => {
                log::warn!("⚠️  Store not reachable at {}: {}", path.display(), e);
                if backoff.sleep().await.is_err() {
                    return Err(MonitorError::Connection(format!(
                        "giving up on {} after {} retries: {}",
                        path.display(),
                        backoff.attempts(),
                        e
                    )));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_connect_succeeds_first_try() {
        let dir = tempdir().unwrap();
        let backoff = ExponentialBackoff::new(Duration::ZERO, Duration::ZERO, 0);
        let pool = connect_with_retry(dir.path().join("ok.db"), PoolOptions::default(), backoff)
            .await
            .unwrap();
        assert_eq!(pool.size(), 4);
    }

    #[tokio::test]
    async fn test_connect_gives_up_after_budget() {
        let dir = tempdir().unwrap();
        let backoff = ExponentialBackoff::new(Duration::ZERO, Duration::ZERO, 2);
        let err = connect_with_retry(dir.path(), PoolOptions::default(), backoff)
            .await
            .err()
            .unwrap();
        assert!(err.is_fatal_at_startup());
        assert!(err.to_string().contains("after 2 retries"));
    }
}
