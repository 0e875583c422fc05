//! Owned pool of SQLite connections
//!
//! The pool is an explicit handle: it is built once at startup and every
//! component that touches the store holds an `Arc` of it. Checkouts are
//! scoped, the guard hands its connection back on drop, including when
//! the caller bails out with `?` in the middle of a transaction (rusqlite
//! rolls back an uncommitted `Transaction` on drop first).

use super::pragma::apply_connection_pragmas;
use crate::error::{MonitorError, MonitorResult};
use rusqlite::Connection;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::{Semaphore, SemaphorePermit};

#[derive(Debug, Clone)]
pub struct PoolOptions {
    pub size: usize,
    pub busy_timeout: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            size: 4,
            busy_timeout: Duration::from_millis(5_000),
        }
    }
}

#[derive(Debug)]
pub struct ConnectionPool {
    path: PathBuf,
    options: PoolOptions,
    idle: Mutex<Vec<Connection>>,
    permits: Semaphore,
}

impl ConnectionPool {
    /// Open the pool and eagerly check one connection out of the store
    ///
    /// Fails with `MonitorError::Connection` when the database file cannot
    /// be opened or configured.
    pub fn open(path: impl AsRef<Path>, options: PoolOptions) -> MonitorResult<Self> {
        let path = path.as_ref().to_path_buf();
        let size = options.size.max(1);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    MonitorError::Connection(format!(
                        "failed to create database directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let first = Self::connect(&path, &options)?;

        log::info!(
            "✅ Connection pool ready: {} (size: {})",
            path.display(),
            size
        );

        Ok(Self {
            path,
            options: PoolOptions { size, ..options },
            idle: Mutex::new(vec![first]),
            permits: Semaphore::new(size),
        })
    }

    fn connect(path: &Path, options: &PoolOptions) -> MonitorResult<Connection> {
        let conn = Connection::open(path).map_err(|e| {
            MonitorError::Connection(format!("open {}: {}", path.display(), e))
        })?;
        apply_connection_pragmas(&conn, options.busy_timeout).map_err(|e| {
            MonitorError::Connection(format!("configure {}: {}", path.display(), e))
        })?;
        Ok(conn)
    }

    /// Check out a connection, waiting while all of them are in use
    pub async fn acquire(&self) -> MonitorResult<PooledConnection<'_>> {
        let permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| MonitorError::Connection("connection pool closed".into()))?;

        let reused = self.idle_list().pop();
        let conn = match reused {
            Some(conn) => conn,
            None => Self::connect(&self.path, &self.options)?,
        };

        Ok(PooledConnection {
            pool: self,
            conn: Some(conn),
            _permit: permit,
        })
    }

    pub fn size(&self) -> usize {
        self.options.size
    }

    /// Connections currently parked in the pool
    pub fn idle_count(&self) -> usize {
        self.idle_list().len()
    }

    fn idle_list(&self) -> std::sync::MutexGuard<'_, Vec<Connection>> {
        // A poisoned free list only means a thread panicked while pushing
        // or popping; the Vec itself is still valid.
        self.idle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Scoped checkout; derefs to the underlying `rusqlite::Connection`
pub struct PooledConnection<'a> {
    pool: &'a ConnectionPool,
    conn: Option<Connection>,
    _permit: SemaphorePermit<'a>,
}

impl Deref for PooledConnection<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn.as_ref().expect("connection present until drop")
    }
}

impl DerefMut for PooledConnection<'_> {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().expect("connection present until drop")
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            if conn.is_autocommit() {
                self.pool.idle_list().push(conn);
            } else {
                // Left mid-transaction; close it rather than recycle it
                log::warn!("⚠️  Discarding pooled connection left inside a transaction");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_checkout_returns_connection_on_drop() {
        let dir = tempdir().unwrap();
        let pool = ConnectionPool::open(dir.path().join("pool.db"), PoolOptions::default()).unwrap();
        assert_eq!(pool.idle_count(), 1);

        {
            let conn = pool.acquire().await.unwrap();
            conn.execute_batch("CREATE TABLE t (x INTEGER)").unwrap();
            assert_eq!(pool.idle_count(), 0);
        }
        assert_eq!(pool.idle_count(), 1);
    }

    #[tokio::test]
    async fn test_error_path_still_releases() {
        let dir = tempdir().unwrap();
        let pool = ConnectionPool::open(dir.path().join("pool.db"), PoolOptions::default()).unwrap();

        async fn failing(pool: &ConnectionPool) -> MonitorResult<()> {
            let mut conn = pool.acquire().await?;
            let tx = conn.transaction().map_err(MonitorError::query("test"))?;
            tx.execute_batch("SELECT * FROM missing_table")
                .map_err(MonitorError::query("test"))?;
            tx.commit().map_err(MonitorError::query("test"))
        }

        assert!(failing(&pool).await.is_err());
        // Transaction rolled back on drop, so the connection is recycled
        assert_eq!(pool.idle_count(), 1);
    }

    #[tokio::test]
    async fn test_size_bounds_concurrent_checkouts() {
        let dir = tempdir().unwrap();
        let options = PoolOptions {
            size: 2,
            ..PoolOptions::default()
        };
        let pool = Arc::new(ConnectionPool::open(dir.path().join("pool.db"), options).unwrap());

        let first = pool.acquire().await.unwrap();
        let _second = pool.acquire().await.unwrap();

        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move {
                let _third = pool.acquire().await.unwrap();
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        drop(first);
        tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_unreachable_store_is_connection_error() {
        let dir = tempdir().unwrap();
        // A directory cannot be opened as a database file
        let err = ConnectionPool::open(dir.path(), PoolOptions::default())
            .err()
            .unwrap();
        assert!(matches!(err, MonitorError::Connection(_)));
    }
}
