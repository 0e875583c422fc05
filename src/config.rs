//! Monitor configuration from environment variables

use crate::store::{ExponentialBackoff, PoolOptions};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Runtime configuration
///
/// Loaded from environment variables with sensible defaults. A value that
/// does not parse falls back to its default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Path to SQLite database file
    pub db_path: PathBuf,

    pub pool_size: usize,
    pub busy_timeout_ms: u64,

    /// Optional directory of `*.sql` files applied after the core schema
    pub extra_sql_dir: Option<PathBuf>,

    /// Directory read by the spool provider
    pub spool_dir: PathBuf,

    pub block_sync_interval_ms: u64,
    pub committee_refresh_interval_ms: u64,
    pub status_reconcile_interval_ms: u64,
    pub uptime_interval_ms: u64,

    /// Rounds covered by each uptime snapshot
    pub uptime_window_rounds: i64,

    /// Rounds behind the newest observed round that reconciliation waits
    /// before ticking a round, so batches landing in later blocks are seen
    pub reconcile_lag_rounds: i64,

    /// Most blocks ingested per block-sync tick
    pub block_sync_max_batch: usize,

    pub connect_max_retries: u32,
    pub connect_initial_delay_secs: u64,
    pub connect_max_delay_secs: u64,
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key).and_then(|s| s.trim().parse().ok()).unwrap_or(default)
}

impl MonitorConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `VALMON_DB_PATH` (default: /var/lib/valmon/valmon.db)
    /// - `VALMON_POOL_SIZE` (default: 4)
    /// - `VALMON_BUSY_TIMEOUT_MS` (default: 5000)
    /// - `VALMON_EXTRA_SQL_DIR` (default: unset)
    /// - `VALMON_SPOOL_DIR` (default: /var/lib/valmon/spool)
    /// - `BLOCK_SYNC_INTERVAL_MS` (default: 10000)
    /// - `COMMITTEE_REFRESH_INTERVAL_MS` (default: 60000)
    /// - `STATUS_RECONCILE_INTERVAL_MS` (default: 10000)
    /// - `UPTIME_INTERVAL_MS` (default: 300000)
    /// - `UPTIME_WINDOW_ROUNDS` (default: 1000)
    /// - `RECONCILE_LAG_ROUNDS` (default: 2)
    /// - `BLOCK_SYNC_MAX_BATCH` (default: 100)
    /// - `CONNECT_MAX_RETRIES` (default: 5)
    /// - `CONNECT_INITIAL_DELAY_SECS` (default: 1)
    /// - `CONNECT_MAX_DELAY_SECS` (default: 30)
    ///
    /// Intervals are at least 1ms.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            db_path: lookup("VALMON_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("/var/lib/valmon/valmon.db")),
            pool_size: parsed(&lookup, "VALMON_POOL_SIZE", 4usize).max(1),
            busy_timeout_ms: parsed(&lookup, "VALMON_BUSY_TIMEOUT_MS", 5_000),
            extra_sql_dir: lookup("VALMON_EXTRA_SQL_DIR")
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            spool_dir: lookup("VALMON_SPOOL_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("/var/lib/valmon/spool")),
            block_sync_interval_ms: parsed(&lookup, "BLOCK_SYNC_INTERVAL_MS", 10_000u64).max(1),
            committee_refresh_interval_ms: parsed(&lookup, "COMMITTEE_REFRESH_INTERVAL_MS", 60_000u64).max(1),
            status_reconcile_interval_ms: parsed(&lookup, "STATUS_RECONCILE_INTERVAL_MS", 10_000u64).max(1),
            uptime_interval_ms: parsed(&lookup, "UPTIME_INTERVAL_MS", 300_000u64).max(1),
            uptime_window_rounds: parsed(&lookup, "UPTIME_WINDOW_ROUNDS", 1_000i64).max(1),
            reconcile_lag_rounds: parsed(&lookup, "RECONCILE_LAG_ROUNDS", 2i64).max(0),
            block_sync_max_batch: parsed(&lookup, "BLOCK_SYNC_MAX_BATCH", 100usize).max(1),
            connect_max_retries: parsed(&lookup, "CONNECT_MAX_RETRIES", 5),
            connect_initial_delay_secs: parsed(&lookup, "CONNECT_INITIAL_DELAY_SECS", 1),
            connect_max_delay_secs: parsed(&lookup, "CONNECT_MAX_DELAY_SECS", 30),
        }
    }

    pub fn pool_options(&self) -> PoolOptions {
        PoolOptions {
            size: self.pool_size,
            busy_timeout: Duration::from_millis(self.busy_timeout_ms),
        }
    }

    pub fn connect_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(
            Duration::from_secs(self.connect_initial_delay_secs),
            Duration::from_secs(self.connect_max_delay_secs),
            self.connect_max_retries,
        )
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> MonitorConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        MonitorConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = MonitorConfig::default();

        assert_eq!(config.db_path, PathBuf::from("/var/lib/valmon/valmon.db"));
        assert_eq!(config.pool_size, 4);
        assert_eq!(config.busy_timeout_ms, 5_000);
        assert_eq!(config.extra_sql_dir, None);
        assert_eq!(config.block_sync_interval_ms, 10_000);
        assert_eq!(config.committee_refresh_interval_ms, 60_000);
        assert_eq!(config.status_reconcile_interval_ms, 10_000);
        assert_eq!(config.uptime_interval_ms, 300_000);
        assert_eq!(config.uptime_window_rounds, 1_000);
        assert_eq!(config.reconcile_lag_rounds, 2);
        assert_eq!(config.block_sync_max_batch, 100);
        assert_eq!(config.connect_max_retries, 5);
    }

    #[test]
    fn test_custom_config() {
        let config = config_from(&[
            ("VALMON_DB_PATH", "/tmp/test.db"),
            ("VALMON_POOL_SIZE", "8"),
            ("VALMON_EXTRA_SQL_DIR", "/etc/valmon/sql"),
            ("UPTIME_WINDOW_ROUNDS", "250"),
            ("CONNECT_MAX_RETRIES", "2"),
        ]);

        assert_eq!(config.db_path, PathBuf::from("/tmp/test.db"));
        assert_eq!(config.pool_options().size, 8);
        assert_eq!(config.extra_sql_dir, Some(PathBuf::from("/etc/valmon/sql")));
        assert_eq!(config.uptime_window_rounds, 250);
        assert_eq!(config.connect_backoff().attempts(), 0);
    }

    #[test]
    fn test_unparseable_values_fall_back() {
        let config = config_from(&[
            ("VALMON_POOL_SIZE", "lots"),
            ("BLOCK_SYNC_INTERVAL_MS", "-5"),
            ("BLOCK_SYNC_MAX_BATCH", "0"),
            ("VALMON_EXTRA_SQL_DIR", "  "),
        ]);

        assert_eq!(config.pool_size, 4);
        assert_eq!(config.block_sync_interval_ms, 10_000);
        assert_eq!(config.block_sync_max_batch, 1);
        assert_eq!(config.extra_sql_dir, None);
    }

    #[test]
    fn test_zero_intervals_are_clamped() {
        let config = config_from(&[
            ("BLOCK_SYNC_INTERVAL_MS", "0"),
            ("COMMITTEE_REFRESH_INTERVAL_MS", "0"),
            ("STATUS_RECONCILE_INTERVAL_MS", "0"),
            ("UPTIME_INTERVAL_MS", "0"),
            ("RECONCILE_LAG_ROUNDS", "-3"),
        ]);

        assert_eq!(config.block_sync_interval_ms, 1);
        assert_eq!(config.committee_refresh_interval_ms, 1);
        assert_eq!(config.status_reconcile_interval_ms, 1);
        assert_eq!(config.uptime_interval_ms, 1);
        assert_eq!(config.reconcile_lag_rounds, 0);
    }

    #[test]
    fn test_from_env_reads_process_environment() {
        env::set_var("VALMON_SPOOL_DIR", "/tmp/valmon-spool-test");
        let config = MonitorConfig::from_env();
        assert_eq!(config.spool_dir, PathBuf::from("/tmp/valmon-spool-test"));
        env::remove_var("VALMON_SPOOL_DIR");
    }
}
