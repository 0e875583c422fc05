//! Schema lifecycle: create-if-missing and additive column evolution
//!
//! The expected layout lives in [`TABLE_SCHEMAS`] and [`INDEXES`].
//! `ensure_schema` is idempotent and runs on every process start:
//!
//! 1. CREATE TABLE IF NOT EXISTS for all 9 tables
//! 2. `check_columns` per table (adds missing columns, never drops,
//!    renames or retypes)
//! 3. CREATE INDEX IF NOT EXISTS for all 8 indexes
//! 4. optional operator `*.sql` files, sorted by name
//!
//! All four steps share one IMMEDIATE transaction. Any failure rolls the
//! whole migration back and surfaces as `MonitorError::Schema`; the caller
//! must not start against a half-migrated store.

pub mod tables;

pub use tables::{ColumnDef, IndexDef, TableSchema, INDEXES, TABLE_SCHEMAS};

use crate::error::{MonitorError, MonitorResult};
use crate::store::ConnectionPool;
use rusqlite::{Connection, TransactionBehavior};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn schema_err(step: impl std::fmt::Display) -> impl FnOnce(rusqlite::Error) -> MonitorError {
    move |e| MonitorError::Schema(format!("{}: {}", step, e))
}

/// Look up the expected definition of `table`
pub fn table_schema(table: &str) -> MonitorResult<&'static TableSchema> {
    TABLE_SCHEMAS
        .iter()
        .find(|t| t.name == table)
        .ok_or_else(|| MonitorError::Schema(format!("unknown table: {}", table)))
}

/// Expected columns absent from `actual`, in declaration order
pub fn missing_columns<'a>(expected: &'a TableSchema, actual: &HashSet<String>) -> Vec<&'a ColumnDef> {
    expected
        .columns
        .iter()
        .filter(|c| !actual.contains(c.name))
        .collect()
}

/// Column names currently present on `table`
pub fn actual_columns(conn: &Connection, table: &str) -> rusqlite::Result<HashSet<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<HashSet<_>>>()?;
    Ok(names)
}

/// Add every expected column `table` lacks; returns the names added
///
/// Runs on the caller's connection so it can share the migration
/// transaction.
pub fn check_columns_on(conn: &Connection, table: &str) -> MonitorResult<Vec<String>> {
    let expected = table_schema(table)?;
    let actual = actual_columns(conn, table).map_err(schema_err(format!("inspect {}", table)))?;
    if actual.is_empty() {
        return Err(MonitorError::Schema(format!("table {} does not exist", table)));
    }

    let mut added = Vec::new();
    for column in missing_columns(expected, &actual) {
        let fragment = column.add_column_sql().ok_or_else(|| {
            MonitorError::Schema(format!(
                "{}.{} is a key column and cannot be added in place",
                table, column.name
            ))
        })?;
        let sql = format!("ALTER TABLE {} ADD COLUMN {}", table, fragment);
        conn.execute_batch(&sql)
            .map_err(schema_err(format!("add column {}.{}", table, column.name)))?;
        log::info!("   ├─ Added column {}.{}", table, column.name);
        added.push(column.name.to_string());
    }
    Ok(added)
}

/// Execute every `*.sql` file in `dir`, alphabetically
pub fn apply_sql_dir(conn: &Connection, dir: &Path) -> MonitorResult<usize> {
    if !dir.exists() {
        return Err(MonitorError::Schema(format!(
            "extra migrations directory not found: {}",
            dir.display()
        )));
    }

    let mut sql_files: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|e| MonitorError::Schema(format!("read {}: {}", dir.display(), e)))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().and_then(|s| s.to_str()) == Some("sql"))
        .collect();
    sql_files.sort();

    for path in &sql_files {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        log::info!("   ├─ Executing: {}", filename);
        let sql = fs::read_to_string(path)
            .map_err(|e| MonitorError::Schema(format!("read {}: {}", path.display(), e)))?;
        conn.execute_batch(&sql)
            .map_err(schema_err(format!("execute {}", filename)))?;
    }
    Ok(sql_files.len())
}

/// Owns schema creation, additive evolution and administrative reset
pub struct SchemaManager {
    pool: Arc<ConnectionPool>,
    extra_sql_dir: Option<PathBuf>,
}

impl SchemaManager {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self {
            pool,
            extra_sql_dir: None,
        }
    }

    /// Also run operator-supplied `*.sql` files after the built-in schema
    pub fn with_extra_sql_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.extra_sql_dir = Some(dir.into());
        self
    }

    pub async fn ensure_schema(&self) -> MonitorResult<()> {
        let mut conn = self.pool.acquire().await?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(schema_err("begin migration"))?;

        log::info!("🔧 Ensuring schema ({} tables)", TABLE_SCHEMAS.len());

        for table in TABLE_SCHEMAS {
            tx.execute_batch(&table.create_table_sql())
                .map_err(schema_err(format!("create table {}", table.name)))?;
        }

        let mut added = 0;
        for table in TABLE_SCHEMAS {
            added += check_columns_on(&tx, table.name)?.len();
        }

        for index in INDEXES {
            tx.execute_batch(&index.create_index_sql())
                .map_err(schema_err(format!("create index {}", index.name)))?;
        }

        if let Some(dir) = &self.extra_sql_dir {
            let applied = apply_sql_dir(&tx, dir)?;
            log::info!("   ├─ Applied {} extra migration file(s)", applied);
        }

        tx.commit().map_err(schema_err("commit migration"))?;

        log::info!("✅ Schema ready ({} column(s) added)", added);
        Ok(())
    }

    /// Compare `table` against its expected columns and add what is missing
    pub async fn check_columns(&self, table: &str) -> MonitorResult<Vec<String>> {
        let mut conn = self.pool.acquire().await?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(schema_err("begin column check"))?;
        let added = check_columns_on(&tx, table)?;
        tx.commit().map_err(schema_err("commit column check"))?;
        Ok(added)
    }

    /// Administrative reset: delete every row, keep the schema
    pub async fn reset_all(&self) -> MonitorResult<()> {
        let mut conn = self.pool.acquire().await?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(MonitorError::query("resetAll"))?;
        for table in TABLE_SCHEMAS {
            tx.execute(&format!("DELETE FROM {}", table.name), [])
                .map_err(MonitorError::query("resetAll"))?;
        }
        tx.commit().map_err(MonitorError::query("resetAll"))?;
        log::warn!("🧹 Administrative reset: all monitor tables emptied");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::PoolOptions;
    use tempfile::{tempdir, TempDir};

    fn open_pool() -> (TempDir, Arc<ConnectionPool>) {
        let dir = tempdir().unwrap();
        let pool = ConnectionPool::open(dir.path().join("schema.db"), PoolOptions::default()).unwrap();
        (dir, Arc::new(pool))
    }

    fn count_objects(conn: &Connection, kind: &str, prefix: &str) -> i64 {
        conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = ?1 AND name LIKE ?2",
            rusqlite::params![kind, format!("{}%", prefix)],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_ensure_schema_is_idempotent() {
        let (_dir, pool) = open_pool();
        let manager = SchemaManager::new(pool.clone());

        manager.ensure_schema().await.unwrap();
        manager.ensure_schema().await.unwrap();

        let conn = pool.acquire().await.unwrap();
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 9);
        assert_eq!(count_objects(&conn, "index", "idx_"), 8);
    }

    #[tokio::test]
    async fn test_check_columns_adds_missing_and_keeps_rows() {
        let (_dir, pool) = open_pool();
        {
            // Older layout: blocks without block_reward
            let conn = pool.acquire().await.unwrap();
            conn.execute_batch(
                "CREATE TABLE blocks (
                    height INTEGER PRIMARY KEY,
                    hash TEXT NOT NULL UNIQUE,
                    previous_hash TEXT NOT NULL DEFAULT '',
                    round INTEGER NOT NULL DEFAULT 0,
                    timestamp INTEGER NOT NULL DEFAULT 0,
                    transactions_count INTEGER NOT NULL DEFAULT 0
                );
                INSERT INTO blocks (height, hash) VALUES (1, 'h1');",
            )
            .unwrap();
        }

        let manager = SchemaManager::new(pool.clone());
        let added = manager.check_columns("blocks").await.unwrap();
        assert_eq!(added, vec!["block_reward".to_string()]);

        // Second pass finds nothing to add
        assert!(manager.check_columns("blocks").await.unwrap().is_empty());

        let conn = pool.acquire().await.unwrap();
        let (hash, reward): (String, Option<String>) = conn
            .query_row("SELECT hash, block_reward FROM blocks WHERE height = 1", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .unwrap();
        assert_eq!(hash, "h1");
        assert!(reward.is_none());
    }

    #[tokio::test]
    async fn test_check_columns_never_drops_extra_columns() {
        let (_dir, pool) = open_pool();
        let manager = SchemaManager::new(pool.clone());
        manager.ensure_schema().await.unwrap();
        {
            let conn = pool.acquire().await.unwrap();
            conn.execute_batch("ALTER TABLE batches ADD COLUMN operator_note TEXT")
                .unwrap();
        }
        manager.ensure_schema().await.unwrap();

        let conn = pool.acquire().await.unwrap();
        let cols = actual_columns(&conn, "batches").unwrap();
        assert!(cols.contains("operator_note"));
    }

    #[tokio::test]
    async fn test_unknown_table_is_schema_error() {
        let (_dir, pool) = open_pool();
        let manager = SchemaManager::new(pool);
        let err = manager.check_columns("not_a_table").await.unwrap_err();
        assert!(matches!(err, MonitorError::Schema(_)));
    }

    #[tokio::test]
    async fn test_failed_migration_rolls_back_everything() {
        let (dir, pool) = open_pool();
        let sql_dir = dir.path().join("sql");
        fs::create_dir_all(&sql_dir).unwrap();
        fs::write(
            sql_dir.join("01_ok.sql"),
            "CREATE TABLE IF NOT EXISTS operator_notes (id INTEGER PRIMARY KEY);",
        )
        .unwrap();
        fs::write(sql_dir.join("02_broken.sql"), "CREATE TABLE oops (").unwrap();

        let manager = SchemaManager::new(pool.clone()).with_extra_sql_dir(&sql_dir);
        let err = manager.ensure_schema().await.unwrap_err();
        assert!(err.is_fatal_at_startup());
        assert!(err.to_string().contains("02_broken.sql"));

        let conn = pool.acquire().await.unwrap();
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 0, "no table from the failed migration may survive");
    }

    #[tokio::test]
    async fn test_reset_keeps_schema() {
        let (_dir, pool) = open_pool();
        let manager = SchemaManager::new(pool.clone());
        manager.ensure_schema().await.unwrap();
        {
            let conn = pool.acquire().await.unwrap();
            conn.execute(
                "INSERT INTO validator_status (address, last_active_round, consecutive_inactive_rounds, is_active, last_updated)
                 VALUES ('aleo1x', 1, 0, 1, 0)",
                [],
            )
            .unwrap();
        }
        manager.reset_all().await.unwrap();

        let conn = pool.acquire().await.unwrap();
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM validator_status", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 0);
        assert_eq!(count_objects(&conn, "index", "idx_"), 8);
    }
}
