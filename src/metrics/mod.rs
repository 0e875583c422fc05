//! Read-only aggregates for API and alerting collaborators
//!
//! Every multi-statement read opens a deferred transaction on a pooled
//! connection. Under WAL that pins one snapshot of the database for the
//! whole read without blocking writers. Decimal sums are done in Rust on
//! [`RewardAmount`], never in SQL.

use crate::amount::RewardAmount;
use crate::error::{MonitorError, MonitorResult};
use crate::model::{Block, CommitteeMember, Delegation, UptimeSnapshot, ValidatorStatus};
use crate::status::uptime;
use crate::store::ConnectionPool;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::Arc;

/// Trailing window used by [`MetricsQuery::get_validator_uptime`]
pub const UPTIME_TRAILING_SECS: i64 = 24 * 60 * 60;

fn member_from_row(row: &Row<'_>) -> rusqlite::Result<CommitteeMember> {
    Ok(CommitteeMember {
        address: row.get(0)?,
        first_seen_block: row.get(1)?,
        last_seen_block: row.get(2)?,
        total_stake: row.get(3)?,
        is_open: row.get(4)?,
        commission: row.get(5)?,
        is_active: row.get(6)?,
        last_updated: row.get(7)?,
    })
}

const MEMBER_COLUMNS: &str = "address, first_seen_block, last_seen_block, total_stake, \
                              is_open, commission, is_active, last_updated";

fn collect<T, F>(conn: &Connection, op: &'static str, sql: &str, params: impl rusqlite::Params, f: F) -> MonitorResult<Vec<T>>
where
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
    let mut stmt = conn.prepare(sql).map_err(MonitorError::query(op))?;
    let rows = stmt
        .query_map(params, f)
        .map_err(MonitorError::query(op))?
        .collect::<rusqlite::Result<Vec<T>>>()
        .map_err(MonitorError::query(op))?;
    Ok(rows)
}

/// Reader half of the store
#[derive(Clone)]
pub struct MetricsQuery {
    pool: Arc<ConnectionPool>,
}

impl MetricsQuery {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    /// Run `f` inside one deferred read transaction
    async fn read<T, F>(&self, op: &'static str, f: F) -> MonitorResult<T>
    where
        F: FnOnce(&Connection) -> MonitorResult<T>,
    {
        let mut conn = self.pool.acquire().await?;
        let tx = conn.transaction().map_err(MonitorError::query(op))?;
        let value = f(&*tx).map_err(MonitorError::context(op))?;
        tx.commit().map_err(MonitorError::query(op))?;
        Ok(value)
    }

    /// All committee members ever seen, largest stake first
    pub async fn get_validators(&self) -> MonitorResult<Vec<CommitteeMember>> {
        let mut members = self
            .read("getValidators", |conn| {
                collect(
                    conn,
                    "getValidators",
                    &format!("SELECT {} FROM committee_members ORDER BY address", MEMBER_COLUMNS),
                    [],
                    member_from_row,
                )
            })
            .await?;
        // stake is TEXT; ordering it in SQL would be lexicographic
        members.sort_by(|a, b| b.total_stake.cmp(&a.total_stake).then_with(|| a.address.cmp(&b.address)));
        Ok(members)
    }

    pub async fn get_validator(&self, address: &str) -> MonitorResult<Option<CommitteeMember>> {
        let conn = self.pool.acquire().await?;
        conn.query_row(
            &format!("SELECT {} FROM committee_members WHERE address = ?1", MEMBER_COLUMNS),
            [address],
            member_from_row,
        )
        .optional()
        .map_err(MonitorError::query("getValidator"))
    }

    pub async fn get_validator_status(&self, address: &str) -> MonitorResult<Option<ValidatorStatus>> {
        let conn = self.pool.acquire().await?;
        conn.query_row(
            "SELECT address, last_active_round, consecutive_inactive_rounds, is_active, last_updated,
                    last_evaluated_round
             FROM validator_status WHERE address = ?1",
            [address],
            |row| {
                Ok(ValidatorStatus {
                    address: row.get(0)?,
                    last_active_round: row.get(1)?,
                    consecutive_inactive_rounds: row.get(2)?,
                    is_active: row.get(3)?,
                    last_updated: row.get(4)?,
                    last_evaluated_round: row.get(5)?,
                })
            },
        )
        .optional()
        .map_err(MonitorError::query("getValidatorStatus"))
    }

    /// Uptime percentage over the trailing 24 hours
    pub async fn get_validator_uptime(&self, address: &str) -> MonitorResult<f64> {
        let now = chrono::Utc::now().timestamp();
        self.get_validator_uptime_between(address, now.saturating_sub(UPTIME_TRAILING_SECS), now)
            .await
    }

    /// Uptime over the rounds of blocks with `from_ts <= timestamp <= to_ts`
    ///
    /// 0.0 when no block falls in the window.
    pub async fn get_validator_uptime_between(&self, address: &str, from_ts: i64, to_ts: i64) -> MonitorResult<f64> {
        self.read("getValidatorUptime", |conn| {
            let bounds: (Option<i64>, Option<i64>) = conn
                .query_row(
                    "SELECT MIN(round), MAX(round) FROM blocks WHERE timestamp BETWEEN ?1 AND ?2",
                    params![from_ts, to_ts],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .map_err(MonitorError::query("getValidatorUptime"))?;
            match bounds {
                (Some(start), Some(end)) => {
                    Ok(uptime::compute_window(conn, address, start, end, to_ts)?.uptime_percentage)
                }
                _ => Ok(0.0),
            }
        })
        .await
    }

    /// Stored snapshots for one address, newest first
    pub async fn get_uptime_history(&self, address: &str, limit: usize) -> MonitorResult<Vec<UptimeSnapshot>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.read("getUptimeHistory", |conn| {
            collect(
                conn,
                "getUptimeHistory",
                "SELECT address, start_round, end_round, total_rounds, participated_rounds,
                        uptime_percentage, timestamp
                 FROM uptime_snapshots WHERE address = ?1
                 ORDER BY timestamp DESC, end_round DESC, id DESC
                 LIMIT ?2",
                params![address, limit],
                |row| {
                    Ok(UptimeSnapshot {
                        address: row.get(0)?,
                        start_round: row.get(1)?,
                        end_round: row.get(2)?,
                        total_rounds: row.get(3)?,
                        participated_rounds: row.get(4)?,
                        uptime_percentage: row.get(5)?,
                        timestamp: row.get(6)?,
                    })
                },
            )
        })
        .await
    }

    /// Validator rewards over the trailing `window_seconds`, as a decimal
    /// string
    pub async fn get_validator_rewards(&self, address: &str, window_seconds: i64) -> MonitorResult<String> {
        let now = chrono::Utc::now().timestamp();
        let total = self
            .rewards_between(address, now.saturating_sub(window_seconds), now)
            .await?;
        Ok(total.to_string())
    }

    /// Exact sum of validator rewards with `from_ts <= timestamp <= to_ts`
    pub async fn rewards_between(&self, address: &str, from_ts: i64, to_ts: i64) -> MonitorResult<RewardAmount> {
        let rewards: Vec<RewardAmount> = self
            .read("getValidatorRewards", |conn| {
                collect(
                    conn,
                    "getValidatorRewards",
                    "SELECT reward FROM validator_rewards
                     WHERE address = ?1 AND timestamp BETWEEN ?2 AND ?3",
                    params![address, from_ts, to_ts],
                    |row| row.get(0),
                )
            })
            .await?;
        Ok(rewards.into_iter().sum())
    }

    /// Committee members that are in the current committee and not marked
    /// inactive by status reconciliation
    pub async fn get_active_validators(&self) -> MonitorResult<Vec<String>> {
        self.read("getActiveValidators", |conn| {
            collect(
                conn,
                "getActiveValidators",
                "SELECT m.address FROM committee_members m
                 LEFT JOIN validator_status s ON s.address = m.address
                 WHERE m.is_active = 1 AND COALESCE(s.is_active, 1) = 1
                 ORDER BY m.address",
                [],
                |row| row.get(0),
            )
        })
        .await
    }

    /// Distinct members that participated in `round`
    pub async fn get_committee_size_for_round(&self, round: i64) -> MonitorResult<i64> {
        let conn = self.pool.acquire().await?;
        conn.query_row(
            "SELECT COUNT(DISTINCT committee_member_address) FROM committee_participation WHERE round = ?1",
            [round],
            |row| row.get(0),
        )
        .map_err(MonitorError::query("getCommitteeSizeForRound"))
    }

    /// Stored blocks with `start <= height <= end`
    pub async fn get_block_count_in_height_range(&self, start: i64, end: i64) -> MonitorResult<i64> {
        let conn = self.pool.acquire().await?;
        conn.query_row(
            "SELECT COUNT(*) FROM blocks WHERE height BETWEEN ?1 AND ?2",
            params![start, end],
            |row| row.get(0),
        )
        .map_err(MonitorError::query("getBlockCountInHeightRange"))
    }

    /// Mean seconds between stored blocks in `[start, end]` by height
    ///
    /// `(last_timestamp - first_timestamp) / (count - 1)`; 0.0 for one
    /// block or none.
    pub async fn average_block_time(&self, start: i64, end: i64) -> MonitorResult<f64> {
        self.read("averageBlockTime", |conn| {
            let (count, first, last): (i64, Option<i64>, Option<i64>) = conn
                .query_row(
                    "SELECT COUNT(*),
                            (SELECT timestamp FROM blocks WHERE height BETWEEN ?1 AND ?2 ORDER BY height ASC LIMIT 1),
                            (SELECT timestamp FROM blocks WHERE height BETWEEN ?1 AND ?2 ORDER BY height DESC LIMIT 1)
                     FROM blocks WHERE height BETWEEN ?1 AND ?2",
                    params![start, end],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .map_err(MonitorError::query("averageBlockTime"))?;
            Ok(average_interval(count, first, last))
        })
        .await
    }

    /// Distinct blocks containing a batch authored by `address`, for blocks
    /// with `from_ts <= timestamp <= to_ts`
    pub async fn blocks_produced_by(&self, address: &str, from_ts: i64, to_ts: i64) -> MonitorResult<i64> {
        let conn = self.pool.acquire().await?;
        conn.query_row(
            "SELECT COUNT(DISTINCT b.block_height)
             FROM batches b JOIN blocks k ON k.height = b.block_height
             WHERE b.author = ?1 AND k.timestamp BETWEEN ?2 AND ?3",
            params![address, from_ts, to_ts],
            |row| row.get(0),
        )
        .map_err(MonitorError::query("blocksProducedBy"))
    }

    pub async fn get_delegations_for(&self, validator: &str) -> MonitorResult<Vec<Delegation>> {
        self.read("getDelegations", |conn| {
            collect(
                conn,
                "getDelegations",
                "SELECT delegator, validator, amount, last_updated FROM delegations
                 WHERE validator = ?1 ORDER BY delegator",
                [validator],
                |row| {
                    Ok(Delegation {
                        delegator: row.get(0)?,
                        validator: row.get(1)?,
                        amount: row.get(2)?,
                        last_updated: row.get(3)?,
                    })
                },
            )
        })
        .await
    }

    pub async fn get_total_delegated(&self, validator: &str) -> MonitorResult<RewardAmount> {
        let delegations = self.get_delegations_for(validator).await?;
        Ok(delegations.iter().map(|d| &d.amount).sum())
    }

    pub async fn get_latest_block(&self) -> MonitorResult<Option<Block>> {
        let conn = self.pool.acquire().await?;
        conn.query_row(
            "SELECT height, hash, previous_hash, round, timestamp, transactions_count, block_reward
             FROM blocks ORDER BY height DESC LIMIT 1",
            [],
            |row| {
                Ok(Block {
                    height: row.get(0)?,
                    hash: row.get(1)?,
                    previous_hash: row.get(2)?,
                    round: row.get(3)?,
                    timestamp: row.get(4)?,
                    transactions_count: row.get(5)?,
                    block_reward: row.get(6)?,
                })
            },
        )
        .optional()
        .map_err(MonitorError::query("getLatestBlock"))
    }
}

fn average_interval(count: i64, first: Option<i64>, last: Option<i64>) -> f64 {
    match (first, last) {
        (Some(first), Some(last)) if count > 1 => (last - first) as f64 / (count - 1) as f64,
        _ => 0.0,
    }
}
