//! Idempotent writers for chain-derived facts
//!
//! Two conflict policies, chosen by entity class:
//!
//! - **Mutable facts** (blocks, committee members, rewards, delegations):
//!   `INSERT ... ON CONFLICT(key) DO UPDATE`, last write wins.
//! - **Append-only facts** (participation, batches, uptime snapshots):
//!   `INSERT ... ON CONFLICT(key) DO NOTHING`, first-seen row is kept and
//!   the call reports [`WriteOutcome::ConflictNoop`].
//!
//! Every multi-row write runs in one transaction, one statement per item.
//! If item *k* fails (validation or store error) the transaction is
//! dropped uncommitted and items 1..k-1 roll back with it. Nothing here
//! retries.

use crate::error::{MonitorError, MonitorResult};
use crate::model::{
    Batch, Block, Committee, CommitteeParticipation, Delegation, MemberUpdate, RewardKind,
    RewardRecord, UptimeSnapshot,
};
use crate::store::ConnectionPool;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Result of an append-only write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Inserted,
    /// The fact already existed; nothing changed
    ConflictNoop,
}

impl WriteOutcome {
    fn from_changes(changes: usize) -> Self {
        if changes == 0 {
            WriteOutcome::ConflictNoop
        } else {
            WriteOutcome::Inserted
        }
    }

    pub fn is_inserted(&self) -> bool {
        matches!(self, WriteOutcome::Inserted)
    }
}

/// A block together with the facts that ride along with it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockBundle {
    pub block: Option<Block>,
    #[serde(default)]
    pub batches: Vec<Batch>,
    #[serde(default)]
    pub validator_rewards: Vec<RewardRecord>,
    #[serde(default)]
    pub delegator_rewards: Vec<RewardRecord>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BundleSummary {
    pub batches_inserted: usize,
    pub participation_inserted: usize,
    pub rewards_written: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitteeSyncSummary {
    pub upserted: usize,
    pub deactivated: usize,
}

fn write_block(conn: &Connection, block: &Block) -> MonitorResult<()> {
    block.validate()?;
    conn.execute(
        r#"
        INSERT INTO blocks (
            height, hash, previous_hash, round, timestamp, transactions_count, block_reward
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        ON CONFLICT(height) DO UPDATE SET
            hash = excluded.hash,
            previous_hash = excluded.previous_hash,
            round = excluded.round,
            timestamp = excluded.timestamp,
            transactions_count = excluded.transactions_count,
            block_reward = excluded.block_reward
        "#,
        params![
            block.height,
            block.hash,
            block.previous_hash,
            block.round,
            block.timestamp,
            block.transactions_count,
            block.block_reward,
        ],
    )
    .map_err(MonitorError::query("upsertBlock"))?;
    Ok(())
}

/// Sighting bounds always widen; stake, flags and `is_active` only follow a
/// sighting at least as recent as the stored one
fn write_member(conn: &Connection, update: &MemberUpdate, now: i64) -> MonitorResult<()> {
    update.validate()?;
    conn.execute(
        r#"
        INSERT INTO committee_members (
            address, first_seen_block, last_seen_block, total_stake,
            is_open, commission, is_active, last_updated
        ) VALUES (?1, ?2, ?2, ?3, ?4, ?5, 1, ?6)
        ON CONFLICT(address) DO UPDATE SET
            first_seen_block = MIN(committee_members.first_seen_block, excluded.first_seen_block),
            last_seen_block = MAX(committee_members.last_seen_block, excluded.last_seen_block),
            total_stake = CASE WHEN excluded.last_seen_block >= committee_members.last_seen_block
                THEN excluded.total_stake ELSE committee_members.total_stake END,
            is_open = CASE WHEN excluded.last_seen_block >= committee_members.last_seen_block
                THEN excluded.is_open ELSE committee_members.is_open END,
            commission = CASE WHEN excluded.last_seen_block >= committee_members.last_seen_block
                THEN excluded.commission ELSE committee_members.commission END,
            is_active = CASE WHEN excluded.last_seen_block >= committee_members.last_seen_block
                THEN 1 ELSE committee_members.is_active END,
            last_updated = excluded.last_updated
        "#,
        params![
            update.address,
            update.height,
            update.stake,
            update.is_open,
            update.commission,
            now,
        ],
    )
    .map_err(MonitorError::query("insertOrUpdateCommitteeMember"))?;
    Ok(())
}

fn write_participation(conn: &Connection, fact: &CommitteeParticipation) -> MonitorResult<WriteOutcome> {
    fact.validate()?;
    let changes = conn
        .execute(
            r#"
            INSERT INTO committee_participation (
                committee_member_address, round, block_height, timestamp
            ) VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(committee_member_address, round) DO NOTHING
            "#,
            params![fact.address, fact.round, fact.block_height, fact.timestamp],
        )
        .map_err(MonitorError::query("insertCommitteeParticipation"))?;
    Ok(WriteOutcome::from_changes(changes))
}

fn write_batch(conn: &Connection, batch: &Batch) -> MonitorResult<WriteOutcome> {
    batch.validate()?;
    let changes = conn
        .execute(
            r#"
            INSERT INTO batches (batch_id, author, round, committee_id, block_height)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(batch_id) DO NOTHING
            "#,
            params![
                batch.batch_id,
                batch.author,
                batch.round,
                batch.committee_id,
                batch.block_height,
            ],
        )
        .map_err(MonitorError::query("insertBatch"))?;
    Ok(WriteOutcome::from_changes(changes))
}

fn write_snapshot(conn: &Connection, snapshot: &UptimeSnapshot) -> MonitorResult<WriteOutcome> {
    snapshot.validate()?;
    let changes = conn
        .execute(
            r#"
            INSERT INTO uptime_snapshots (
                address, start_round, end_round, total_rounds,
                participated_rounds, uptime_percentage, timestamp
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(address, start_round, end_round) DO NOTHING
            "#,
            params![
                snapshot.address,
                snapshot.start_round,
                snapshot.end_round,
                snapshot.total_rounds,
                snapshot.participated_rounds,
                snapshot.uptime_percentage,
                snapshot.timestamp,
            ],
        )
        .map_err(MonitorError::query("insertUptimeSnapshot"))?;
    Ok(WriteOutcome::from_changes(changes))
}

fn write_reward(conn: &Connection, kind: RewardKind, record: &RewardRecord) -> MonitorResult<()> {
    record.validate()?;
    let sql = format!(
        r#"
        INSERT INTO {} (address, block_height, reward, timestamp)
        VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT(address, block_height) DO UPDATE SET
            reward = excluded.reward,
            timestamp = excluded.timestamp
        "#,
        kind.table()
    );
    conn.execute(
        &sql,
        params![record.address, record.block_height, record.reward, record.timestamp],
    )
    .map_err(MonitorError::query("upsertReward"))?;
    Ok(())
}

fn write_delegation(conn: &Connection, delegation: &Delegation) -> MonitorResult<()> {
    delegation.validate()?;
    conn.execute(
        r#"
        INSERT INTO delegations (delegator, validator, amount, last_updated)
        VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT(delegator, validator) DO UPDATE SET
            amount = excluded.amount,
            last_updated = excluded.last_updated
        "#,
        params![
            delegation.delegator,
            delegation.validator,
            delegation.amount,
            delegation.last_updated,
        ],
    )
    .map_err(MonitorError::query("upsertDelegation"))?;
    Ok(())
}

/// Participation implied by a batch: its author took part in its round
pub fn participation_from_batch(batch: &Batch, timestamp: i64) -> CommitteeParticipation {
    CommitteeParticipation {
        address: batch.author.clone(),
        round: batch.round,
        block_height: batch.block_height,
        timestamp,
    }
}

/// Writer half of the store
#[derive(Clone)]
pub struct IngestionStore {
    pool: Arc<ConnectionPool>,
}

impl IngestionStore {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    /// Run `f` over `items` inside one transaction, all-or-nothing
    async fn in_transaction<T, F>(&self, op: &'static str, items: &[T], mut f: F) -> MonitorResult<usize>
    where
        F: FnMut(&Connection, &T) -> MonitorResult<bool>,
    {
        let mut conn = self.pool.acquire().await?;
        let tx = conn.transaction().map_err(MonitorError::query(op))?;
        let mut written = 0;
        for (i, item) in items.iter().enumerate() {
            match f(&*tx, item) {
                Ok(true) => written += 1,
                Ok(false) => {}
                Err(e) => {
                    log::warn!("⚠️  {} aborted at item {} of {}: {}", op, i + 1, items.len(), e);
                    // tx dropped here: every earlier item rolls back
                    return Err(MonitorError::context(op)(e));
                }
            }
        }
        tx.commit().map_err(MonitorError::query(op))?;
        Ok(written)
    }

    pub async fn upsert_block(&self, block: &Block) -> MonitorResult<()> {
        let conn = self.pool.acquire().await?;
        write_block(&conn, block)?;
        log::debug!("✅ Upserted block {} ({})", block.height, block.hash);
        Ok(())
    }

    /// Upsert a range of blocks atomically; returns the number written
    pub async fn upsert_blocks(&self, blocks: &[Block]) -> MonitorResult<usize> {
        let written = self
            .in_transaction("upsertBlocks", blocks, |conn, block| {
                write_block(conn, block).map(|_| true)
            })
            .await?;
        log::debug!("✅ Upserted {} blocks", written);
        Ok(written)
    }

    pub async fn insert_or_update_committee_member(&self, update: &MemberUpdate) -> MonitorResult<()> {
        let now = chrono::Utc::now().timestamp();
        let conn = self.pool.acquire().await?;
        write_member(&conn, update, now)
    }

    /// Upsert a whole committee seen at `height` and deactivate members
    /// missing from it
    ///
    /// Only members whose `last_seen_block` is older than `height` are
    /// deactivated, so replaying an older committee never flips members
    /// that were seen later.
    pub async fn sync_committee(&self, height: i64, committee: &Committee) -> MonitorResult<CommitteeSyncSummary> {
        if committee.is_empty() {
            return Err(MonitorError::Validation(format!(
                "refusing to sync an empty committee at height {}",
                height
            )));
        }
        let now = chrono::Utc::now().timestamp();

        let mut conn = self.pool.acquire().await?;
        let tx = conn.transaction().map_err(MonitorError::query("syncCommittee"))?;

        for (address, entry) in committee {
            let update = MemberUpdate {
                address: address.clone(),
                height,
                stake: entry.stake.clone(),
                is_open: entry.is_open,
                commission: entry.commission,
            };
            write_member(&tx, &update, now).map_err(MonitorError::context("syncCommittee"))?;
        }

        let deactivated = tx
            .execute(
                "UPDATE committee_members SET is_active = 0, last_updated = ?1
                 WHERE is_active = 1 AND last_seen_block < ?2",
                params![now, height],
            )
            .map_err(MonitorError::query("syncCommittee"))?;

        tx.commit().map_err(MonitorError::query("syncCommittee"))?;

        log::info!(
            "👥 Committee synced at height {}: {} members, {} deactivated",
            height,
            committee.len(),
            deactivated
        );
        Ok(CommitteeSyncSummary {
            upserted: committee.len(),
            deactivated,
        })
    }

    pub async fn insert_committee_participation(&self, fact: &CommitteeParticipation) -> MonitorResult<WriteOutcome> {
        let conn = self.pool.acquire().await?;
        let outcome = write_participation(&conn, fact)?;
        if outcome == WriteOutcome::ConflictNoop {
            log::debug!("↩️  Participation ({}, {}) already recorded", fact.address, fact.round);
        }
        Ok(outcome)
    }

    /// Returns how many facts were new
    pub async fn insert_committee_participations(&self, facts: &[CommitteeParticipation]) -> MonitorResult<usize> {
        self.in_transaction("insertCommitteeParticipations", facts, |conn, fact| {
            write_participation(conn, fact).map(|o| o.is_inserted())
        })
        .await
    }

    pub async fn insert_batch(&self, batch: &Batch) -> MonitorResult<WriteOutcome> {
        let conn = self.pool.acquire().await?;
        write_batch(&conn, batch)
    }

    pub async fn insert_batches(&self, batches: &[Batch]) -> MonitorResult<usize> {
        self.in_transaction("insertBatches", batches, |conn, batch| {
            write_batch(conn, batch).map(|o| o.is_inserted())
        })
        .await
    }

    pub async fn insert_uptime_snapshot(&self, snapshot: &UptimeSnapshot) -> MonitorResult<WriteOutcome> {
        let conn = self.pool.acquire().await?;
        write_snapshot(&conn, snapshot)
    }

    pub async fn insert_uptime_snapshots(&self, snapshots: &[UptimeSnapshot]) -> MonitorResult<usize> {
        self.in_transaction("insertUptimeSnapshots", snapshots, |conn, snapshot| {
            write_snapshot(conn, snapshot).map(|o| o.is_inserted())
        })
        .await
    }

    pub async fn upsert_reward(&self, kind: RewardKind, record: &RewardRecord) -> MonitorResult<()> {
        let conn = self.pool.acquire().await?;
        write_reward(&conn, kind, record)
    }

    pub async fn upsert_validator_rewards(&self, records: &[RewardRecord]) -> MonitorResult<usize> {
        self.in_transaction("upsertValidatorRewards", records, |conn, record| {
            write_reward(conn, RewardKind::Validator, record).map(|_| true)
        })
        .await
    }

    pub async fn upsert_delegator_rewards(&self, records: &[RewardRecord]) -> MonitorResult<usize> {
        self.in_transaction("upsertDelegatorRewards", records, |conn, record| {
            write_reward(conn, RewardKind::Delegator, record).map(|_| true)
        })
        .await
    }

    pub async fn upsert_delegation(&self, delegation: &Delegation) -> MonitorResult<()> {
        let conn = self.pool.acquire().await?;
        write_delegation(&conn, delegation)
    }

    pub async fn upsert_delegations(&self, delegations: &[Delegation]) -> MonitorResult<usize> {
        self.in_transaction("upsertDelegations", delegations, |conn, delegation| {
            write_delegation(conn, delegation).map(|_| true)
        })
        .await
    }

    /// Persist a block, its batches, the participation they imply and its
    /// rewards in one transaction
    pub async fn ingest_block_bundle(&self, bundle: &BlockBundle) -> MonitorResult<BundleSummary> {
        let block = bundle
            .block
            .as_ref()
            .ok_or_else(|| MonitorError::Validation("block bundle without a block".into()))?;

        let mut conn = self.pool.acquire().await?;
        let tx = conn.transaction().map_err(MonitorError::query("ingestBlockBundle"))?;
        let ctx = MonitorError::context("ingestBlockBundle");

        let result = (|| -> MonitorResult<BundleSummary> {
            let mut summary = BundleSummary::default();
            write_block(&tx, block)?;
            for batch in &bundle.batches {
                if batch.block_height != block.height {
                    return Err(MonitorError::Validation(format!(
                        "batch {} claims height {} inside block {}",
                        batch.batch_id, batch.block_height, block.height
                    )));
                }
                if write_batch(&tx, batch)?.is_inserted() {
                    summary.batches_inserted += 1;
                }
                let fact = participation_from_batch(batch, block.timestamp);
                if write_participation(&tx, &fact)?.is_inserted() {
                    summary.participation_inserted += 1;
                }
            }
            for record in &bundle.validator_rewards {
                write_reward(&tx, RewardKind::Validator, record)?;
                summary.rewards_written += 1;
            }
            for record in &bundle.delegator_rewards {
                write_reward(&tx, RewardKind::Delegator, record)?;
                summary.rewards_written += 1;
            }
            Ok(summary)
        })()
        .map_err(ctx)?;

        tx.commit().map_err(MonitorError::query("ingestBlockBundle"))?;
        log::debug!(
            "✅ Block {} ingested: {} batches, {} participation, {} rewards",
            block.height,
            result.batches_inserted,
            result.participation_inserted,
            result.rewards_written
        );
        Ok(result)
    }

    pub async fn latest_block_height(&self) -> MonitorResult<Option<i64>> {
        let conn = self.pool.acquire().await?;
        conn.query_row("SELECT MAX(height) FROM blocks", [], |row| row.get(0))
            .map_err(MonitorError::query("latestBlockHeight"))
    }

    /// Highest round with at least one participation fact
    pub async fn latest_participation_round(&self) -> MonitorResult<Option<i64>> {
        let conn = self.pool.acquire().await?;
        conn.query_row("SELECT MAX(round) FROM committee_participation", [], |row| row.get(0))
            .map_err(MonitorError::query("latestParticipationRound"))
    }
}
