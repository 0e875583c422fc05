//! Validator status reconciliation and uptime snapshots
//!
//! ## State machine
//!
//! One state per address, `{active, inactive}`, no terminal state. A new
//! address starts active with zero counters. Per tick:
//!
//! - participated in the round: `last_active_round := round`, counter
//!   reset to 0, `is_active := true`
//! - missed the round: counter += 1; `is_active := false` once the
//!   counter reaches [`INACTIVITY_THRESHOLD`], otherwise left as it was
//! - any round at or below `last_evaluated_round`: no change
//!
//! The rules live in [`ValidatorState::apply`], a pure function. The engine
//! reads the row, applies it and writes it back inside one
//! `BEGIN IMMEDIATE` transaction, so two reconcilers touching the same
//! address serialize on SQLite's write lock and different addresses never
//! share a transaction. The persisted `last_evaluated_round` makes a
//! replayed round (restart, overlapping tick) a no-op.

pub mod uptime;

pub use uptime::uptime_percentage;

use crate::error::{MonitorError, MonitorResult};
use crate::ingest::{IngestionStore, WriteOutcome};
use crate::model::{UptimeSnapshot, ValidatorStatus};
use crate::store::ConnectionPool;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Consecutive missed rounds after which a validator is marked inactive
pub const INACTIVITY_THRESHOLD: i64 = 10;

/// What a reconciliation tick saw for one address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundObservation {
    Participated(i64),
    Missed(i64),
}

impl RoundObservation {
    pub fn round(&self) -> i64 {
        match self {
            RoundObservation::Participated(r) | RoundObservation::Missed(r) => *r,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatorState {
    pub last_active_round: i64,
    pub consecutive_inactive_rounds: i64,
    pub is_active: bool,
    pub last_evaluated_round: Option<i64>,
}

impl Default for ValidatorState {
    fn default() -> Self {
        Self {
            last_active_round: 0,
            consecutive_inactive_rounds: 0,
            is_active: true,
            last_evaluated_round: None,
        }
    }
}

impl ValidatorState {
    pub fn apply(self, observation: RoundObservation) -> Self {
        self.apply_with_threshold(observation, INACTIVITY_THRESHOLD)
    }

    pub fn apply_with_threshold(self, observation: RoundObservation, threshold: i64) -> Self {
        if self.has_evaluated(observation.round()) {
            return self;
        }
        match observation {
            RoundObservation::Participated(round) => Self {
                last_active_round: round,
                consecutive_inactive_rounds: 0,
                is_active: true,
                last_evaluated_round: Some(round),
            },
            RoundObservation::Missed(round) => {
                let misses = self.consecutive_inactive_rounds.saturating_add(1);
                Self {
                    last_active_round: self.last_active_round,
                    consecutive_inactive_rounds: misses,
                    // sticky below the threshold
                    is_active: if misses >= threshold { false } else { self.is_active },
                    last_evaluated_round: Some(round),
                }
            }
        }
    }

    /// Whether `round` is already reflected in this state
    pub fn has_evaluated(&self, round: i64) -> bool {
        self.last_evaluated_round.map_or(false, |last| round <= last)
    }
}

/// Before/after pair for one applied observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusTransition {
    pub before: Option<ValidatorState>,
    pub after: ValidatorState,
    /// `false` when the round was already evaluated and nothing was written
    pub applied: bool,
}

impl StatusTransition {
    pub fn went_inactive(&self) -> bool {
        self.applied && self.before.map_or(true, |b| b.is_active) && !self.after.is_active
    }

    pub fn went_active(&self) -> bool {
        self.applied && self.before.map_or(false, |b| !b.is_active) && self.after.is_active
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub evaluated: usize,
    pub participated: usize,
    pub missed: usize,
    /// Addresses that had already seen the round
    pub skipped: usize,
    pub deactivated: usize,
    pub reactivated: usize,
}

fn read_state(conn: &Connection, address: &str) -> rusqlite::Result<Option<ValidatorState>> {
    conn.query_row(
        "SELECT last_active_round, consecutive_inactive_rounds, is_active, last_evaluated_round
         FROM validator_status WHERE address = ?1",
        [address],
        |row| {
            Ok(ValidatorState {
                last_active_round: row.get(0)?,
                consecutive_inactive_rounds: row.get(1)?,
                is_active: row.get(2)?,
                last_evaluated_round: row.get(3)?,
            })
        },
    )
    .optional()
}

fn write_state(conn: &Connection, address: &str, state: &ValidatorState, now: i64) -> rusqlite::Result<()> {
    conn.execute(
        r#"
        INSERT INTO validator_status (
            address, last_active_round, consecutive_inactive_rounds, is_active, last_updated,
            last_evaluated_round
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ON CONFLICT(address) DO UPDATE SET
            last_active_round = excluded.last_active_round,
            consecutive_inactive_rounds = excluded.consecutive_inactive_rounds,
            is_active = excluded.is_active,
            last_updated = excluded.last_updated,
            last_evaluated_round = excluded.last_evaluated_round
        "#,
        params![
            address,
            state.last_active_round,
            state.consecutive_inactive_rounds,
            state.is_active,
            now,
            state.last_evaluated_round,
        ],
    )?;
    Ok(())
}

pub struct ValidatorStatusEngine {
    pool: Arc<ConnectionPool>,
    store: IngestionStore,
    threshold: i64,
}

impl ValidatorStatusEngine {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self {
            store: IngestionStore::new(pool.clone()),
            pool,
            threshold: INACTIVITY_THRESHOLD,
        }
    }

    /// Apply one observation to one address as a single atomic write
    ///
    /// A round the address has already been evaluated for leaves the row
    /// untouched and comes back with `applied == false`.
    pub async fn apply_observation(
        &self,
        address: &str,
        observation: RoundObservation,
    ) -> MonitorResult<StatusTransition> {
        let now = chrono::Utc::now().timestamp();
        let op = "applyStatusTransition";

        let mut conn = self.pool.acquire().await?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(MonitorError::query(op))?;

        let before = read_state(&tx, address).map_err(MonitorError::query(op))?;
        let current = before.unwrap_or_default();
        if current.has_evaluated(observation.round()) {
            // tx dropped: nothing to write
            log::debug!("↩️  {} already evaluated through round {}", address, observation.round());
            return Ok(StatusTransition {
                before,
                after: current,
                applied: false,
            });
        }
        let after = current.apply_with_threshold(observation, self.threshold);
        write_state(&tx, address, &after, now).map_err(MonitorError::query(op))?;

        tx.commit().map_err(MonitorError::query(op))?;

        let transition = StatusTransition {
            before,
            after,
            applied: true,
        };
        if transition.went_inactive() {
            log::warn!(
                "🔴 {} inactive after {} missed rounds (round {})",
                address,
                after.consecutive_inactive_rounds,
                observation.round()
            );
        } else if transition.went_active() {
            log::info!("🟢 {} active again at round {}", address, observation.round());
        }
        Ok(transition)
    }

    pub async fn record_participation(&self, address: &str, round: i64) -> MonitorResult<StatusTransition> {
        self.apply_observation(address, RoundObservation::Participated(round)).await
    }

    pub async fn record_miss(&self, address: &str, round: i64) -> MonitorResult<StatusTransition> {
        self.apply_observation(address, RoundObservation::Missed(round)).await
    }

    /// Addresses to evaluate for `round` and the subset that took part
    async fn round_roster(&self, round: i64) -> MonitorResult<(BTreeSet<String>, BTreeSet<String>)> {
        let op = "reconcileRound";
        let mut conn = self.pool.acquire().await?;
        let tx = conn.transaction().map_err(MonitorError::query(op))?;

        let participants = {
            let mut stmt = tx
                .prepare(
                    "SELECT DISTINCT committee_member_address FROM committee_participation
                     WHERE round = ?1",
                )
                .map_err(MonitorError::query(op))?;
            let rows = stmt
                .query_map([round], |row| row.get::<_, String>(0))
                .map_err(MonitorError::query(op))?
                .collect::<rusqlite::Result<BTreeSet<_>>>()
                .map_err(MonitorError::query(op))?;
            rows
        };

        let mut tracked = {
            let mut stmt = tx
                .prepare(
                    "SELECT address FROM committee_members WHERE is_active = 1
                     UNION
                     SELECT address FROM validator_status",
                )
                .map_err(MonitorError::query(op))?;
            let rows = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(MonitorError::query(op))?
                .collect::<rusqlite::Result<BTreeSet<_>>>()
                .map_err(MonitorError::query(op))?;
            rows
        };
        tx.commit().map_err(MonitorError::query(op))?;

        // First sighting may come from participation alone
        tracked.extend(participants.iter().cloned());
        Ok((tracked, participants))
    }

    /// One reconciliation tick for `round` over every tracked validator
    ///
    /// Each address is its own transaction. The first failure aborts the
    /// tick; addresses already reconciled stay committed.
    pub async fn reconcile_round(&self, round: i64) -> MonitorResult<ReconcileSummary> {
        let (tracked, participants) = self.round_roster(round).await?;

        let mut summary = ReconcileSummary::default();
        for address in &tracked {
            let participated = participants.contains(address);
            let observation = if participated {
                RoundObservation::Participated(round)
            } else {
                RoundObservation::Missed(round)
            };
            let transition = self.apply_observation(address, observation).await?;
            if !transition.applied {
                summary.skipped += 1;
                continue;
            }
            summary.evaluated += 1;
            if participated {
                summary.participated += 1;
            } else {
                summary.missed += 1;
            }
            if transition.went_inactive() {
                summary.deactivated += 1;
            }
            if transition.went_active() {
                summary.reactivated += 1;
            }
        }

        log::debug!(
            "🔁 Round {} reconciled: {} evaluated, {} participated, {} missed, {} skipped",
            round,
            summary.evaluated,
            summary.participated,
            summary.missed,
            summary.skipped
        );
        Ok(summary)
    }

    /// Rounds in `(after, through]` with at least one participation fact,
    /// ascending
    pub async fn observed_rounds(&self, after: i64, through: i64, limit: usize) -> MonitorResult<Vec<i64>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let conn = self.pool.acquire().await?;
        let mut stmt = conn
            .prepare(
                "SELECT DISTINCT round FROM committee_participation
                 WHERE round > ?1 AND round <= ?2 ORDER BY round ASC LIMIT ?3",
            )
            .map_err(MonitorError::query("observedRounds"))?;
        let rounds = stmt
            .query_map(params![after, through, limit], |row| row.get(0))
            .map_err(MonitorError::query("observedRounds"))?
            .collect::<rusqlite::Result<Vec<i64>>>()
            .map_err(MonitorError::query("observedRounds"))?;
        Ok(rounds)
    }

    /// Highest round any address has been evaluated for
    pub async fn last_evaluated_round(&self) -> MonitorResult<Option<i64>> {
        let conn = self.pool.acquire().await?;
        conn.query_row("SELECT MAX(last_evaluated_round) FROM validator_status", [], |row| row.get(0))
            .map_err(MonitorError::query("lastEvaluatedRound"))
    }

    pub async fn get_status(&self, address: &str) -> MonitorResult<Option<ValidatorStatus>> {
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

    /// Uptime over `[start_round, end_round]`, not persisted
    pub async fn compute_uptime(&self, address: &str, start_round: i64, end_round: i64) -> MonitorResult<UptimeSnapshot> {
        let now = chrono::Utc::now().timestamp();
        let mut conn = self.pool.acquire().await?;
        // Both counts read one snapshot
        let tx = conn.transaction().map_err(MonitorError::query("computeUptime"))?;
        let snapshot = uptime::compute_window(&tx, address, start_round, end_round, now)?;
        tx.commit().map_err(MonitorError::query("computeUptime"))?;
        Ok(snapshot)
    }

    /// Compute and append an immutable snapshot for one window
    pub async fn snapshot_uptime(
        &self,
        address: &str,
        start_round: i64,
        end_round: i64,
    ) -> MonitorResult<(UptimeSnapshot, WriteOutcome)> {
        let snapshot = self.compute_uptime(address, start_round, end_round).await?;
        let outcome = self.store.insert_uptime_snapshot(&snapshot).await?;
        Ok((snapshot, outcome))
    }

    /// Snapshot every active committee member for one window; returns how
    /// many snapshots were new
    pub async fn snapshot_committee_uptime(&self, start_round: i64, end_round: i64) -> MonitorResult<usize> {
        let now = chrono::Utc::now().timestamp();
        let snapshots = {
            let mut conn = self.pool.acquire().await?;
            let tx = conn.transaction().map_err(MonitorError::query("snapshotCommitteeUptime"))?;
            let addresses = {
                let mut stmt = tx
                    .prepare("SELECT address FROM committee_members WHERE is_active = 1 ORDER BY address")
                    .map_err(MonitorError::query("snapshotCommitteeUptime"))?;
                let rows = stmt
                    .query_map([], |row| row.get::<_, String>(0))
                    .map_err(MonitorError::query("snapshotCommitteeUptime"))?
                    .collect::<rusqlite::Result<Vec<_>>>()
                    .map_err(MonitorError::query("snapshotCommitteeUptime"))?;
                rows
            };
            let mut snapshots = Vec::with_capacity(addresses.len());
            for address in &addresses {
                snapshots.push(uptime::compute_window(&tx, address, start_round, end_round, now)?);
            }
            tx.commit().map_err(MonitorError::query("snapshotCommitteeUptime"))?;
            snapshots
        };

        let inserted = self.store.insert_uptime_snapshots(&snapshots).await?;
        log::info!(
            "📈 Uptime snapshots for rounds [{}, {}]: {} new of {}",
            start_round,
            end_round,
            inserted,
            snapshots.len()
        );
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::RewardAmount;
    use crate::model::{CommitteeParticipation, MemberUpdate};
    use crate::testutil::open_store;

    /// `n` consecutive misses for rounds `from..from + n`
    fn misses(state: ValidatorState, from: i64, n: i64) -> ValidatorState {
        (from..from + n).fold(state, |s, r| s.apply(RoundObservation::Missed(r)))
    }

    #[test]
    fn test_tenth_miss_flips_inactive() {
        let start = ValidatorState::default().apply(RoundObservation::Participated(100));

        let nine = misses(start, 101, 9);
        assert!(nine.is_active);
        assert_eq!(nine.consecutive_inactive_rounds, 9);

        let ten = nine.apply(RoundObservation::Missed(110));
        assert!(!ten.is_active);
        assert_eq!(ten.consecutive_inactive_rounds, 10);

        let eleven = ten.apply(RoundObservation::Missed(111));
        assert!(!eleven.is_active);
        assert_eq!(eleven.consecutive_inactive_rounds, 11);
        assert_eq!(eleven.last_active_round, 100);
    }

    #[test]
    fn test_participation_resets_run_of_misses() {
        let state = misses(ValidatorState::default(), 1, 7);
        let back = state.apply(RoundObservation::Participated(42));
        assert_eq!(
            back,
            ValidatorState {
                last_active_round: 42,
                consecutive_inactive_rounds: 0,
                is_active: true,
                last_evaluated_round: Some(42),
            }
        );

        // Recovery from inactive is immediate on participation
        let inactive = misses(ValidatorState::default(), 1, 15);
        assert!(!inactive.is_active);
        assert!(inactive.apply(RoundObservation::Participated(60)).is_active);
    }

    #[test]
    fn test_inactive_flag_is_sticky_below_threshold() {
        let state = ValidatorState {
            last_active_round: 5,
            consecutive_inactive_rounds: 3,
            is_active: false,
            last_evaluated_round: Some(8),
        };
        let next = state.apply(RoundObservation::Missed(9));
        assert!(!next.is_active);
        assert_eq!(next.consecutive_inactive_rounds, 4);
    }

    #[test]
    fn test_evaluated_rounds_are_not_counted_twice() {
        let state = misses(ValidatorState::default(), 1, 3);
        assert_eq!(state.last_evaluated_round, Some(3));

        // Same round again, or an older one, changes nothing
        assert_eq!(state.apply(RoundObservation::Missed(3)), state);
        assert_eq!(state.apply(RoundObservation::Missed(2)), state);
        assert_eq!(state.apply(RoundObservation::Participated(1)), state);

        let next = state.apply(RoundObservation::Missed(4));
        assert_eq!(next.consecutive_inactive_rounds, 4);
        assert_eq!(next.last_evaluated_round, Some(4));
    }

    #[test]
    fn test_new_address_starts_active_with_zero_counters() {
        let state = ValidatorState::default();
        assert!(state.is_active);
        assert_eq!(state.consecutive_inactive_rounds, 0);
        assert_eq!(state.last_active_round, 0);
        assert_eq!(state.last_evaluated_round, None);
    }

    async fn seed_members(pool: &Arc<ConnectionPool>, addresses: &[&str]) {
        let store = IngestionStore::new(pool.clone());
        for address in addresses {
            store
                .insert_or_update_committee_member(&MemberUpdate {
                    address: address.to_string(),
                    height: 1,
                    stake: RewardAmount::from(100u64),
                    is_open: true,
                    commission: 0,
                })
                .await
                .unwrap();
        }
    }

    async fn participate(pool: &Arc<ConnectionPool>, address: &str, round: i64) {
        IngestionStore::new(pool.clone())
            .insert_committee_participation(&CommitteeParticipation {
                address: address.into(),
                round,
                block_height: round,
                timestamp: 0,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_reconcile_marks_silent_validator_on_tenth_tick() {
        let (_dir, pool) = open_store().await;
        seed_members(&pool, &["aleo1a", "aleo1b"]).await;
        let engine = ValidatorStatusEngine::new(pool.clone());

        for round in 1..=10 {
            participate(&pool, "aleo1b", round).await;
            let summary = engine.reconcile_round(round).await.unwrap();
            assert_eq!(summary.evaluated, 2);

            let a = engine.get_status("aleo1a").await.unwrap().unwrap();
            assert_eq!(a.consecutive_inactive_rounds, round);
            assert_eq!(a.is_active, round < 10, "round {}", round);
            if round == 10 {
                assert_eq!(summary.deactivated, 1);
            }
        }

        let b = engine.get_status("aleo1b").await.unwrap().unwrap();
        assert!(b.is_active);
        assert_eq!(b.last_active_round, 10);
        assert_eq!(b.consecutive_inactive_rounds, 0);
    }

    #[tokio::test]
    async fn test_participation_inside_miss_run_resets() {
        let (_dir, pool) = open_store().await;
        seed_members(&pool, &["aleo1a"]).await;
        let engine = ValidatorStatusEngine::new(pool.clone());

        for round in 1..=5 {
            engine.reconcile_round(round).await.unwrap();
        }
        participate(&pool, "aleo1a", 6).await;
        let summary = engine.reconcile_round(6).await.unwrap();
        assert_eq!(summary.participated, 1);

        let a = engine.get_status("aleo1a").await.unwrap().unwrap();
        assert_eq!(a.consecutive_inactive_rounds, 0);
        assert!(a.is_active);
        assert_eq!(a.last_active_round, 6);
    }

    #[tokio::test]
    async fn test_unknown_participant_is_tracked_on_first_sighting() {
        let (_dir, pool) = open_store().await;
        let engine = ValidatorStatusEngine::new(pool.clone());
        participate(&pool, "aleo1new", 3).await;

        let summary = engine.reconcile_round(3).await.unwrap();
        assert_eq!(summary.evaluated, 1);
        let status = engine.get_status("aleo1new").await.unwrap().unwrap();
        assert!(status.is_active);
        assert_eq!(status.last_active_round, 3);
    }

    #[tokio::test]
    async fn test_replayed_round_is_skipped() {
        let (_dir, pool) = open_store().await;
        seed_members(&pool, &["aleo1a", "aleo1quiet"]).await;
        participate(&pool, "aleo1a", 5).await;
        let engine = ValidatorStatusEngine::new(pool.clone());

        let first = engine.reconcile_round(5).await.unwrap();
        assert_eq!((first.evaluated, first.skipped), (2, 0));
        for _ in 0..3 {
            let again = engine.reconcile_round(5).await.unwrap();
            assert_eq!((again.evaluated, again.skipped), (0, 2));
        }
        let older = engine.reconcile_round(4).await.unwrap();
        assert_eq!(older.evaluated, 0);

        let quiet = engine.get_status("aleo1quiet").await.unwrap().unwrap();
        assert_eq!(quiet.consecutive_inactive_rounds, 1);
        assert_eq!(quiet.last_evaluated_round, Some(5));
        assert_eq!(engine.last_evaluated_round().await.unwrap(), Some(5));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_same_address_updates_serialize() {
        let (_dir, pool) = open_store().await;
        let engine = Arc::new(ValidatorStatusEngine::new(pool.clone()));

        // Same round from ten tasks: exactly one write lands
        let mut handles = Vec::new();
        for _ in 0..10 {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move {
                engine.record_miss("aleo1race", 1).await.unwrap().applied
            }));
        }
        let mut applied = 0;
        for handle in handles {
            if handle.await.unwrap() {
                applied += 1;
            }
        }
        assert_eq!(applied, 1);
        let status = engine.get_status("aleo1race").await.unwrap().unwrap();
        assert_eq!(status.consecutive_inactive_rounds, 1);

        // Distinct rounds racing: every applied write is counted, none lost
        let mut handles = Vec::new();
        for round in 2..=11 {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move {
                engine.record_miss("aleo1race", round).await.unwrap().applied
            }));
        }
        let mut applied = 1;
        for handle in handles {
            if handle.await.unwrap() {
                applied += 1;
            }
        }
        let status = engine.get_status("aleo1race").await.unwrap().unwrap();
        assert_eq!(status.consecutive_inactive_rounds, applied);
        assert_eq!(status.last_evaluated_round, Some(11));
    }

    #[tokio::test]
    async fn test_uptime_snapshots_are_independent_per_window() {
        let (_dir, pool) = open_store().await;
        seed_members(&pool, &["aleo1a", "aleo1b"]).await;
        for round in 1..=10 {
            participate(&pool, "aleo1b", round).await;
            if round % 2 == 0 {
                participate(&pool, "aleo1a", round).await;
            }
        }
        let engine = ValidatorStatusEngine::new(pool.clone());

        let (full, outcome) = engine.snapshot_uptime("aleo1b", 1, 10).await.unwrap();
        assert_eq!(full.uptime_percentage, 100.0);
        assert!(outcome.is_inserted());

        let (half, _) = engine.snapshot_uptime("aleo1a", 1, 10).await.unwrap();
        assert_eq!(half.participated_rounds, 5);
        assert_eq!(half.total_rounds, 10);
        assert_eq!(half.uptime_percentage, 50.0);

        // Overlapping window is a separate snapshot
        let (tail, outcome) = engine.snapshot_uptime("aleo1a", 6, 10).await.unwrap();
        assert_eq!(tail.total_rounds, 5);
        assert!(outcome.is_inserted());

        // Same window again keeps the first snapshot
        let (_, again) = engine.snapshot_uptime("aleo1a", 1, 10).await.unwrap();
        assert_eq!(again, WriteOutcome::ConflictNoop);

        let (empty, _) = engine.snapshot_uptime("aleo1a", 500, 600).await.unwrap();
        assert_eq!(empty.total_rounds, 0);
        assert_eq!(empty.uptime_percentage, 0.0);

        assert_eq!(engine.snapshot_committee_uptime(1, 4).await.unwrap(), 2);
        assert_eq!(engine.snapshot_committee_uptime(1, 4).await.unwrap(), 0);
    }
}
