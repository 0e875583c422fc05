//! Poll-cycle jobs: block sync, committee refresh, status reconciliation,
//! uptime snapshots
//!
//! Every job is safe to run twice for the same input: block and committee
//! writes are upserts, participation and snapshots are append-only, and
//! reconciliation skips any round an address was already evaluated for.

pub mod scheduler;

pub use scheduler::{JobStats, PeriodicJob};

use crate::config::MonitorConfig;
use crate::error::MonitorResult;
use crate::ingest::{CommitteeSyncSummary, IngestionStore};
use crate::provider::ChainDataProvider;
use crate::status::ValidatorStatusEngine;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Duration;

/// Rounds reconciled per reconcile tick at most
const MAX_ROUNDS_PER_TICK: usize = 500;

pub struct ChainSync {
    provider: Arc<dyn ChainDataProvider>,
    store: IngestionStore,
    engine: Arc<ValidatorStatusEngine>,
    max_batch: usize,
    uptime_window_rounds: i64,
    reconcile_lag_rounds: i64,
    /// Last round handed to `reconcile_round`
    reconcile_cursor: Mutex<Option<i64>>,
}

impl ChainSync {
    pub fn new(
        provider: Arc<dyn ChainDataProvider>,
        store: IngestionStore,
        engine: Arc<ValidatorStatusEngine>,
        config: &MonitorConfig,
    ) -> Self {
        Self {
            provider,
            store,
            engine,
            max_batch: config.block_sync_max_batch,
            uptime_window_rounds: config.uptime_window_rounds,
            reconcile_lag_rounds: config.reconcile_lag_rounds,
            reconcile_cursor: Mutex::new(None),
        }
    }

    /// Ingest up to `max_batch` blocks past the local tip
    ///
    /// An empty store starts `max_batch` blocks behind the remote tip
    /// rather than at genesis and skips heights the provider never had.
    /// Otherwise sync stops early at the first height the provider does not
    /// have yet.
    pub async fn sync_blocks(&self) -> MonitorResult<usize> {
        let remote = match self.provider.get_latest_block().await? {
            Some(block) => block.height,
            None => return Ok(0),
        };
        let window = self.max_batch as i64;
        let local = self.store.latest_block_height().await?;
        let start = match local {
            Some(local) => local + 1,
            None => (remote - window + 1).max(0),
        };
        if start > remote {
            return Ok(0);
        }
        let end = remote.min(start + window - 1);

        let mut ingested = 0;
        for height in start..=end {
            let mut chain = match self.provider.get_block_by_height(height).await? {
                Some(block) => block,
                None if local.is_none() && ingested == 0 => continue,
                None => {
                    log::debug!("⏸️  Block {} not available from {} yet", height, self.provider.name());
                    break;
                }
            };
            if chain.transactions_count == 0 {
                chain.transactions_count = self.provider.get_transactions(height).await?.len() as i64;
            }
            self.store.ingest_block_bundle(&chain.into_bundle()).await?;
            ingested += 1;
        }

        if ingested > 0 {
            log::info!("📦 Synced {} blocks from height {}, remote tip {}", ingested, start, remote);
        }
        Ok(ingested)
    }

    pub async fn refresh_committee(&self) -> MonitorResult<Option<CommitteeSyncSummary>> {
        match self.provider.get_latest_committee().await? {
            Some((height, committee)) => Ok(Some(self.store.sync_committee(height, &committee).await?)),
            None => Ok(None),
        }
    }

    /// Tick every observed round after the cursor, up to
    /// `reconcile_lag_rounds` behind the newest observed round
    ///
    /// Without an in-memory cursor the store decides where to resume: the
    /// last evaluated round is replayed (already-evaluated addresses skip
    /// it), and a store that never reconciled starts at the newest eligible
    /// round.
    pub async fn reconcile_status(&self) -> MonitorResult<usize> {
        let mut cursor = self.reconcile_cursor.lock().await;
        let latest = match self.store.latest_participation_round().await? {
            Some(latest) => latest,
            None => return Ok(0),
        };
        let through = latest - self.reconcile_lag_rounds;
        let after = match *cursor {
            Some(round) => round,
            None => match self.engine.last_evaluated_round().await? {
                Some(last) => last - 1,
                None => through - 1,
            },
        };

        let rounds = self.engine.observed_rounds(after, through, MAX_ROUNDS_PER_TICK).await?;
        for round in &rounds {
            self.engine.reconcile_round(*round).await?;
            *cursor = Some(*round);
        }
        if let Some(last) = rounds.last() {
            log::info!("🔁 Reconciled {} rounds up to {}", rounds.len(), last);
        }
        Ok(rounds.len())
    }

    /// Snapshot every active member over the trailing window of rounds
    pub async fn snapshot_uptime(&self) -> MonitorResult<usize> {
        let end = match self.store.latest_participation_round().await? {
            Some(round) => round,
            None => return Ok(0),
        };
        let start = (end - self.uptime_window_rounds + 1).max(0);
        self.engine.snapshot_committee_uptime(start, end).await
    }
}

/// Start the four periodic jobs
pub fn spawn_jobs(sync: Arc<ChainSync>, config: &MonitorConfig) -> Vec<JoinHandle<()>> {
    let ms = Duration::from_millis;
    let mut handles = Vec::with_capacity(4);

    let s = sync.clone();
    handles.push(PeriodicJob::new("block-sync", ms(config.block_sync_interval_ms)).spawn(move || {
        let s = s.clone();
        async move { s.sync_blocks().await }
    }));

    let s = sync.clone();
    handles.push(
        PeriodicJob::new("committee-refresh", ms(config.committee_refresh_interval_ms)).spawn(move || {
            let s = s.clone();
            async move { s.refresh_committee().await }
        }),
    );

    let s = sync.clone();
    handles.push(
        PeriodicJob::new("status-reconcile", ms(config.status_reconcile_interval_ms)).spawn(move || {
            let s = s.clone();
            async move { s.reconcile_status().await }
        }),
    );

    let s = sync;
    handles.push(PeriodicJob::new("uptime-snapshot", ms(config.uptime_interval_ms)).spawn(move || {
        let s = s.clone();
        async move { s.snapshot_uptime().await }
    }));

    handles
}
