//! Upstream chain-data interface
//!
//! The monitor never talks to the network itself; a `ChainDataProvider`
//! hands it structured records. [`SpoolProvider`] reads them from JSON
//! files dropped into a directory by an external fetcher.

pub mod spool;

pub use spool::SpoolProvider;

use crate::amount::RewardAmount;
use crate::error::MonitorResult;
use crate::ingest::BlockBundle;
use crate::model::{Batch, Block, Committee, RewardRecord};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Batch as it appears inside an upstream block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainBatch {
    pub batch_id: String,
    pub author: String,
    pub round: i64,
    #[serde(default)]
    pub committee_id: String,
}

/// Upstream block record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainBlock {
    pub height: i64,
    pub hash: String,
    #[serde(default)]
    pub previous_hash: String,
    pub round: i64,
    pub timestamp: i64,
    #[serde(default)]
    pub transactions_count: i64,
    #[serde(default)]
    pub block_reward: Option<RewardAmount>,
    #[serde(default)]
    pub batches: Vec<ChainBatch>,
    #[serde(default)]
    pub validator_rewards: BTreeMap<String, RewardAmount>,
    #[serde(default)]
    pub delegator_rewards: BTreeMap<String, RewardAmount>,
}

impl ChainBlock {
    pub fn block(&self) -> Block {
        Block {
            height: self.height,
            hash: self.hash.clone(),
            previous_hash: self.previous_hash.clone(),
            round: self.round,
            timestamp: self.timestamp,
            transactions_count: self.transactions_count,
            block_reward: self.block_reward.clone(),
        }
    }

    /// Everything this block contributes to the store
    pub fn into_bundle(self) -> BlockBundle {
        let block = self.block();
        let rewards = |map: BTreeMap<String, RewardAmount>| -> Vec<RewardRecord> {
            map.into_iter()
                .map(|(address, reward)| RewardRecord {
                    address,
                    block_height: block.height,
                    reward,
                    timestamp: block.timestamp,
                })
                .collect()
        };
        let batches = self
            .batches
            .into_iter()
            .map(|b| Batch {
                batch_id: b.batch_id,
                author: b.author,
                round: b.round,
                committee_id: b.committee_id,
                block_height: block.height,
            })
            .collect();
        let validator_rewards = rewards(self.validator_rewards);
        let delegator_rewards = rewards(self.delegator_rewards);
        BlockBundle {
            block: Some(block),
            batches,
            validator_rewards,
            delegator_rewards,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    #[serde(rename = "type", alias = "kind")]
    pub kind: String,
    #[serde(default)]
    pub fee: Option<RewardAmount>,
}

/// Source of chain records
#[async_trait]
pub trait ChainDataProvider: Send + Sync {
    async fn get_latest_block(&self) -> MonitorResult<Option<ChainBlock>>;

    async fn get_block_by_height(&self, height: i64) -> MonitorResult<Option<ChainBlock>>;

    /// Current committee and the height it was read at
    async fn get_latest_committee(&self) -> MonitorResult<Option<(i64, Committee)>>;

    async fn get_transactions(&self, height: i64) -> MonitorResult<Vec<Transaction>>;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}
