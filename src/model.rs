//! Typed records for every persisted entity
//!
//! One struct per table. Each record validates its own invariants with
//! `validate()` before any statement touches the store, so a bad row
//! inside a batch fails the whole transaction up front.

use crate::amount::RewardAmount;
use crate::error::{MonitorError, MonitorResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn require_address(field: &str, value: &str) -> MonitorResult<()> {
    if value.is_empty() || value.chars().any(char::is_whitespace) {
        return Err(MonitorError::Validation(format!(
            "{} must be a non-empty address without whitespace (got {:?})",
            field, value
        )));
    }
    Ok(())
}

fn require_non_negative(field: &str, value: i64) -> MonitorResult<()> {
    if value < 0 {
        return Err(MonitorError::Validation(format!(
            "{} must be non-negative (got {})",
            field, value
        )));
    }
    Ok(())
}

/// Row of `blocks`, keyed by height
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub height: i64,
    pub hash: String,
    pub previous_hash: String,
    pub round: i64,
    pub timestamp: i64,
    pub transactions_count: i64,
    #[serde(default)]
    pub block_reward: Option<RewardAmount>,
}

impl Block {
    pub fn validate(&self) -> MonitorResult<()> {
        require_non_negative("height", self.height)?;
        require_non_negative("round", self.round)?;
        require_non_negative("timestamp", self.timestamp)?;
        require_non_negative("transactions_count", self.transactions_count)?;
        if self.hash.trim().is_empty() {
            return Err(MonitorError::Validation(format!(
                "block {} has an empty hash",
                self.height
            )));
        }
        // Genesis is the only block allowed without a parent
        if self.height > 0 && self.previous_hash.trim().is_empty() {
            return Err(MonitorError::Validation(format!(
                "block {} has an empty previous_hash",
                self.height
            )));
        }
        if self.previous_hash == self.hash {
            return Err(MonitorError::Validation(format!(
                "block {} references itself as parent",
                self.height
            )));
        }
        if let Some(reward) = &self.block_reward {
            if reward.is_negative() {
                return Err(MonitorError::Validation(format!(
                    "block {} has a negative reward",
                    self.height
                )));
            }
        }
        Ok(())
    }
}

/// Upstream committee entry: `[stake, is_open, commission]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(RewardAmount, bool, u8)", into = "(RewardAmount, bool, u8)")]
pub struct CommitteeEntry {
    pub stake: RewardAmount,
    pub is_open: bool,
    pub commission: u8,
}

impl From<(RewardAmount, bool, u8)> for CommitteeEntry {
    fn from((stake, is_open, commission): (RewardAmount, bool, u8)) -> Self {
        Self {
            stake,
            is_open,
            commission,
        }
    }
}

impl From<CommitteeEntry> for (RewardAmount, bool, u8) {
    fn from(entry: CommitteeEntry) -> Self {
        (entry.stake, entry.is_open, entry.commission)
    }
}

/// Address → entry, ordered so committee writes are deterministic
pub type Committee = BTreeMap<String, CommitteeEntry>;

/// Row of `committee_members`, keyed by address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitteeMember {
    pub address: String,
    pub first_seen_block: i64,
    pub last_seen_block: i64,
    pub total_stake: RewardAmount,
    pub is_open: bool,
    pub commission: u8,
    pub is_active: bool,
    pub last_updated: i64,
}

/// Incoming committee sighting for one member at one block height
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberUpdate {
    pub address: String,
    pub height: i64,
    pub stake: RewardAmount,
    pub is_open: bool,
    pub commission: u8,
}

impl MemberUpdate {
    pub fn validate(&self) -> MonitorResult<()> {
        require_address("address", &self.address)?;
        require_non_negative("height", self.height)?;
        if self.stake.is_negative() {
            return Err(MonitorError::Validation(format!(
                "member {} has negative stake {}",
                self.address, self.stake
            )));
        }
        if self.commission > 100 {
            return Err(MonitorError::Validation(format!(
                "member {} has commission {} above 100",
                self.address, self.commission
            )));
        }
        Ok(())
    }
}

/// Row of `committee_participation`: `address` took part in `round`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitteeParticipation {
    pub address: String,
    pub round: i64,
    pub block_height: i64,
    pub timestamp: i64,
}

impl CommitteeParticipation {
    pub fn validate(&self) -> MonitorResult<()> {
        require_address("committee_member_address", &self.address)?;
        require_non_negative("round", self.round)?;
        require_non_negative("block_height", self.block_height)
    }
}

/// Row of `batches`, keyed by batch_id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub batch_id: String,
    pub author: String,
    pub round: i64,
    pub committee_id: String,
    pub block_height: i64,
}

impl Batch {
    pub fn validate(&self) -> MonitorResult<()> {
        if self.batch_id.trim().is_empty() {
            return Err(MonitorError::Validation("batch_id must not be empty".into()));
        }
        require_address("author", &self.author)?;
        require_non_negative("round", self.round)?;
        require_non_negative("block_height", self.block_height)
    }
}

/// Row of `uptime_snapshots`; never updated once written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UptimeSnapshot {
    pub address: String,
    pub start_round: i64,
    pub end_round: i64,
    pub total_rounds: i64,
    pub participated_rounds: i64,
    pub uptime_percentage: f64,
    pub timestamp: i64,
}

impl UptimeSnapshot {
    pub fn validate(&self) -> MonitorResult<()> {
        require_address("address", &self.address)?;
        if self.start_round > self.end_round {
            return Err(MonitorError::Validation(format!(
                "uptime window [{}, {}] is inverted",
                self.start_round, self.end_round
            )));
        }
        if self.participated_rounds < 0 || self.participated_rounds > self.total_rounds {
            return Err(MonitorError::Validation(format!(
                "participated_rounds {} outside 0..={}",
                self.participated_rounds, self.total_rounds
            )));
        }
        if !(0.0..=100.0).contains(&self.uptime_percentage) {
            return Err(MonitorError::Validation(format!(
                "uptime_percentage {} outside 0..=100",
                self.uptime_percentage
            )));
        }
        Ok(())
    }
}

/// Row of `validator_status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorStatus {
    pub address: String,
    pub last_active_round: i64,
    pub consecutive_inactive_rounds: i64,
    pub is_active: bool,
    pub last_updated: i64,
    /// Newest round applied to this row; older or equal rounds are skipped
    #[serde(default)]
    pub last_evaluated_round: Option<i64>,
}

/// Which reward table a [`RewardRecord`] belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewardKind {
    Validator,
    Delegator,
}

impl RewardKind {
    pub fn table(&self) -> &'static str {
        match self {
            RewardKind::Validator => "validator_rewards",
            RewardKind::Delegator => "delegator_rewards",
        }
    }
}

/// Row of `validator_rewards` / `delegator_rewards`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardRecord {
    pub address: String,
    pub block_height: i64,
    pub reward: RewardAmount,
    pub timestamp: i64,
}

impl RewardRecord {
    pub fn validate(&self) -> MonitorResult<()> {
        require_address("address", &self.address)?;
        require_non_negative("block_height", self.block_height)?;
        if self.reward.is_negative() {
            return Err(MonitorError::Validation(format!(
                "reward for {} at {} is negative",
                self.address, self.block_height
            )));
        }
        Ok(())
    }
}

/// Row of `delegations`, keyed by (delegator, validator)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegation {
    pub delegator: String,
    pub validator: String,
    pub amount: RewardAmount,
    pub last_updated: i64,
}

impl Delegation {
    pub fn validate(&self) -> MonitorResult<()> {
        require_address("delegator", &self.delegator)?;
        require_address("validator", &self.validator)?;
        if self.amount.is_negative() {
            return Err(MonitorError::Validation(format!(
                "delegation {} -> {} is negative",
                self.delegator, self.validator
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(height: i64) -> Block {
        Block {
            height,
            hash: format!("ab1hash{}", height),
            previous_hash: format!("ab1hash{}", height - 1),
            round: height * 2,
            timestamp: 1_700_000_000 + height,
            transactions_count: 3,
            block_reward: None,
        }
    }

    #[test]
    fn test_block_validation() {
        assert!(block(5).validate().is_ok());

        let mut genesis = block(0);
        genesis.previous_hash = String::new();
        assert!(genesis.validate().is_ok());

        let mut orphan = block(7);
        orphan.previous_hash = String::new();
        assert!(orphan.validate().is_err());

        let mut no_hash = block(8);
        no_hash.hash = "  ".into();
        assert!(no_hash.validate().is_err());

        let mut negative = block(9);
        negative.transactions_count = -1;
        assert!(negative.validate().is_err());
    }

    #[test]
    fn test_committee_entry_wire_format() {
        let committee: Committee =
            serde_json::from_str(r#"{"aleo1abc": ["500", true, 5], "aleo1def": [1000, false, 0]}"#)
                .unwrap();
        let entry = &committee["aleo1abc"];
        assert_eq!(entry.stake.to_string(), "500");
        assert!(entry.is_open);
        assert_eq!(entry.commission, 5);
        assert_eq!(committee["aleo1def"].stake.to_string(), "1000");

        let back = serde_json::to_string(&committee["aleo1abc"]).unwrap();
        assert_eq!(back, r#"["500",true,5]"#);
    }

    #[test]
    fn test_member_update_commission_bound() {
        let mut update = MemberUpdate {
            address: "aleo1abc".into(),
            height: 10,
            stake: RewardAmount::from(10u64),
            is_open: true,
            commission: 100,
        };
        assert!(update.validate().is_ok());
        update.commission = 101;
        assert!(update.validate().is_err());
    }

    #[test]
    fn test_uptime_snapshot_bounds() {
        let snap = UptimeSnapshot {
            address: "aleo1abc".into(),
            start_round: 10,
            end_round: 5,
            total_rounds: 0,
            participated_rounds: 0,
            uptime_percentage: 0.0,
            timestamp: 0,
        };
        assert!(snap.validate().is_err());
    }
}
