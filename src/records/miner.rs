use crate::coins::Coins;
use crate::params::Rate;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MinerStatus {
    Active,
    Inactive,
}

impl fmt::Display for MinerStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MinerStatus::Active => write!(f, "active"),
            MinerStatus::Inactive => write!(f, "inactive"),
        }
    }
}

/// A block-producing participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Miner {
    pub address: String,
    pub description: String,
    /// Fraction of rewards the miner retains; bounded by the params.
    pub commission: Rate,
    pub total_rewards: Coins,
    pub blocks_mined: u64,
    pub status: MinerStatus,
    pub registered_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
}

impl Miner {
    pub fn new(
        address: impl Into<String>,
        description: impl Into<String>,
        commission: Rate,
        registered_at: DateTime<Utc>,
    ) -> Self {
        Miner {
            address: address.into(),
            description: description.into(),
            commission,
            total_rewards: Coins::empty(),
            blocks_mined: 0,
            status: MinerStatus::Active,
            registered_at,
            last_active_at: registered_at,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == MinerStatus::Active
    }

    /// Credits one produced block and its reward.
    pub fn record_block(&mut self, reward: &Coins, at: DateTime<Utc>) {
        self.blocks_mined += 1;
        self.total_rewards = self.total_rewards.add(reward);
        self.last_active_at = at;
    }
}
