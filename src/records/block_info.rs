use crate::coins::Coins;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reward stamped on a freshly constructed [`BlockInfo`]: one native unit
/// (100 base units). Reward issuance overwrites it with the params value.
pub const DEFAULT_BLOCK_REWARD: u128 = 100;
pub const DEFAULT_GAS_LIMIT: u64 = 10_000_000;

/// Metadata of one committed height. Written once, never modified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    pub height: u64,
    pub hash: String,
    pub prev_hash: String,
    pub timestamp: DateTime<Utc>,
    pub miner: String,
    pub tx_count: u64,
    pub total_fees: Coins,
    pub reward: Coins,
    pub size: u64,
    pub gas_used: u64,
    pub gas_limit: u64,
}

impl BlockInfo {
    pub fn new(
        height: u64,
        hash: impl Into<String>,
        prev_hash: impl Into<String>,
        miner: impl Into<String>,
        tx_count: u64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        BlockInfo {
            height,
            hash: hash.into(),
            prev_hash: prev_hash.into(),
            timestamp,
            miner: miner.into(),
            tx_count,
            total_fees: Coins::empty(),
            reward: Coins::native(DEFAULT_BLOCK_REWARD),
            size: 0,
            gas_used: 0,
            gas_limit: DEFAULT_GAS_LIMIT,
        }
    }

    pub fn with_reward(mut self, reward: Coins) -> Self {
        self.reward = reward;
        self
    }

    pub fn with_fees(mut self, total_fees: Coins) -> Self {
        self.total_fees = total_fees;
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    pub fn with_gas_used(mut self, gas_used: u64) -> Self {
        self.gas_used = gas_used;
        self
    }

    /// Height of the block that follows this one, `None` at `u64::MAX`.
    pub fn next_height(&self) -> Option<u64> {
        self.height.checked_add(1)
    }

    /// Whether this block directly follows `prev` in height and hash.
    pub fn links_to(&self, prev: &BlockInfo) -> bool {
        prev.next_height() == Some(self.height) && self.prev_hash == prev.hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let at = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let info = BlockInfo::new(1, "H1", "", "mychain1m1", 0, at);
        assert_eq!(info.reward, Coins::native(100));
        assert_eq!(info.gas_limit, DEFAULT_GAS_LIMIT);
        assert_eq!(info.gas_used, 0);
        assert_eq!(info.size, 0);
        assert!(info.total_fees.is_zero());
    }

    #[test]
    fn test_links_to() {
        let at = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let first = BlockInfo::new(1, "H1", "", "m", 0, at);
        let second = BlockInfo::new(2, "H2", "H1", "m", 0, at);
        let forked = BlockInfo::new(2, "H2", "HX", "m", 0, at);
        let skipped = BlockInfo::new(3, "H3", "H1", "m", 0, at);
        assert!(second.links_to(&first));
        assert!(!forked.links_to(&first));
        assert!(!skipped.links_to(&first));
    }

    #[test]
    fn test_last_height_has_no_successor() {
        let at = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let last = BlockInfo::new(u64::MAX, "HMAX", "HPREV", "m", 0, at);
        let wrapped = BlockInfo::new(0, "H0", "HMAX", "m", 0, at);
        assert_eq!(last.next_height(), None);
        assert!(!wrapped.links_to(&last));
    }
}
