//! Lifecycle hooks invoked by the host
//!
//! Every hook stages its writes in a [`StoreBatch`] and commits only once all
//! of its checks have passed, so a failing hook leaves the store untouched.
//! Ledger calls come last; a host that needs the ledger rolled back as well
//! snapshots it before the call.

use crate::bank::{Permission, TransferLedger};
use crate::coins::Coins;
use crate::error::ChainError;
use crate::genesis::GenesisState;
use crate::keeper::Keeper;
use crate::keys::MODULE_NAME;
use crate::params::Params;
use crate::persistence::{KvStore, StoreBatch};
use crate::records::BlockInfo;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

/// Height of the first block when the host does not configure one.
pub const DEFAULT_INITIAL_HEIGHT: u64 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitGenesisResult {
    pub params: Params,
    pub users: usize,
    pub miners: usize,
    pub transactions: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeginBlockRequest {
    pub height: u64,
    pub time: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeginBlockResult {
    pub height: u64,
    /// Active miners that may produce this block.
    pub eligible_miners: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndBlockRequest {
    pub height: u64,
    pub hash: String,
    pub prev_hash: String,
    pub time: DateTime<Utc>,
    pub proposer: Option<String>,
    pub tx_count: u64,
    pub total_fees: Coins,
    pub size: u64,
    pub gas_used: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoRewardReason {
    NoProposer,
    UnknownMiner,
    InactiveMiner,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewardOutcome {
    Rewarded { miner: String, reward: Coins },
    NoReward(NoRewardReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndBlockResult {
    pub block: BlockInfo,
    pub reward: RewardOutcome,
}

#[derive(Debug, Clone, Copy)]
pub struct LedgerModule {
    initial_height: u64,
}

impl Default for LedgerModule {
    fn default() -> Self {
        LedgerModule::new(DEFAULT_INITIAL_HEIGHT)
    }
}

impl LedgerModule {
    pub fn new(initial_height: u64) -> Self {
        LedgerModule { initial_height }
    }

    pub fn initial_height(&self) -> u64 {
        self.initial_height
    }

    /// Height the next block must carry.
    pub fn expected_height(&self, store: &dyn KvStore) -> Result<u64, ChainError> {
        let latest = Keeper::new(store).latest_block_info()?;
        self.height_after(latest.as_ref())
    }

    fn height_after(&self, latest: Option<&BlockInfo>) -> Result<u64, ChainError> {
        match latest {
            None => Ok(self.initial_height),
            Some(block) => block
                .next_height()
                .ok_or_else(|| ChainError::InvalidState(format!("no height follows {}", block.height))),
        }
    }

    /// Parses, validates and applies a genesis document.
    pub fn init_genesis(
        &self,
        store: &mut dyn KvStore,
        ledger: &mut dyn TransferLedger,
        raw: &[u8],
    ) -> Result<InitGenesisResult, ChainError> {
        if !ledger.has_permission(MODULE_NAME, Permission::Minter) {
            return Err(ChainError::Unauthorized(format!(
                "module account {} cannot mint genesis balances",
                MODULE_NAME
            )));
        }
        let genesis = GenesisState::from_json(raw)?;
        genesis.validate()?;

        let mut batch = StoreBatch::new(store);
        let mut keeper = Keeper::new(&mut batch);
        if keeper.is_initialized()? {
            return Err(ChainError::AlreadyInitialized);
        }

        keeper.set_params(&genesis.params)?;
        keeper.set_token_supply(&genesis.token_supply)?;
        for user in &genesis.users {
            keeper.set_user(&user.clone().with_balance(Coins::empty()))?;
        }
        for miner in &genesis.miners {
            keeper.set_miner(miner)?;
        }
        for tx in &genesis.transactions {
            keeper.set_transaction(tx)?;
        }
        for user in genesis.users.iter().filter(|u| !u.balance.is_zero()) {
            ledger.mint(MODULE_NAME, &user.address, &user.balance)?;
        }
        let writes = batch.commit()?;

        info!(
            users = genesis.users.len(),
            miners = genesis.miners.len(),
            transactions = genesis.transactions.len(),
            writes,
            "genesis applied"
        );
        Ok(InitGenesisResult {
            params: genesis.params,
            users: genesis.users.len(),
            miners: genesis.miners.len(),
            transactions: genesis.transactions.len(),
        })
    }

    /// Checks the module is ready for `req.height`. Makes no writes.
    pub fn begin_block(&self, store: &dyn KvStore, req: BeginBlockRequest) -> Result<BeginBlockResult, ChainError> {
        let keeper = Keeper::new(store);
        if !keeper.is_initialized()? {
            return Err(ChainError::NotInitialized);
        }
        let expected = self.expected_height(store)?;
        if req.height != expected {
            return Err(ChainError::InvalidBlockHeight {
                expected,
                actual: req.height,
            });
        }
        let eligible_miners = keeper.active_miner_count()?;
        if eligible_miners == 0 {
            warn!(height = req.height, "no active miners, block reward will not be issued");
        }
        debug!(height = req.height, eligible_miners, "begin block");
        Ok(BeginBlockResult {
            height: req.height,
            eligible_miners,
        })
    }

    /// Issues the block reward and records the block.
    ///
    /// The reward is `Params::mining_reward`. Exceeding the supply cap fails
    /// the whole block.
    pub fn end_block(
        &self,
        store: &mut dyn KvStore,
        ledger: &mut dyn TransferLedger,
        req: EndBlockRequest,
    ) -> Result<EndBlockResult, ChainError> {
        let mut batch = StoreBatch::new(store);
        let mut keeper = Keeper::new(&mut batch);
        let params = keeper.params()?;

        let latest = keeper.latest_block_info()?;
        let expected = self.height_after(latest.as_ref())?;
        if req.height != expected {
            return Err(ChainError::InvalidBlockHeight {
                expected,
                actual: req.height,
            });
        }
        let block = BlockInfo::new(
            req.height,
            req.hash,
            req.prev_hash,
            req.proposer.clone().unwrap_or_default(),
            req.tx_count,
            req.time,
        )
        .with_fees(req.total_fees)
        .with_size(req.size)
        .with_gas_used(req.gas_used);
        if let Some(prev) = &latest {
            if !block.links_to(prev) {
                return Err(ChainError::InvalidBlockLinkage(format!(
                    "block {} points at {}, but block {} is {}",
                    block.height, block.prev_hash, prev.height, prev.hash
                )));
            }
        }

        let reward = match &req.proposer {
            None => RewardOutcome::NoReward(NoRewardReason::NoProposer),
            Some(address) => match keeper.miner(address) {
                Ok(miner) if miner.is_active() => RewardOutcome::Rewarded {
                    miner: address.clone(),
                    reward: params.mining_reward.clone(),
                },
                Ok(_) => RewardOutcome::NoReward(NoRewardReason::InactiveMiner),
                Err(ChainError::MinerNotFound(_)) => RewardOutcome::NoReward(NoRewardReason::UnknownMiner),
                Err(e) => return Err(e),
            },
        };

        let issued = match &reward {
            RewardOutcome::Rewarded { miner, reward } => {
                keeper.mint(reward, req.time)?;
                let mut record = keeper.miner(miner)?;
                record.record_block(reward, req.time);
                keeper.set_miner(&record)?;
                reward.clone()
            }
            RewardOutcome::NoReward(reason) => {
                warn!(height = req.height, ?reason, "block reward not issued");
                Coins::empty()
            }
        };

        let block = block.with_reward(issued);
        keeper.insert_block_info(&block)?;

        if let RewardOutcome::Rewarded { miner, reward } = &reward {
            ledger.mint(MODULE_NAME, miner, reward)?;
        }
        batch.commit()?;

        info!(
            height = block.height,
            hash = %block.hash,
            miner = %block.miner,
            reward = %block.reward,
            txs = block.tx_count,
            "block recorded"
        );
        Ok(EndBlockResult { block, reward })
    }
}
