//! Application wiring: one store, one ledger, one module
//!
//! The app drives a block through `begin_block`, any number of `deliver_tx`
//! calls, `end_block` and `commit`. Writes of the block in progress are kept
//! in memory and reach the store only on `commit`, together with the ledger
//! balances, in a single write.

use crate::bank::{MemoryLedger, ModuleAccountPermissions, TransferLedger};
use crate::coins::Coins;
use crate::config::Config;
use crate::error::ChainError;
use crate::genesis::GenesisState;
use crate::keeper::Keeper;
use crate::module::{
    BeginBlockRequest, BeginBlockResult, EndBlockRequest, EndBlockResult, InitGenesisResult, LedgerModule,
    DEFAULT_INITIAL_HEIGHT,
};
use crate::msgs::{handle_msg, Msg, TxContext};
use crate::params::Params;
use crate::persistence::{KvStore, StoreBatch, WriteOp};
use crate::records::{BlockInfo, Miner, TokenSupply, Transaction, User};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub chain_id: String,
    pub initial_height: u64,
    /// Address allowed to send the governed messages.
    pub authority: String,
    pub module_accounts: ModuleAccountPermissions,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            chain_id: "mychain".to_string(),
            initial_height: DEFAULT_INITIAL_HEIGHT,
            authority: String::new(),
            module_accounts: ModuleAccountPermissions::default(),
        }
    }
}

impl From<&Config> for AppConfig {
    fn from(config: &Config) -> Self {
        AppConfig {
            chain_id: config.chain.chain_id.clone(),
            initial_height: config.chain.initial_height,
            authority: config.governance.authority.clone(),
            module_accounts: config.module_accounts.clone(),
        }
    }
}

/// Outcome of one delivered message. `code == 0` means success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxResult {
    pub code: u32,
    pub log: String,
    pub hash: String,
}

impl TxResult {
    pub fn is_ok(&self) -> bool {
        self.code == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub height: u64,
    pub hash: String,
    pub writes: usize,
}

struct BlockInProgress {
    height: u64,
    time: DateTime<Utc>,
    proposer: Option<String>,
    tx_hashes: Vec<String>,
    total_fees: Coins,
    size: u64,
    ledger_before: MemoryLedger,
}

struct EndedBlock {
    info: BlockInfo,
    ledger_before: MemoryLedger,
}

enum Phase {
    Idle,
    InBlock(BlockInProgress),
    Ended(EndedBlock),
}

pub struct App {
    config: AppConfig,
    module: LedgerModule,
    store: Box<dyn KvStore>,
    ledger: MemoryLedger,
    block_writes: Vec<WriteOp>,
    phase: Phase,
}

impl App {
    /// Builds an app over `store`, loading any ledger balances it already holds.
    pub fn new(config: AppConfig, store: Box<dyn KvStore>) -> Result<Self, ChainError> {
        let ledger = MemoryLedger::load(config.module_accounts.clone(), store.as_ref())?;
        Ok(App {
            module: LedgerModule::new(config.initial_height),
            ledger,
            config,
            store,
            block_writes: Vec::new(),
            phase: Phase::Idle,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn init_chain(&mut self, genesis_json: &[u8]) -> Result<InitGenesisResult, ChainError> {
        if !matches!(self.phase, Phase::Idle) {
            return Err(ChainError::InvalidState("cannot run genesis inside a block".to_string()));
        }
        let snapshot = self.ledger.clone();
        match self.apply_genesis(genesis_json) {
            Ok(result) => {
                info!(chain_id = %self.config.chain_id, "chain initialized");
                Ok(result)
            }
            Err(e) => {
                self.ledger = snapshot;
                warn!(error = %e, "genesis rejected");
                Err(e)
            }
        }
    }

    /// Genesis records and the balances it mints reach the store in one write.
    fn apply_genesis(&mut self, genesis_json: &[u8]) -> Result<InitGenesisResult, ChainError> {
        let mut batch = StoreBatch::new(self.store.as_mut());
        let result = self.module.init_genesis(&mut batch, &mut self.ledger, genesis_json)?;
        self.ledger.persist(&mut batch)?;
        batch.commit()?;
        Ok(result)
    }

    /// Height the next block must carry.
    pub fn next_height(&self) -> Result<u64, ChainError> {
        self.module.expected_height(self.store.as_ref())
    }

    pub fn begin_block(
        &mut self,
        time: DateTime<Utc>,
        proposer: Option<String>,
    ) -> Result<BeginBlockResult, ChainError> {
        if !matches!(self.phase, Phase::Idle) {
            return Err(ChainError::InvalidState("previous block not committed".to_string()));
        }
        let height = self.next_height()?;
        let result = self
            .module
            .begin_block(self.store.as_ref(), BeginBlockRequest { height, time })?;
        self.phase = Phase::InBlock(BlockInProgress {
            height,
            time,
            proposer,
            tx_hashes: Vec::new(),
            total_fees: Coins::empty(),
            size: 0,
            ledger_before: self.ledger.clone(),
        });
        Ok(result)
    }

    /// Runs one message. Per-message failures come back as a non-zero
    /// [`TxResult`]; storage failures are returned as errors.
    pub fn deliver_tx(&mut self, msg: &Msg) -> Result<TxResult, ChainError> {
        let block = match &mut self.phase {
            Phase::InBlock(block) => block,
            _ => return Err(ChainError::InvalidState("no block in progress".to_string())),
        };
        let index = block.tx_hashes.len() as u32;
        let hash = msg.hash(block.height, index)?;
        block.tx_hashes.push(hash.clone());

        let size = match msg.validate_size() {
            Ok(size) => size,
            Err(e) => return Ok(failed(hash, e)),
        };
        block.size += size as u64;

        let ctx = TxContext {
            height: block.height,
            time: block.time,
            hash: hash.clone(),
            authority: self.config.authority.clone(),
        };
        let mut block_batch = StoreBatch::resume(self.store.as_mut(), std::mem::take(&mut self.block_writes));
        let outcome = {
            let mut tx_batch = StoreBatch::new(&mut block_batch);
            match handle_msg(&mut tx_batch, &mut self.ledger, &ctx, msg) {
                Ok(outcome) => tx_batch.commit().map(|_| Ok(outcome)),
                Err(e) if is_storage_error(&e) => Err(e),
                Err(e) => Ok(Err(e)),
            }
        };
        self.block_writes = block_batch.into_pending();

        match outcome? {
            Ok(outcome) => {
                block.total_fees = block.total_fees.add(&outcome.fee);
                debug!(hash = %hash, msg = msg.type_name(), "tx delivered");
                Ok(TxResult {
                    code: 0,
                    log: outcome.log,
                    hash,
                })
            }
            Err(e) => {
                debug!(hash = %hash, msg = msg.type_name(), error = %e, "tx failed");
                Ok(failed(hash, e))
            }
        }
    }

    /// Issues the block reward and records the block. On failure every
    /// write of the block is discarded and the ledger is restored.
    pub fn end_block(&mut self) -> Result<EndBlockResult, ChainError> {
        let block = match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::InBlock(block) => block,
            other => {
                self.phase = other;
                return Err(ChainError::InvalidState("no block in progress".to_string()));
            }
        };

        let mut block_batch = StoreBatch::resume(self.store.as_mut(), std::mem::take(&mut self.block_writes));
        let latest = Keeper::new(&block_batch).latest_block_info();
        let prev_hash = match latest {
            Ok(latest) => latest.map(|b| b.hash).unwrap_or_default(),
            Err(e) => {
                drop(block_batch);
                self.ledger = block.ledger_before;
                return Err(e);
            }
        };
        let req = EndBlockRequest {
            height: block.height,
            hash: block_hash(block.height, &prev_hash, block.time, &block.tx_hashes),
            prev_hash,
            time: block.time,
            proposer: block.proposer,
            tx_count: block.tx_hashes.len() as u64,
            total_fees: block.total_fees,
            size: block.size,
            gas_used: 0,
        };

        match self.module.end_block(&mut block_batch, &mut self.ledger, req) {
            Ok(result) => {
                self.block_writes = block_batch.into_pending();
                self.phase = Phase::Ended(EndedBlock {
                    info: result.block.clone(),
                    ledger_before: block.ledger_before,
                });
                Ok(result)
            }
            Err(e) => {
                drop(block_batch);
                self.ledger = block.ledger_before;
                warn!(height = block.height, error = %e, "block aborted");
                Err(e)
            }
        }
    }

    /// Writes the ended block and the ledger balances to the store in one
    /// write. On failure nothing is written, the ledger is restored and the
    /// block can be produced again.
    pub fn commit(&mut self) -> Result<CommitInfo, ChainError> {
        let ended = match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Ended(ended) => ended,
            other => {
                self.phase = other;
                return Err(ChainError::InvalidState("no ended block to commit".to_string()));
            }
        };
        let mut batch = StoreBatch::resume(self.store.as_mut(), std::mem::take(&mut self.block_writes));
        let written = match self.ledger.persist(&mut batch) {
            Ok(()) => batch.commit(),
            Err(e) => Err(e),
        };
        let writes = match written {
            Ok(writes) => writes,
            Err(e) => {
                self.ledger = ended.ledger_before;
                warn!(height = ended.info.height, error = %e, "block commit failed");
                return Err(e);
            }
        };
        let block = ended.info;
        info!(height = block.height, hash = %block.hash, writes, "block committed");
        Ok(CommitInfo {
            height: block.height,
            hash: block.hash,
            writes,
        })
    }

    fn keeper(&self) -> Keeper<&dyn KvStore> {
        Keeper::new(self.store.as_ref())
    }

    pub fn ledger(&self) -> &MemoryLedger {
        &self.ledger
    }

    pub fn balance(&self, address: &str) -> Coins {
        self.ledger.balance(address)
    }

    pub fn params(&self) -> Result<Params, ChainError> {
        self.keeper().params()
    }

    pub fn token_supply(&self) -> Result<TokenSupply, ChainError> {
        self.keeper().token_supply()
    }

    pub fn user(&self, address: &str) -> Result<User, ChainError> {
        self.keeper().user_with_balance(address, &self.ledger)
    }

    pub fn miner(&self, address: &str) -> Result<Miner, ChainError> {
        self.keeper().miner(address)
    }

    pub fn miners(&self) -> Result<Vec<Miner>, ChainError> {
        self.keeper().miners()
    }

    pub fn transaction(&self, hash: &str) -> Result<Transaction, ChainError> {
        self.keeper().transaction(hash)
    }

    pub fn block_info(&self, height: u64) -> Result<BlockInfo, ChainError> {
        self.keeper().block_info(height)
    }

    pub fn latest_block_info(&self) -> Result<Option<BlockInfo>, ChainError> {
        self.keeper().latest_block_info()
    }

    pub fn export_genesis(&self) -> Result<GenesisState, ChainError> {
        self.keeper().export_genesis(&self.ledger)
    }
}

fn failed(hash: String, e: ChainError) -> TxResult {
    TxResult {
        code: e.code(),
        log: e.to_string(),
        hash,
    }
}

fn is_storage_error(e: &ChainError) -> bool {
    matches!(
        e,
        ChainError::DatabaseError(_) | ChainError::IoError(_) | ChainError::BincodeError(_)
    )
}

/// Upper-case hex SHA-256 over the block header fields and its tx hashes.
pub fn block_hash(height: u64, prev_hash: &str, time: DateTime<Utc>, tx_hashes: &[String]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(height.to_be_bytes());
    hasher.update(prev_hash.as_bytes());
    hasher.update(time.timestamp().to_be_bytes());
    for hash in tx_hashes {
        hasher.update(hash.as_bytes());
    }
    hex::encode_upper(hasher.finalize())
}
