//! Typed access to the module's records
//!
//! The keeper maps records to keys and bytes and enforces the per-record
//! rules (uniqueness, commission bounds, validator cap, supply cap). It
//! borrows the store for the duration of one operation and keeps no state
//! of its own, so nothing survives between hook calls.

use crate::bank::TransferLedger;
use crate::coins::Coins;
use crate::error::ChainError;
use crate::genesis::GenesisState;
use crate::keys::{
    block_info_key, miner_key, prefix_end, transaction_key, user_key, BLOCK_INFO_KEY_PREFIX,
    MINER_KEY_PREFIX, PARAMS_KEY, TOKEN_SUPPLY_KEY, TRANSACTION_KEY_PREFIX, USER_KEY_PREFIX,
};
use crate::params::{Params, Rate};
use crate::persistence::{decode, encode, KvRead, KvStore};
use crate::records::{BlockInfo, Miner, MinerStatus, TokenSupply, Transaction, User};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

pub struct Keeper<S> {
    store: S,
}

impl<S: KvRead> Keeper<S> {
    pub fn new(store: S) -> Self {
        Keeper { store }
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    fn read<T: DeserializeOwned>(&self, key: &[u8]) -> Result<Option<T>, ChainError> {
        self.store.get(key)?.map(|bytes| decode(&bytes)).transpose()
    }

    fn read_prefix<T: DeserializeOwned>(&self, prefix: &[u8]) -> Result<Vec<T>, ChainError> {
        self.store
            .prefix_iter(prefix)?
            .into_iter()
            .map(|(_, bytes)| decode(&bytes))
            .collect()
    }

    /// Genesis has run once params are present.
    pub fn is_initialized(&self) -> Result<bool, ChainError> {
        self.store.has(PARAMS_KEY)
    }

    pub fn params(&self) -> Result<Params, ChainError> {
        self.read(PARAMS_KEY)?.ok_or(ChainError::NotInitialized)
    }

    pub fn token_supply(&self) -> Result<TokenSupply, ChainError> {
        self.read(TOKEN_SUPPLY_KEY)?.ok_or(ChainError::NotInitialized)
    }

    pub fn has_user(&self, address: &str) -> Result<bool, ChainError> {
        self.store.has(&user_key(address))
    }

    pub fn user(&self, address: &str) -> Result<User, ChainError> {
        self.read(&user_key(address))?
            .ok_or_else(|| ChainError::UserNotFound(address.to_string()))
    }

    pub fn users(&self) -> Result<Vec<User>, ChainError> {
        self.read_prefix(USER_KEY_PREFIX)
    }

    pub fn transaction(&self, hash: &str) -> Result<Transaction, ChainError> {
        self.read(&transaction_key(hash))?
            .ok_or_else(|| ChainError::TransactionNotFound(hash.to_string()))
    }

    pub fn transactions(&self) -> Result<Vec<Transaction>, ChainError> {
        self.read_prefix(TRANSACTION_KEY_PREFIX)
    }

    pub fn has_miner(&self, address: &str) -> Result<bool, ChainError> {
        self.store.has(&miner_key(address))
    }

    pub fn miner(&self, address: &str) -> Result<Miner, ChainError> {
        self.read(&miner_key(address))?
            .ok_or_else(|| ChainError::MinerNotFound(address.to_string()))
    }

    pub fn miners(&self) -> Result<Vec<Miner>, ChainError> {
        self.read_prefix(MINER_KEY_PREFIX)
    }

    pub fn active_miner_count(&self) -> Result<usize, ChainError> {
        Ok(self.miners()?.iter().filter(|m| m.is_active()).count())
    }

    pub fn block_info(&self, height: u64) -> Result<BlockInfo, ChainError> {
        self.read(&block_info_key(height))?
            .ok_or(ChainError::BlockInfoNotFound(height))
    }

    /// Block info with the greatest height, if any block has been committed.
    pub fn latest_block_info(&self) -> Result<Option<BlockInfo>, ChainError> {
        let end = prefix_end(BLOCK_INFO_KEY_PREFIX);
        self.store
            .last_in_range(BLOCK_INFO_KEY_PREFIX, end.as_deref())?
            .map(|(_, bytes)| decode(&bytes))
            .transpose()
    }

    /// All block info from `height` upwards, in height order.
    pub fn blocks_since(&self, height: u64) -> Result<Vec<BlockInfo>, ChainError> {
        let end = prefix_end(BLOCK_INFO_KEY_PREFIX);
        self.store
            .range(&block_info_key(height), end.as_deref())?
            .into_iter()
            .map(|(_, bytes)| decode(&bytes))
            .collect()
    }

    /// User record with its balance taken from the ledger.
    pub fn user_with_balance(
        &self,
        address: &str,
        ledger: &dyn TransferLedger,
    ) -> Result<User, ChainError> {
        Ok(self.user(address)?.with_balance(ledger.balance(address)))
    }

    /// Rebuilds a genesis bundle from the current state, with user balances
    /// taken from the ledger.
    pub fn export_genesis(&self, ledger: &dyn TransferLedger) -> Result<GenesisState, ChainError> {
        let users = self
            .users()?
            .into_iter()
            .map(|user| {
                let balance = ledger.balance(&user.address);
                user.with_balance(balance)
            })
            .collect();
        Ok(GenesisState {
            params: self.params()?,
            users,
            miners: self.miners()?,
            transactions: self.transactions()?,
            token_supply: self.token_supply()?,
        })
    }
}

impl<S: KvStore> Keeper<S> {
    fn write<T: Serialize>(&mut self, key: &[u8], value: &T) -> Result<(), ChainError> {
        let bytes = encode(value)?;
        self.store.set(key, &bytes)
    }

    fn insert_new<T: Serialize>(&mut self, key: &[u8], value: &T) -> Result<(), ChainError> {
        if self.store.has(key)? {
            return Err(ChainError::DuplicateRecord(hex::encode(key)));
        }
        self.write(key, value)
    }

    /// Stores params after validating them. The supply cap follows `max_supply`.
    pub fn set_params(&mut self, params: &Params) -> Result<(), ChainError> {
        params.validate()?;
        self.write(PARAMS_KEY, params)
    }

    /// Governed parameter update. The new cap may not fall below the
    /// supply already minted.
    pub fn update_params(&mut self, params: &Params) -> Result<(), ChainError> {
        params.validate()?;
        let mut supply = self.token_supply()?;
        if !supply.total_supply.is_all_lte(&params.max_supply) {
            return Err(ChainError::InvalidParams(format!(
                "max supply {} is below current total supply {}",
                params.max_supply, supply.total_supply
            )));
        }
        supply.max_supply = params.max_supply.clone();
        self.set_token_supply(&supply)?;
        self.set_params(params)
    }

    pub fn set_token_supply(&mut self, supply: &TokenSupply) -> Result<(), ChainError> {
        self.write(TOKEN_SUPPLY_KEY, supply)
    }

    /// Mints into the supply record, enforcing the cap. The record is left
    /// unchanged on failure.
    pub fn mint(&mut self, amount: &Coins, at: DateTime<Utc>) -> Result<TokenSupply, ChainError> {
        let mut supply = self.token_supply()?;
        supply.mint(amount, at)?;
        self.set_token_supply(&supply)?;
        Ok(supply)
    }

    pub fn burn(&mut self, amount: &Coins) -> Result<TokenSupply, ChainError> {
        let mut supply = self.token_supply()?;
        supply.burn(amount)?;
        self.set_token_supply(&supply)?;
        Ok(supply)
    }

    pub fn set_user(&mut self, user: &User) -> Result<(), ChainError> {
        self.write(&user_key(&user.address), user)
    }

    pub fn create_user(
        &mut self,
        address: &str,
        name: &str,
        email: &str,
        at: DateTime<Utc>,
    ) -> Result<User, ChainError> {
        if address.is_empty() {
            return Err(ChainError::InvalidTransaction("user address is empty".to_string()));
        }
        let user = User::new(address, name, email, at);
        self.insert_new(&user_key(address), &user)?;
        Ok(user)
    }

    pub fn set_transaction(&mut self, tx: &Transaction) -> Result<(), ChainError> {
        self.write(&transaction_key(&tx.hash), tx)
    }

    pub fn record_transaction(&mut self, tx: &Transaction) -> Result<(), ChainError> {
        tx.validate()?;
        self.insert_new(&transaction_key(&tx.hash), tx)
    }

    pub fn set_miner(&mut self, miner: &Miner) -> Result<(), ChainError> {
        self.write(&miner_key(&miner.address), miner)
    }

    /// Registers a new active miner within the commission bounds and the
    /// validator cap.
    pub fn register_miner(
        &mut self,
        address: &str,
        description: &str,
        commission: Rate,
        at: DateTime<Utc>,
    ) -> Result<Miner, ChainError> {
        if address.is_empty() {
            return Err(ChainError::InvalidTransaction("miner address is empty".to_string()));
        }
        let params = self.params()?;
        params.validate_commission(commission)?;
        if self.has_miner(address)? {
            return Err(ChainError::DuplicateRecord(hex::encode(miner_key(address))));
        }
        self.ensure_validator_slot(&params)?;

        let miner = Miner::new(address, description, commission, at);
        self.set_miner(&miner)?;
        Ok(miner)
    }

    pub fn set_miner_status(&mut self, address: &str, status: MinerStatus) -> Result<Miner, ChainError> {
        let mut miner = self.miner(address)?;
        if miner.status == status {
            return Ok(miner);
        }
        if status == MinerStatus::Active {
            let params = self.params()?;
            self.ensure_validator_slot(&params)?;
        }
        miner.status = status;
        self.set_miner(&miner)?;
        Ok(miner)
    }

    fn ensure_validator_slot(&self, params: &Params) -> Result<(), ChainError> {
        let active = self.active_miner_count()?;
        if active >= params.max_validators as usize {
            return Err(ChainError::InvalidTransaction(format!(
                "validator set is full ({} active, max {})",
                active, params.max_validators
            )));
        }
        Ok(())
    }

    /// Writes a block's info once; a second write for the same height fails.
    pub fn insert_block_info(&mut self, info: &BlockInfo) -> Result<(), ChainError> {
        self.insert_new(&block_info_key(info.height), info)
    }
}
