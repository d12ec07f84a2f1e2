//! Genesis bundle used to bootstrap the module at height zero

use crate::coins::Coins;
use crate::error::ChainError;
use crate::params::Params;
use crate::records::{Miner, TokenSupply, Transaction, User};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Fixed genesis time used by [`GenesisState::default`]: 2023-01-01T00:00:00Z.
pub const DEFAULT_GENESIS_TIME: i64 = 1_672_531_200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisState {
    pub params: Params,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub miners: Vec<Miner>,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    pub token_supply: TokenSupply,
}

impl Default for GenesisState {
    fn default() -> Self {
        let params = Params::default();
        let genesis_time = DateTime::<Utc>::from_timestamp(DEFAULT_GENESIS_TIME, 0).unwrap_or_default();
        GenesisState {
            token_supply: TokenSupply::new(params.max_supply.clone(), genesis_time),
            params,
            users: Vec::new(),
            miners: Vec::new(),
            transactions: Vec::new(),
        }
    }
}

impl GenesisState {
    pub fn from_json(raw: &[u8]) -> Result<Self, ChainError> {
        serde_json::from_slice(raw).map_err(|e| ChainError::InvalidGenesis(format!("malformed genesis: {}", e)))
    }

    pub fn to_json(&self) -> Result<String, ChainError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Validates the params first, then the records bundled with them.
    ///
    /// Record addresses referenced by transactions and miners need not exist
    /// as users; the host may create them lazily.
    pub fn validate(&self) -> Result<(), ChainError> {
        self.params.validate()?;

        let mut addresses = HashSet::new();
        let mut balances = Coins::empty();
        for user in &self.users {
            if user.address.is_empty() {
                return Err(ChainError::InvalidGenesis("user with empty address".to_string()));
            }
            if !addresses.insert(user.address.as_str()) {
                return Err(ChainError::InvalidGenesis(format!("duplicate user {}", user.address)));
            }
            user.balance.validate().map_err(|e| {
                ChainError::InvalidGenesis(format!("invalid balance for {}: {}", user.address, e))
            })?;
            balances = balances.add(&user.balance);
        }

        let mut miners = HashSet::new();
        for miner in &self.miners {
            if miner.address.is_empty() {
                return Err(ChainError::InvalidGenesis("miner with empty address".to_string()));
            }
            if !miners.insert(miner.address.as_str()) {
                return Err(ChainError::InvalidGenesis(format!("duplicate miner {}", miner.address)));
            }
            self.params
                .validate_commission(miner.commission)
                .map_err(|e| ChainError::InvalidGenesis(format!("miner {}: {}", miner.address, e)))?;
            miner.total_rewards.validate().map_err(|e| {
                ChainError::InvalidGenesis(format!("invalid rewards for miner {}: {}", miner.address, e))
            })?;
        }
        let active = self.miners.iter().filter(|m| m.is_active()).count();
        if active > self.params.max_validators as usize {
            return Err(ChainError::InvalidGenesis(format!(
                "{} active miners exceed max validators {}",
                active, self.params.max_validators
            )));
        }

        let mut hashes = HashSet::new();
        for tx in &self.transactions {
            tx.validate().map_err(|e| ChainError::InvalidGenesis(e.to_string()))?;
            if !hashes.insert(tx.hash.as_str()) {
                return Err(ChainError::InvalidGenesis(format!("duplicate transaction {}", tx.hash)));
            }
        }

        self.token_supply.validate()?;
        if self.token_supply.max_supply != self.params.max_supply {
            return Err(ChainError::InvalidGenesis(format!(
                "token supply cap {} does not match params max supply {}",
                self.token_supply.max_supply, self.params.max_supply
            )));
        }
        if !balances.is_all_lte(&self.token_supply.total_supply) {
            return Err(ChainError::InvalidGenesis(format!(
                "user balances {} exceed total supply {}",
                balances, self.token_supply.total_supply
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Rate;

    fn at() -> DateTime<Utc> {
        DateTime::from_timestamp(DEFAULT_GENESIS_TIME, 0).unwrap()
    }

    #[test]
    fn test_default_genesis_is_valid() {
        let genesis = GenesisState::default();
        assert!(genesis.validate().is_ok());
        assert_eq!(genesis.token_supply.max_supply, genesis.params.max_supply);
    }

    #[test]
    fn test_invalid_params_fail_first() {
        let mut genesis = GenesisState::default();
        genesis.params.min_commission = Rate::lit("0.3");
        genesis.params.max_commission = Rate::lit("0.2");
        genesis.users.push(User::new("", "", "", at()));
        let err = genesis.validate().unwrap_err();
        assert!(matches!(err, ChainError::InvalidParams(_)));
    }

    #[test]
    fn test_duplicate_records_rejected() {
        let mut genesis = GenesisState::default();
        genesis.users.push(User::new("mychain1a", "A", "", at()));
        genesis.users.push(User::new("mychain1a", "A again", "", at()));
        assert!(genesis.validate().unwrap_err().to_string().contains("duplicate user"));

        let mut genesis = GenesisState::default();
        genesis.miners.push(Miner::new("mychain1m", "", Rate::lit("0.1"), at()));
        genesis.miners.push(Miner::new("mychain1m", "", Rate::lit("0.1"), at()));
        assert!(genesis.validate().unwrap_err().to_string().contains("duplicate miner"));

        let mut genesis = GenesisState::default();
        let tx = Transaction::new("H", "a", "b", Coins::native(1), Coins::empty(), 0, at());
        genesis.transactions.push(tx.clone());
        genesis.transactions.push(tx);
        assert!(genesis.validate().unwrap_err().to_string().contains("duplicate transaction"));
    }

    #[test]
    fn test_miner_commission_out_of_bounds() {
        let mut genesis = GenesisState::default();
        genesis.miners.push(Miner::new("mychain1m", "", Rate::lit("0.5"), at()));
        assert!(genesis.validate().is_err());
    }

    #[test]
    fn test_miner_rewards_must_be_well_formed() {
        let mut genesis = GenesisState::default();
        let mut miner = Miner::new("mychain1m", "", Rate::lit("0.1"), at());
        miner.total_rewards =
            serde_json::from_str(r#"[{"denom":"zzz","amount":0},{"denom":"mychain","amount":0}]"#).unwrap();
        genesis.miners.push(miner);
        let err = genesis.validate().unwrap_err();
        assert!(matches!(err, ChainError::InvalidGenesis(_)));
        assert!(err.to_string().contains("invalid rewards for miner mychain1m"));
    }

    #[test]
    fn test_balances_must_fit_total_supply() {
        let mut genesis = GenesisState::default();
        genesis.users.push(User::new("mychain1a", "A", "", at()).with_balance(Coins::native(10)));
        assert!(genesis.validate().is_err());

        genesis.token_supply.total_supply = Coins::native(10);
        genesis.token_supply.circulating_supply = Coins::native(10);
        assert!(genesis.validate().is_ok());
    }

    #[test]
    fn test_supply_cap_must_match_params() {
        let mut genesis = GenesisState::default();
        genesis.token_supply.max_supply = Coins::native(5);
        assert!(genesis.validate().unwrap_err().to_string().contains("does not match"));
    }

    #[test]
    fn test_json_round_trip_keeps_field_names() {
        let genesis = GenesisState::default();
        let json = genesis.to_json().unwrap();
        assert!(json.contains("\"token_supply\""));
        assert!(json.contains("\"mining_reward\""));
        assert_eq!(GenesisState::from_json(json.as_bytes()).unwrap(), genesis);
    }

    #[test]
    fn test_missing_lists_default_to_empty() {
        let mut value = serde_json::to_value(GenesisState::default()).unwrap();
        let obj = value.as_object_mut().unwrap();
        obj.remove("users");
        obj.remove("miners");
        obj.remove("transactions");
        let parsed = GenesisState::from_json(value.to_string().as_bytes()).unwrap();
        assert!(parsed.users.is_empty());
    }
}
