//! Economic parameters of the module

use crate::coins::Coins;
use crate::error::ChainError;
use crate::records::{DEFAULT_BLOCK_REWARD, DEFAULT_MAX_SUPPLY};
use fixed::types::I32F32;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed-point fraction used for commission rates. Deterministic across
/// platforms, unlike floats; serialized as a decimal string in JSON.
pub type Rate = I32F32;

pub const DEFAULT_TRANSACTION_FEE: u128 = 1;
pub const DEFAULT_MIN_COMMISSION: Rate = Rate::ZERO;
pub const DEFAULT_MAX_COMMISSION: Rate = Rate::lit("0.20");
/// Seconds between blocks.
pub const DEFAULT_BLOCK_TIME: u64 = 6;
pub const DEFAULT_MAX_VALIDATORS: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Params {
    pub max_supply: Coins,
    pub mining_reward: Coins,
    pub transaction_fee: Coins,
    pub min_commission: Rate,
    pub max_commission: Rate,
    pub block_time: u64,
    pub max_validators: u32,
}

impl Default for Params {
    fn default() -> Self {
        Params {
            max_supply: Coins::native(DEFAULT_MAX_SUPPLY),
            mining_reward: Coins::native(DEFAULT_BLOCK_REWARD),
            transaction_fee: Coins::native(DEFAULT_TRANSACTION_FEE),
            min_commission: DEFAULT_MIN_COMMISSION,
            max_commission: DEFAULT_MAX_COMMISSION,
            block_time: DEFAULT_BLOCK_TIME,
            max_validators: DEFAULT_MAX_VALIDATORS,
        }
    }
}

impl Params {
    /// Checks the params in a fixed order and reports the first failure.
    pub fn validate(&self) -> Result<(), ChainError> {
        if !self.max_supply.is_valid() {
            return Err(ChainError::InvalidParams(format!("invalid max supply: {}", self.max_supply)));
        }
        if !self.mining_reward.is_valid() {
            return Err(ChainError::InvalidParams(format!(
                "invalid mining reward: {}",
                self.mining_reward
            )));
        }
        if !self.transaction_fee.is_valid() {
            return Err(ChainError::InvalidParams(format!(
                "invalid transaction fee: {}",
                self.transaction_fee
            )));
        }
        if !is_unit_fraction(self.min_commission) {
            return Err(ChainError::InvalidParams(format!(
                "invalid min commission: {}",
                self.min_commission
            )));
        }
        if !is_unit_fraction(self.max_commission) {
            return Err(ChainError::InvalidParams(format!(
                "invalid max commission: {}",
                self.max_commission
            )));
        }
        if self.min_commission > self.max_commission {
            return Err(ChainError::InvalidParams(
                "min commission cannot be greater than max commission".to_string(),
            ));
        }
        if self.block_time == 0 {
            return Err(ChainError::InvalidParams("block time must be positive".to_string()));
        }
        if self.max_validators == 0 {
            return Err(ChainError::InvalidParams("max validators must be positive".to_string()));
        }
        Ok(())
    }

    /// Checks a miner's commission against the configured bounds.
    pub fn validate_commission(&self, commission: Rate) -> Result<(), ChainError> {
        if commission < self.min_commission || commission > self.max_commission {
            return Err(ChainError::InvalidCommission(format!(
                "commission {:.10} outside allowed range [{}, {}]",
                commission, self.min_commission, self.max_commission
            )));
        }
        Ok(())
    }
}

fn is_unit_fraction(rate: Rate) -> bool {
    rate >= Rate::ZERO && rate <= Rate::ONE
}

impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Params:")?;
        writeln!(f, "  MaxSupply:         {}", self.max_supply)?;
        writeln!(f, "  MiningReward:      {}", self.mining_reward)?;
        writeln!(f, "  TransactionFee:    {}", self.transaction_fee)?;
        writeln!(f, "  MinCommission:     {}", self.min_commission)?;
        writeln!(f, "  MaxCommission:     {}", self.max_commission)?;
        writeln!(f, "  BlockTime:         {}", self.block_time)?;
        write!(f, "  MaxValidators:     {}", self.max_validators)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coins::Coin;

    #[test]
    fn test_default_params_are_valid() {
        let params = Params::default();
        assert!(params.validate().is_ok());
        assert_eq!(params.max_supply, Coins::native(1_000_000_000));
        assert_eq!(params.mining_reward, Coins::native(100));
        assert_eq!(params.transaction_fee, Coins::native(1));
        assert_eq!(params.block_time, 6);
        assert_eq!(params.max_validators, 100);
    }

    #[test]
    fn test_min_above_max_commission_fails() {
        let params = Params {
            min_commission: Rate::lit("0.3"),
            max_commission: Rate::lit("0.2"),
            ..Params::default()
        };
        let err = params.validate().unwrap_err();
        assert!(err.to_string().contains("min commission cannot be greater"));
    }

    #[test]
    fn test_commission_outside_unit_interval_fails() {
        let negative = Params {
            min_commission: Rate::lit("-0.1"),
            ..Params::default()
        };
        assert!(negative.validate().unwrap_err().to_string().contains("min commission"));

        let above_one = Params {
            max_commission: Rate::lit("1.5"),
            ..Params::default()
        };
        assert!(above_one.validate().unwrap_err().to_string().contains("max commission"));
    }

    #[test]
    fn test_first_failure_is_reported() {
        let params = Params {
            max_supply: Coins::new(vec![Coin::new("x", 1)]),
            block_time: 0,
            max_validators: 0,
            ..Params::default()
        };
        assert!(params.validate().unwrap_err().to_string().contains("max supply"));

        let params = Params {
            block_time: 0,
            max_validators: 0,
            ..Params::default()
        };
        assert!(params.validate().unwrap_err().to_string().contains("block time"));

        let params = Params {
            max_validators: 0,
            ..Params::default()
        };
        assert!(params.validate().unwrap_err().to_string().contains("max validators"));
    }

    #[test]
    fn test_validate_commission_bounds() {
        let params = Params::default();
        assert!(params.validate_commission(Rate::lit("0.1")).is_ok());
        assert!(params.validate_commission(Rate::lit("0.2")).is_ok());
        assert!(params.validate_commission(Rate::ZERO).is_ok());
        assert!(params.validate_commission(Rate::lit("0.5")).is_err());
    }

    #[test]
    fn test_commission_error_shows_rejected_digits() {
        let params = Params::default();
        let just_over: Rate = "0.2000000001".parse().unwrap();
        let err = params.validate_commission(just_over).unwrap_err();
        assert!(err.to_string().contains("commission 0.2000000002 outside"));
    }

    #[test]
    fn test_json_commission_is_decimal_string() {
        let json = serde_json::to_value(Params::default()).unwrap();
        assert!(json["max_commission"].is_string());
        let back: Params = serde_json::from_value(json).unwrap();
        assert_eq!(back, Params::default());
    }

    #[test]
    fn test_display() {
        let text = Params::default().to_string();
        assert!(text.starts_with("Params:"));
        assert!(text.contains("MiningReward:      100mychain"));
    }
}
