use crate::coins::Coins;
use crate::error::ChainError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default cap: one billion base units of the native denomination.
pub const DEFAULT_MAX_SUPPLY: u128 = 1_000_000_000;

/// Global token economics.
///
/// Invariants: `total_supply <= max_supply` and
/// `circulating_supply <= total_supply`, per denomination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSupply {
    pub total_supply: Coins,
    pub circulating_supply: Coins,
    pub max_supply: Coins,
    pub minted_today: Coins,
    pub last_mint_time: DateTime<Utc>,
}

impl TokenSupply {
    pub fn new(max_supply: Coins, at: DateTime<Utc>) -> Self {
        TokenSupply {
            total_supply: Coins::empty(),
            circulating_supply: Coins::empty(),
            max_supply,
            minted_today: Coins::empty(),
            last_mint_time: at,
        }
    }

    /// Coins still mintable before the cap is reached.
    pub fn remaining(&self) -> Coins {
        self.max_supply.checked_sub(&self.total_supply).unwrap_or_default()
    }

    /// Mints `amount` into total and circulating supply.
    ///
    /// Fails with [`ChainError::SupplyCapExceeded`] and leaves the supply
    /// untouched if any denomination would pass the cap. A denomination with
    /// no cap entry cannot be minted at all.
    pub fn mint(&mut self, amount: &Coins, at: DateTime<Utc>) -> Result<(), ChainError> {
        amount.validate()?;
        let new_total = self
            .total_supply
            .checked_add(amount)
            .ok_or_else(|| self.cap_exceeded(amount))?;
        if !new_total.is_all_lte(&self.max_supply) {
            return Err(self.cap_exceeded(amount));
        }

        let minted_today = if at.date_naive() == self.last_mint_time.date_naive() {
            self.minted_today.add(amount)
        } else {
            amount.clone()
        };

        self.circulating_supply = self.circulating_supply.add(amount);
        self.total_supply = new_total;
        self.minted_today = minted_today;
        self.last_mint_time = at;
        Ok(())
    }

    /// Removes `amount` from circulation and from the total supply.
    pub fn burn(&mut self, amount: &Coins) -> Result<(), ChainError> {
        amount.validate()?;
        let circulating = self.circulating_supply.checked_sub(amount).ok_or_else(|| {
            ChainError::InsufficientFunds(format!(
                "cannot burn {} from circulating supply {}",
                amount, self.circulating_supply
            ))
        })?;
        let total = self.total_supply.checked_sub(amount).ok_or_else(|| {
            ChainError::InvalidState(format!("total supply {} below burn {}", self.total_supply, amount))
        })?;
        self.circulating_supply = circulating;
        self.total_supply = total;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ChainError> {
        for (name, coins) in [
            ("total supply", &self.total_supply),
            ("circulating supply", &self.circulating_supply),
            ("max supply", &self.max_supply),
            ("minted today", &self.minted_today),
        ] {
            coins
                .validate()
                .map_err(|e| ChainError::InvalidGenesis(format!("invalid {}: {}", name, e)))?;
        }
        if !self.total_supply.is_all_lte(&self.max_supply) {
            return Err(ChainError::InvalidGenesis(format!(
                "total supply {} exceeds max supply {}",
                self.total_supply, self.max_supply
            )));
        }
        if !self.circulating_supply.is_all_lte(&self.total_supply) {
            return Err(ChainError::InvalidGenesis(format!(
                "circulating supply {} exceeds total supply {}",
                self.circulating_supply, self.total_supply
            )));
        }
        Ok(())
    }

    fn cap_exceeded(&self, amount: &Coins) -> ChainError {
        ChainError::SupplyCapExceeded {
            requested: amount.to_string(),
            max: self.max_supply.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn test_mint_up_to_cap_then_fail() {
        let mut supply = TokenSupply::new(Coins::native(1000), at(0));
        for _ in 0..10 {
            supply.mint(&Coins::native(100), at(6)).unwrap();
        }
        assert_eq!(supply.total_supply, Coins::native(1000));

        let err = supply.mint(&Coins::native(100), at(12)).unwrap_err();
        assert!(matches!(err, ChainError::SupplyCapExceeded { .. }));
        assert_eq!(supply.total_supply, Coins::native(1000));
        assert_eq!(supply.circulating_supply, Coins::native(1000));
        assert_eq!(supply.last_mint_time, at(6));
    }

    #[test]
    fn test_uncapped_denom_is_rejected() {
        let mut supply = TokenSupply::new(Coins::native(1000), at(0));
        assert!(supply.mint(&Coins::single("stake", 1), at(1)).is_err());
        assert!(supply.total_supply.is_zero());
    }

    #[test]
    fn test_minted_today_resets_on_new_day() {
        let mut supply = TokenSupply::new(Coins::native(1000), at(0));
        supply.mint(&Coins::native(10), at(60)).unwrap();
        supply.mint(&Coins::native(10), at(120)).unwrap();
        assert_eq!(supply.minted_today, Coins::native(20));

        supply.mint(&Coins::native(5), at(86_400 + 1)).unwrap();
        assert_eq!(supply.minted_today, Coins::native(5));
        assert_eq!(supply.total_supply, Coins::native(25));
    }

    #[test]
    fn test_burn() {
        let mut supply = TokenSupply::new(Coins::native(1000), at(0));
        supply.mint(&Coins::native(100), at(1)).unwrap();
        supply.burn(&Coins::native(40)).unwrap();
        assert_eq!(supply.total_supply, Coins::native(60));
        assert!(supply.burn(&Coins::native(61)).is_err());
        assert_eq!(supply.remaining(), Coins::native(940));
    }

    #[test]
    fn test_validate_invariants() {
        let mut supply = TokenSupply::new(Coins::native(1000), at(0));
        assert!(supply.validate().is_ok());

        supply.total_supply = Coins::native(1001);
        assert!(supply.validate().is_err());

        supply.total_supply = Coins::native(10);
        supply.circulating_supply = Coins::native(11);
        assert!(supply.validate().is_err());
    }
}
