//! Multi-denomination amounts
//!
//! A [`Coins`] value is kept sorted by denomination with no duplicates and no
//! zero entries, so two sets holding the same amounts always compare equal
//! and serialize to the same bytes.

use crate::error::ChainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Native denomination of the chain.
pub const DEFAULT_BOND_DENOM: &str = "mychain";

const MIN_DENOM_LENGTH: usize = 3;
const MAX_DENOM_LENGTH: usize = 128;

/// A single denomination and its amount.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: u128,
}

impl Coin {
    pub fn new(denom: impl Into<String>, amount: u128) -> Self {
        Coin {
            denom: denom.into(),
            amount,
        }
    }

    pub fn is_valid(&self) -> bool {
        validate_denom(&self.denom).is_ok() && self.amount > 0
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

impl FromStr for Coin {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| ChainError::InvalidCoins(format!("missing denomination in '{}'", s)))?;
        if split == 0 {
            return Err(ChainError::InvalidCoins(format!("missing amount in '{}'", s)));
        }
        let (amount, denom) = s.split_at(split);
        let amount = amount
            .parse::<u128>()
            .map_err(|e| ChainError::InvalidCoins(format!("invalid amount '{}': {}", amount, e)))?;
        validate_denom(denom)?;
        Ok(Coin::new(denom, amount))
    }
}

/// Checks a denomination against `[a-zA-Z][a-zA-Z0-9/:._-]{2,127}`.
pub fn validate_denom(denom: &str) -> Result<(), ChainError> {
    let len = denom.len();
    if !(MIN_DENOM_LENGTH..=MAX_DENOM_LENGTH).contains(&len) {
        return Err(ChainError::InvalidCoins(format!(
            "denomination '{}' must be between {} and {} characters",
            denom, MIN_DENOM_LENGTH, MAX_DENOM_LENGTH
        )));
    }
    let mut chars = denom.chars();
    let first_ok = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    let rest_ok = chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | ':' | '.' | '_' | '-'));
    if !first_ok || !rest_ok {
        return Err(ChainError::InvalidCoins(format!("invalid denomination '{}'", denom)));
    }
    Ok(())
}

/// A set of coins, one entry per denomination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Coins(Vec<Coin>);

impl Coins {
    /// Builds a normalized set: zero entries are dropped, duplicates merged, denoms sorted.
    pub fn new(coins: Vec<Coin>) -> Self {
        let mut out = Coins::default();
        for coin in coins {
            out.add_coin(coin);
        }
        out
    }

    pub fn empty() -> Self {
        Coins::default()
    }

    /// Shorthand for a single-denomination set.
    pub fn single(denom: impl Into<String>, amount: u128) -> Self {
        Coins::new(vec![Coin::new(denom, amount)])
    }

    /// Shorthand for an amount of the native denomination.
    pub fn native(amount: u128) -> Self {
        Coins::single(DEFAULT_BOND_DENOM, amount)
    }

    /// A set is well formed when every denom is valid, every amount is
    /// positive and the entries are strictly ascending by denom.
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    pub fn validate(&self) -> Result<(), ChainError> {
        for (i, coin) in self.0.iter().enumerate() {
            validate_denom(&coin.denom)?;
            if coin.amount == 0 {
                return Err(ChainError::InvalidCoins(format!("coin {} amount is not positive", coin)));
            }
            if i > 0 && self.0[i - 1].denom >= coin.denom {
                return Err(ChainError::InvalidCoins(format!(
                    "denominations are not sorted or contain duplicates: {}",
                    self
                )));
            }
        }
        Ok(())
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Coin> {
        self.0.iter()
    }

    pub fn denoms(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|c| c.denom.as_str())
    }

    pub fn amount_of(&self, denom: &str) -> u128 {
        self.0
            .binary_search_by(|c| c.denom.as_str().cmp(denom))
            .map(|i| self.0[i].amount)
            .unwrap_or(0)
    }

    fn add_coin(&mut self, coin: Coin) {
        if coin.amount == 0 {
            return;
        }
        match self.0.binary_search_by(|c| c.denom.cmp(&coin.denom)) {
            Ok(i) => self.0[i].amount = self.0[i].amount.saturating_add(coin.amount),
            Err(i) => self.0.insert(i, coin),
        }
    }

    /// Returns the sum of both sets, or `None` if any denomination overflows.
    pub fn checked_add(&self, other: &Coins) -> Option<Coins> {
        let mut out = self.clone();
        for coin in &other.0 {
            match out.0.binary_search_by(|c| c.denom.cmp(&coin.denom)) {
                Ok(i) => out.0[i].amount = out.0[i].amount.checked_add(coin.amount)?,
                Err(i) => out.0.insert(i, coin.clone()),
            }
        }
        Some(out)
    }

    /// Saturating sum; amounts never realistically approach `u128::MAX`.
    pub fn add(&self, other: &Coins) -> Coins {
        let mut out = self.clone();
        for coin in &other.0 {
            out.add_coin(coin.clone());
        }
        out
    }

    /// Returns `self - other`, or `None` if any denomination would go negative.
    pub fn checked_sub(&self, other: &Coins) -> Option<Coins> {
        let mut out = self.clone();
        for coin in &other.0 {
            let i = out.0.binary_search_by(|c| c.denom.cmp(&coin.denom)).ok()?;
            let remaining = out.0[i].amount.checked_sub(coin.amount)?;
            if remaining == 0 {
                out.0.remove(i);
            } else {
                out.0[i].amount = remaining;
            }
        }
        Some(out)
    }

    /// Every denomination of `self` is at most the same denomination of `other`.
    pub fn is_all_lte(&self, other: &Coins) -> bool {
        self.0.iter().all(|c| c.amount <= other.amount_of(&c.denom))
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|c| c.to_string()).collect();
        write!(f, "{}", parts.join(","))
    }
}

impl FromStr for Coins {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Coins::empty());
        }
        let coins = s.split(',').map(Coin::from_str).collect::<Result<Vec<_>, _>>()?;
        Ok(Coins::new(coins))
    }
}

impl From<Coin> for Coins {
    fn from(coin: Coin) -> Self {
        Coins::new(vec![coin])
    }
}
