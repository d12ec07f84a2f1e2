use crate::coins::Coins;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A ledger account.
///
/// `balance` is a snapshot; the transfer ledger is the authority for
/// balances and this module only reads them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub address: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub balance: Coins,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        address: impl Into<String>,
        name: impl Into<String>,
        email: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        User {
            address: address.into(),
            name: name.into(),
            email: email.into(),
            balance: Coins::empty(),
            created_at,
        }
    }

    /// Same user with the balance replaced by the ledger's view.
    pub fn with_balance(mut self, balance: Coins) -> Self {
        self.balance = balance;
        self
    }
}
