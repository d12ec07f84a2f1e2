use crate::coins::Coins;
use crate::error::ChainError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Confirmed,
    Failed,
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TxStatus::Pending => write!(f, "pending"),
            TxStatus::Confirmed => write!(f, "confirmed"),
            TxStatus::Failed => write!(f, "failed"),
        }
    }
}

/// An executed transfer. Immutable once written apart from the
/// pending -> confirmed/failed status transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub hash: String,
    pub from: String,
    pub to: String,
    pub amount: Coins,
    pub fee: Coins,
    pub block_height: u64,
    pub timestamp: DateTime<Utc>,
    pub status: TxStatus,
}

impl Transaction {
    /// Builds a confirmed transaction. The host only persists transfers it
    /// has already executed, so there is no pending write path here.
    pub fn new(
        hash: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
        amount: Coins,
        fee: Coins,
        block_height: u64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Transaction {
            hash: hash.into(),
            from: from.into(),
            to: to.into(),
            amount,
            fee,
            block_height,
            timestamp,
            status: TxStatus::Confirmed,
        }
    }

    pub fn pending(mut self) -> Self {
        self.status = TxStatus::Pending;
        self
    }

    pub fn confirm(&mut self) -> Result<(), ChainError> {
        self.transition(TxStatus::Confirmed)
    }

    pub fn fail(&mut self) -> Result<(), ChainError> {
        self.transition(TxStatus::Failed)
    }

    fn transition(&mut self, to: TxStatus) -> Result<(), ChainError> {
        if self.status != TxStatus::Pending {
            return Err(ChainError::InvalidState(format!(
                "transaction {} is {}; only pending transactions can become {}",
                self.hash, self.status, to
            )));
        }
        self.status = to;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ChainError> {
        if self.hash.is_empty() {
            return Err(ChainError::InvalidTransaction("transaction hash is empty".to_string()));
        }
        self.amount
            .validate()
            .map_err(|e| ChainError::InvalidTransaction(format!("amount of {}: {}", self.hash, e)))?;
        self.fee
            .validate()
            .map_err(|e| ChainError::InvalidTransaction(format!("fee of {}: {}", self.hash, e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Transaction {
        Transaction::new(
            "A1B2",
            "mychain1alice",
            "mychain1bob",
            Coins::native(50),
            Coins::native(1),
            3,
            DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        )
    }

    #[test]
    fn test_new_transaction_is_confirmed() {
        let tx = sample();
        assert_eq!(tx.status, TxStatus::Confirmed);
        assert!(tx.validate().is_ok());
    }

    #[test]
    fn test_status_transitions_only_from_pending() {
        let mut tx = sample();
        assert!(tx.fail().is_err());

        let mut tx = sample().pending();
        tx.confirm().unwrap();
        assert_eq!(tx.status, TxStatus::Confirmed);
        assert!(tx.fail().is_err());

        let mut tx = sample().pending();
        tx.fail().unwrap();
        assert_eq!(tx.status, TxStatus::Failed);
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&TxStatus::Confirmed).unwrap(), "\"confirmed\"");
    }

    #[test]
    fn test_validate_rejects_empty_hash() {
        let mut tx = sample();
        tx.hash.clear();
        assert!(tx.validate().is_err());
    }
}
