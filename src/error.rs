//! Error types for MyChain

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ChainError {
    // Validation errors: reported at genesis or on a parameter update, fatal to startup.
    #[error("Invalid params: {0}")]
    InvalidParams(String),
    #[error("Invalid genesis: {0}")]
    InvalidGenesis(String),
    #[error("Invalid coins: {0}")]
    InvalidCoins(String),
    #[error("Invalid commission: {0}")]
    InvalidCommission(String),

    // Invariant violations: the block must be aborted rather than committed.
    #[error("Supply cap exceeded: minting {requested} would take total supply past {max}")]
    SupplyCapExceeded { requested: String, max: String },
    #[error("Invalid block linkage: {0}")]
    InvalidBlockLinkage(String),
    #[error("Invalid block height. Expected {expected}, but got {actual}.")]
    InvalidBlockHeight { expected: u64, actual: u64 },
    #[error("Record already exists under key {0}")]
    DuplicateRecord(String),
    #[error("Module already initialized")]
    AlreadyInitialized,
    #[error("Module not initialized")]
    NotInitialized,
    #[error("Invalid state: {0}")]
    InvalidState(String),

    // Lookup misses: recoverable, reported to the caller.
    #[error("User not found: {0}")]
    UserNotFound(String),
    #[error("Miner not found: {0}")]
    MinerNotFound(String),
    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),
    #[error("Block info not found at height {0}")]
    BlockInfoNotFound(u64),

    // Transient per-transaction failures.
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    // Plumbing.
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Bincode error: {0}")]
    BincodeError(String),
    #[error("JSON error: {0}")]
    JsonError(String),
    #[error("Config error: {0}")]
    ConfigError(String),
}

impl ChainError {
    /// Whether the error must halt startup or abort the block being processed.
    ///
    /// Lookup misses and per-transaction failures are recoverable and are
    /// returned to the immediate caller instead.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            ChainError::UserNotFound(_)
                | ChainError::MinerNotFound(_)
                | ChainError::TransactionNotFound(_)
                | ChainError::BlockInfoNotFound(_)
                | ChainError::InsufficientFunds(_)
                | ChainError::Unauthorized(_)
                | ChainError::InvalidTransaction(_)
                | ChainError::InvalidCommission(_)
        )
    }

    /// ABCI-style result code reported for a failed transaction.
    pub fn code(&self) -> u32 {
        match self {
            ChainError::InvalidParams(_) | ChainError::InvalidGenesis(_) => 2,
            ChainError::InvalidCoins(_) => 3,
            ChainError::InvalidCommission(_) => 4,
            ChainError::SupplyCapExceeded { .. } => 5,
            ChainError::DuplicateRecord(_) => 6,
            ChainError::UserNotFound(_)
            | ChainError::MinerNotFound(_)
            | ChainError::TransactionNotFound(_)
            | ChainError::BlockInfoNotFound(_) => 7,
            ChainError::InsufficientFunds(_) => 8,
            ChainError::Unauthorized(_) => 9,
            ChainError::InvalidTransaction(_) => 10,
            _ => 1,
        }
    }
}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::IoError(err.to_string())
    }
}

impl From<Box<bincode::ErrorKind>> for ChainError {
    fn from(err: Box<bincode::ErrorKind>) -> Self {
        ChainError::BincodeError(err.to_string())
    }
}

impl From<serde_json::Error> for ChainError {
    fn from(err: serde_json::Error) -> Self {
        ChainError::JsonError(err.to_string())
    }
}

impl From<rusqlite::Error> for ChainError {
    fn from(err: rusqlite::Error) -> Self {
        ChainError::DatabaseError(err.to_string())
    }
}

impl From<toml::de::Error> for ChainError {
    fn from(err: toml::de::Error) -> Self {
        ChainError::ConfigError(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(ChainError::InvalidParams("x".into()).is_fatal());
        assert!(ChainError::SupplyCapExceeded {
            requested: "1mychain".into(),
            max: "1mychain".into()
        }
        .is_fatal());
        assert!(ChainError::InvalidBlockLinkage("x".into()).is_fatal());
        assert!(!ChainError::UserNotFound("alice".into()).is_fatal());
        assert!(!ChainError::InsufficientFunds("x".into()).is_fatal());
    }

    #[test]
    fn test_error_display() {
        let err = ChainError::InvalidBlockHeight { expected: 3, actual: 5 };
        assert_eq!(err.to_string(), "Invalid block height. Expected 3, but got 5.");
        assert_eq!(ChainError::BlockInfoNotFound(7).to_string(), "Block info not found at height 7");
    }
}
