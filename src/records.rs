//! Records persisted by the module, one file per kind.
//!
//! Constructors take the block time from the caller instead of reading the
//! wall clock so that every node derives identical state.

pub mod block_info;
pub mod miner;
pub mod supply;
pub mod transaction;
pub mod user;

pub use block_info::*;
pub use miner::*;
pub use supply::*;
pub use transaction::*;
pub use user::*;
