//! MyChain - a capped-supply ledger module with miner rewards
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## State Model
//! - [`coins`] - Multi-denomination amounts
//! - [`records`] - Users, transactions, miners, block info and token supply
//! - [`params`] - Economic parameters
//! - [`genesis`] - Genesis bundle and its validation
//!
//! ## Storage
//! - [`keys`] - Key layout of the module's store
//! - [`persistence`] - Ordered key-value stores (memory, SQLite, write batches)
//! - [`keeper`] - Typed record access and state changes
//!
//! ## Ledger
//! - [`bank`] - Transfer ledger and module account permissions
//!
//! ## Execution
//! - [`msgs`] - Transaction messages and their handler
//! - [`module`] - Genesis, begin-block and end-block hooks
//! - [`app`] - Wiring of store, ledger and module into a block pipeline
//!
//! ## Configuration & Utilities
//! - [`config`] - Node configuration
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// State Model
// ============================================================================
pub mod coins;
pub mod genesis;
pub mod params;
pub mod records;

// ============================================================================
// Storage
// ============================================================================
pub mod keeper;
pub mod keys;
pub mod persistence;

// ============================================================================
// Ledger
// ============================================================================
pub mod bank;

// ============================================================================
// Execution
// ============================================================================
pub mod app;
pub mod module;
pub mod msgs;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;
