//! Storage key layout for the module
//!
//! Every record kind lives under its own single-byte prefix so that a range
//! scan over one kind never observes another:
//!
//! | prefix | contents |
//! |--------|----------|
//! | `0x01` | token supply singleton |
//! | `0x02` | users, keyed by address |
//! | `0x03` | transactions, keyed by hash |
//! | `0x04` | miners, keyed by address |
//! | `0x05` | block info, keyed by big-endian height |
//! | `0x06` | params singleton |
//!
//! The transfer ledger keeps its balances in the same store under
//! `b"bank/"` (see [`crate::bank::BALANCE_KEY_PREFIX`]), clear of every
//! module prefix.
//!
//! Identifiers are appended verbatim. Empty identifiers yield a key equal to
//! the bare prefix; callers reject them before reaching this layer.

/// Name of the module; also its store key, router key and querier route.
pub const MODULE_NAME: &str = "mychain";
pub const STORE_KEY: &str = MODULE_NAME;
pub const ROUTER_KEY: &str = MODULE_NAME;
pub const QUERIER_ROUTE: &str = MODULE_NAME;

pub const TOKEN_SUPPLY_KEY: &[u8] = &[0x01];
pub const USER_KEY_PREFIX: &[u8] = &[0x02];
pub const TRANSACTION_KEY_PREFIX: &[u8] = &[0x03];
pub const MINER_KEY_PREFIX: &[u8] = &[0x04];
pub const BLOCK_INFO_KEY_PREFIX: &[u8] = &[0x05];
pub const PARAMS_KEY: &[u8] = &[0x06];

fn prefixed(prefix: &[u8], id: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + id.len());
    key.extend_from_slice(prefix);
    key.extend_from_slice(id);
    key
}

pub fn user_key(address: &str) -> Vec<u8> {
    prefixed(USER_KEY_PREFIX, address.as_bytes())
}

pub fn transaction_key(hash: &str) -> Vec<u8> {
    prefixed(TRANSACTION_KEY_PREFIX, hash.as_bytes())
}

pub fn miner_key(address: &str) -> Vec<u8> {
    prefixed(MINER_KEY_PREFIX, address.as_bytes())
}

/// Block keys carry the height as a fixed-width big-endian `u64`, so
/// lexicographic key order is numeric height order.
pub fn block_info_key(height: u64) -> Vec<u8> {
    prefixed(BLOCK_INFO_KEY_PREFIX, &height.to_be_bytes())
}

/// Inverse of [`block_info_key`]. Returns `None` for keys outside the block range.
pub fn height_from_block_info_key(key: &[u8]) -> Option<u64> {
    let raw = key.strip_prefix(BLOCK_INFO_KEY_PREFIX)?;
    let bytes: [u8; 8] = raw.try_into().ok()?;
    Some(u64::from_be_bytes(bytes))
}

/// Exclusive upper bound of the range of keys starting with `prefix`.
///
/// `None` means the range is unbounded above (the prefix is empty or all `0xFF`).
pub fn prefix_end(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < u8::MAX {
            end.push(last + 1);
            return Some(end);
        }
    }
    None
}
