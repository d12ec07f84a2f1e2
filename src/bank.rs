//! Transfer ledger consumed by the module
//!
//! The ledger is the only authority for balance arithmetic. The module asks
//! it for balances and asks it to move, mint or burn funds; it never edits a
//! balance itself.

use crate::coins::Coins;
use crate::error::ChainError;
use crate::keys::MODULE_NAME;
use crate::persistence::{decode, encode, KvRead, KvStore, WriteOp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const FEE_COLLECTOR_NAME: &str = "fee_collector";
pub const BONDED_POOL_NAME: &str = "bonded_tokens_pool";
pub const NOT_BONDED_POOL_NAME: &str = "not_bonded_tokens_pool";

/// Prefix of balance rows. Balances share the module's store so that a block's
/// records and the balances it moved are committed in one write.
pub const BALANCE_KEY_PREFIX: &[u8] = b"bank/";

fn balance_key(address: &str) -> Vec<u8> {
    let mut key = BALANCE_KEY_PREFIX.to_vec();
    key.extend_from_slice(address.as_bytes());
    key
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Minter,
    Burner,
    Staking,
}

/// Which module accounts may mint, burn or stake.
///
/// Built once during wiring and handed to the ledger; there is no way to
/// change it at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleAccountPermissions(BTreeMap<String, Vec<Permission>>);

impl Default for ModuleAccountPermissions {
    fn default() -> Self {
        let mut table = BTreeMap::new();
        table.insert(FEE_COLLECTOR_NAME.to_string(), vec![]);
        table.insert(BONDED_POOL_NAME.to_string(), vec![Permission::Burner, Permission::Staking]);
        table.insert(NOT_BONDED_POOL_NAME.to_string(), vec![Permission::Burner, Permission::Staking]);
        table.insert(MODULE_NAME.to_string(), vec![Permission::Minter, Permission::Burner]);
        ModuleAccountPermissions(table)
    }
}

impl ModuleAccountPermissions {
    pub fn new(table: BTreeMap<String, Vec<Permission>>) -> Self {
        ModuleAccountPermissions(table)
    }

    pub fn has(&self, module: &str, permission: Permission) -> bool {
        self.0.get(module).is_some_and(|perms| perms.contains(&permission))
    }

    pub fn is_module_account(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn module_accounts(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|k| k.as_str())
    }
}

pub trait TransferLedger {
    fn balance(&self, address: &str) -> Coins;
    fn has_permission(&self, module: &str, permission: Permission) -> bool;
    fn send(&mut self, from: &str, to: &str, amount: &Coins) -> Result<(), ChainError>;
    /// Creates `amount` on behalf of `module` and credits it to `to`.
    fn mint(&mut self, module: &str, to: &str, amount: &Coins) -> Result<(), ChainError>;
    /// Debits `amount` from `from` and destroys it on behalf of `module`.
    fn burn(&mut self, module: &str, from: &str, amount: &Coins) -> Result<(), ChainError>;
}

/// Balance table held in memory, optionally snapshotted to a store.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    balances: BTreeMap<String, Coins>,
    permissions: ModuleAccountPermissions,
}

impl MemoryLedger {
    pub fn new(permissions: ModuleAccountPermissions) -> Self {
        MemoryLedger {
            balances: BTreeMap::new(),
            permissions,
        }
    }

    /// Rebuilds a ledger from balances previously written by [`MemoryLedger::persist`].
    pub fn load<S: KvRead + ?Sized>(permissions: ModuleAccountPermissions, store: &S) -> Result<Self, ChainError> {
        let mut ledger = MemoryLedger::new(permissions);
        for (key, value) in store.prefix_iter(BALANCE_KEY_PREFIX)? {
            let address = String::from_utf8(key[BALANCE_KEY_PREFIX.len()..].to_vec())
                .map_err(|e| ChainError::DatabaseError(format!("Invalid ledger key: {}", e)))?;
            ledger.balances.insert(address, decode(&value)?);
        }
        Ok(ledger)
    }

    /// Writes every balance to `store`, removing accounts that were emptied.
    pub fn persist(&self, store: &mut dyn KvStore) -> Result<(), ChainError> {
        let mut ops: Vec<WriteOp> = Vec::new();
        for (key, _) in store.prefix_iter(BALANCE_KEY_PREFIX)? {
            let known = std::str::from_utf8(&key[BALANCE_KEY_PREFIX.len()..])
                .is_ok_and(|a| self.balances.contains_key(a));
            if !known {
                ops.push((key, None));
            }
        }
        for (address, coins) in &self.balances {
            ops.push((balance_key(address), Some(encode(coins)?)));
        }
        store.write_batch(ops)
    }

    pub fn permissions(&self) -> &ModuleAccountPermissions {
        &self.permissions
    }

    pub fn accounts(&self) -> impl Iterator<Item = (&str, &Coins)> {
        self.balances.iter().map(|(a, c)| (a.as_str(), c))
    }

    fn credit(&mut self, address: &str, amount: &Coins) -> Result<(), ChainError> {
        let current = self.balance(address);
        let updated = current
            .checked_add(amount)
            .ok_or_else(|| ChainError::InvalidState(format!("balance overflow for {}", address)))?;
        self.store_balance(address, updated);
        Ok(())
    }

    fn debit(&mut self, address: &str, amount: &Coins) -> Result<(), ChainError> {
        let current = self.balance(address);
        let updated = current.checked_sub(amount).ok_or_else(|| {
            ChainError::InsufficientFunds(format!("{} has {}, needs {}", address, current, amount))
        })?;
        self.store_balance(address, updated);
        Ok(())
    }

    fn store_balance(&mut self, address: &str, coins: Coins) {
        if coins.is_zero() {
            self.balances.remove(address);
        } else {
            self.balances.insert(address.to_string(), coins);
        }
    }

    fn require(&self, module: &str, permission: Permission) -> Result<(), ChainError> {
        if !self.permissions.has(module, permission) {
            return Err(ChainError::Unauthorized(format!(
                "module account {} lacks {:?} permission",
                module, permission
            )));
        }
        Ok(())
    }
}

impl TransferLedger for MemoryLedger {
    fn balance(&self, address: &str) -> Coins {
        self.balances.get(address).cloned().unwrap_or_default()
    }

    fn has_permission(&self, module: &str, permission: Permission) -> bool {
        self.permissions.has(module, permission)
    }

    fn send(&mut self, from: &str, to: &str, amount: &Coins) -> Result<(), ChainError> {
        amount.validate()?;
        self.debit(from, amount)?;
        self.credit(to, amount)
    }

    fn mint(&mut self, module: &str, to: &str, amount: &Coins) -> Result<(), ChainError> {
        self.require(module, Permission::Minter)?;
        amount.validate()?;
        self.credit(to, amount)
    }

    fn burn(&mut self, module: &str, from: &str, amount: &Coins) -> Result<(), ChainError> {
        self.require(module, Permission::Burner)?;
        amount.validate()?;
        self.debit(from, amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;

    #[test]
    fn test_default_permissions() {
        let perms = ModuleAccountPermissions::default();
        assert!(perms.has(MODULE_NAME, Permission::Minter));
        assert!(perms.has(MODULE_NAME, Permission::Burner));
        assert!(!perms.has(FEE_COLLECTOR_NAME, Permission::Minter));
        assert!(perms.has(BONDED_POOL_NAME, Permission::Staking));
        assert!(perms.is_module_account(FEE_COLLECTOR_NAME));
        assert!(!perms.is_module_account("mychain1alice"));
    }

    #[test]
    fn test_send_requires_funds() {
        let mut ledger = MemoryLedger::new(ModuleAccountPermissions::default());
        ledger.mint(MODULE_NAME, "alice", &Coins::native(10)).unwrap();
        ledger.send("alice", "bob", &Coins::native(4)).unwrap();
        assert_eq!(ledger.balance("alice"), Coins::native(6));
        assert_eq!(ledger.balance("bob"), Coins::native(4));

        let err = ledger.send("alice", "bob", &Coins::native(7)).unwrap_err();
        assert!(matches!(err, ChainError::InsufficientFunds(_)));
        assert_eq!(ledger.balance("alice"), Coins::native(6));
    }

    #[test]
    fn test_mint_and_burn_check_permissions() {
        let mut ledger = MemoryLedger::new(ModuleAccountPermissions::default());
        assert!(ledger.mint(FEE_COLLECTOR_NAME, "alice", &Coins::native(1)).is_err());
        assert!(ledger.balance("alice").is_zero());

        ledger.mint(MODULE_NAME, "alice", &Coins::native(5)).unwrap();
        ledger.burn(MODULE_NAME, "alice", &Coins::native(5)).unwrap();
        assert!(ledger.balance("alice").is_zero());
        assert_eq!(ledger.accounts().count(), 0);
    }

    #[test]
    fn test_persist_and_load() {
        let mut store = MemoryStore::new();
        let mut ledger = MemoryLedger::new(ModuleAccountPermissions::default());
        ledger.mint(MODULE_NAME, "alice", &Coins::native(3)).unwrap();
        ledger.mint(MODULE_NAME, "bob", &Coins::native(1)).unwrap();
        ledger.persist(&mut store).unwrap();

        ledger.send("bob", "alice", &Coins::native(1)).unwrap();
        ledger.persist(&mut store).unwrap();

        store.set(&[0x02, b'x'], b"module record").unwrap();
        let loaded = MemoryLedger::load(ModuleAccountPermissions::default(), &store).unwrap();
        assert_eq!(loaded.balance("alice"), Coins::native(4));
        assert!(loaded.balance("bob").is_zero());
        assert_eq!(loaded.accounts().count(), 1);
        assert_eq!(store.prefix_iter(BALANCE_KEY_PREFIX).unwrap().len(), 1);
        assert!(store.has(&[0x02, b'x']).unwrap());
    }
}
