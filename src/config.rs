//! Configuration management for MyChain nodes

use crate::bank::ModuleAccountPermissions;
use crate::error::ChainError;
use crate::module::DEFAULT_INITIAL_HEIGHT;
use serde::Deserialize;
use std::fs;
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub governance: GovernanceConfig,
    #[serde(default)]
    pub module_accounts: ModuleAccountPermissions,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    #[serde(default = "default_chain_id")]
    pub chain_id: String,
    #[serde(default = "default_initial_height")]
    pub initial_height: u64,
    /// Genesis JSON file; the built-in default genesis is used when unset.
    #[serde(default)]
    pub genesis_path: Option<String>,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_id: default_chain_id(),
            initial_height: default_initial_height(),
            genesis_path: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: default_db_path() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GovernanceConfig {
    #[serde(default = "default_authority")]
    pub authority: String,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            authority: default_authority(),
        }
    }
}

fn default_chain_id() -> String {
    "mychain".to_string()
}

fn default_initial_height() -> u64 {
    DEFAULT_INITIAL_HEIGHT
}

fn default_db_path() -> String {
    "./data/mychain.db".to_string()
}

fn default_authority() -> String {
    "mychain1gov".to_string()
}

impl Config {
    pub fn from_toml(raw: &str) -> Result<Self, ChainError> {
        let config: Config = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ChainError> {
        if self.chain.chain_id.is_empty() {
            return Err(ChainError::ConfigError("chain.chain_id must be set".to_string()));
        }
        if self.chain.initial_height == 0 {
            return Err(ChainError::ConfigError("chain.initial_height must be positive".to_string()));
        }
        if self.database.path.is_empty() {
            return Err(ChainError::ConfigError("database.path must be set".to_string()));
        }
        if self.governance.authority.is_empty() {
            return Err(ChainError::ConfigError("governance.authority must be set".to_string()));
        }
        Ok(())
    }
}

/// Loads `path`, falling back to defaults when the file is absent.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ChainError> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Config::default());
    }
    let raw = fs::read_to_string(path)?;
    Config::from_toml(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::Permission;
    use crate::keys::MODULE_NAME;

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = load_config("/nonexistent/mychain/config.toml").unwrap();
        assert_eq!(config.chain.chain_id, "mychain");
        assert_eq!(config.chain.initial_height, 1);
        assert!(config.module_accounts.has(MODULE_NAME, Permission::Minter));
    }

    #[test]
    fn test_partial_file() {
        let config = Config::from_toml(
            r#"
            [chain]
            chain_id = "mychain-test"
            initial_height = 5

            [governance]
            authority = "mychain1admin"

            [module_accounts]
            mychain = ["minter"]
            fee_collector = []
            "#,
        )
        .unwrap();
        assert_eq!(config.chain.chain_id, "mychain-test");
        assert_eq!(config.chain.initial_height, 5);
        assert_eq!(config.database.path, "./data/mychain.db");
        assert_eq!(config.governance.authority, "mychain1admin");
        assert!(config.module_accounts.has(MODULE_NAME, Permission::Minter));
        assert!(!config.module_accounts.has(MODULE_NAME, Permission::Burner));
    }

    #[test]
    fn test_rejects_zero_initial_height() {
        let err = Config::from_toml("[chain]\ninitial_height = 0\n").unwrap_err();
        assert!(matches!(err, ChainError::ConfigError(_)));
    }
}
