//! Transaction messages handled by the module

use crate::bank::{TransferLedger, FEE_COLLECTOR_NAME};
use crate::coins::Coins;
use crate::error::ChainError;
use crate::keeper::Keeper;
use crate::keys::MODULE_NAME;
use crate::params::{Params, Rate};
use crate::persistence::KvStore;
use crate::records::{MinerStatus, Transaction};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Maximum encoded message size in bytes (100KB)
pub const MAX_MSG_SIZE: usize = 100_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MsgCreateUser {
    pub creator: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MsgTransferTokens {
    pub sender: String,
    pub receiver: String,
    pub amount: Coins,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MsgMintTokens {
    pub minter: String,
    pub amount: Coins,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MsgBurnTokens {
    pub burner: String,
    pub amount: Coins,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MsgRegisterMiner {
    pub miner: String,
    pub description: String,
    pub commission: Rate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MsgSetMinerStatus {
    pub authority: String,
    pub miner: String,
    pub status: MinerStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MsgUpdateParams {
    pub authority: String,
    pub params: Params,
}

/// A message delivered inside a block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Msg {
    CreateUser(MsgCreateUser),
    TransferTokens(MsgTransferTokens),
    MintTokens(MsgMintTokens),
    BurnTokens(MsgBurnTokens),
    RegisterMiner(MsgRegisterMiner),
    SetMinerStatus(MsgSetMinerStatus),
    UpdateParams(MsgUpdateParams),
}

impl Msg {
    pub fn type_name(&self) -> &'static str {
        match self {
            Msg::CreateUser(_) => "create_user",
            Msg::TransferTokens(_) => "transfer_tokens",
            Msg::MintTokens(_) => "mint_tokens",
            Msg::BurnTokens(_) => "burn_tokens",
            Msg::RegisterMiner(_) => "register_miner",
            Msg::SetMinerStatus(_) => "set_miner_status",
            Msg::UpdateParams(_) => "update_params",
        }
    }

    /// The address on whose behalf the message runs.
    pub fn signer(&self) -> &str {
        match self {
            Msg::CreateUser(msg) => &msg.creator,
            Msg::TransferTokens(msg) => &msg.sender,
            Msg::MintTokens(msg) => &msg.minter,
            Msg::BurnTokens(msg) => &msg.burner,
            Msg::RegisterMiner(msg) => &msg.miner,
            Msg::SetMinerStatus(msg) => &msg.authority,
            Msg::UpdateParams(msg) => &msg.authority,
        }
    }

    /// Stateless checks, run before the message touches the store.
    pub fn validate_basic(&self) -> Result<(), ChainError> {
        if self.signer().is_empty() {
            return Err(invalid(format!("{}: signer address is empty", self.type_name())));
        }
        match self {
            Msg::CreateUser(msg) => {
                if msg.name.trim().is_empty() {
                    return Err(invalid("user name is empty"));
                }
            }
            Msg::TransferTokens(msg) => {
                if msg.receiver.is_empty() {
                    return Err(invalid("receiver address is empty"));
                }
                if msg.sender == msg.receiver {
                    return Err(invalid("sender and receiver are the same account"));
                }
                require_positive(&msg.amount)?;
            }
            Msg::MintTokens(msg) => require_positive(&msg.amount)?,
            Msg::BurnTokens(msg) => require_positive(&msg.amount)?,
            Msg::RegisterMiner(msg) => {
                if msg.commission < Rate::ZERO || msg.commission > Rate::ONE {
                    return Err(ChainError::InvalidCommission(format!(
                        "commission {} is not between 0 and 1",
                        msg.commission
                    )));
                }
            }
            Msg::SetMinerStatus(msg) => {
                if msg.miner.is_empty() {
                    return Err(invalid("miner address is empty"));
                }
            }
            Msg::UpdateParams(msg) => msg.params.validate()?,
        }
        Ok(())
    }

    pub fn validate_size(&self) -> Result<usize, ChainError> {
        let size = bincode::serialized_size(self)? as usize;
        if size > MAX_MSG_SIZE {
            return Err(invalid(format!("message too large: {} bytes (max: {})", size, MAX_MSG_SIZE)));
        }
        Ok(size)
    }

    /// Upper-case hex SHA-256 over the encoded message and its position in the chain.
    pub fn hash(&self, height: u64, index: u32) -> Result<String, ChainError> {
        let mut hasher = Sha256::new();
        hasher.update(bincode::serialize(self)?);
        hasher.update(height.to_be_bytes());
        hasher.update(index.to_be_bytes());
        Ok(hex::encode_upper(hasher.finalize()))
    }
}

fn invalid(msg: impl Into<String>) -> ChainError {
    ChainError::InvalidTransaction(msg.into())
}

fn require_positive(amount: &Coins) -> Result<(), ChainError> {
    amount.validate()?;
    if amount.is_zero() {
        return Err(invalid("amount must be positive"));
    }
    Ok(())
}

/// Where and when a message executes.
#[derive(Debug, Clone)]
pub struct TxContext {
    pub height: u64,
    pub time: DateTime<Utc>,
    pub hash: String,
    /// Governance address allowed to run the governed messages.
    pub authority: String,
}

/// What a successfully handled message reports back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutcome {
    pub log: String,
    pub fee: Coins,
}

impl TxOutcome {
    fn free(log: String) -> Self {
        TxOutcome { log, fee: Coins::empty() }
    }
}

/// Executes one message against the store and the ledger.
///
/// Store writes happen before ledger calls, and every ledger call is checked
/// up front, so a failure leaves the ledger untouched. The caller discards
/// the store writes of a failed message.
pub fn handle_msg(
    store: &mut dyn KvStore,
    ledger: &mut dyn TransferLedger,
    ctx: &TxContext,
    msg: &Msg,
) -> Result<TxOutcome, ChainError> {
    msg.validate_basic()?;
    let mut keeper = Keeper::new(store);
    if !keeper.is_initialized()? {
        return Err(ChainError::NotInitialized);
    }

    match msg {
        Msg::CreateUser(msg) => {
            keeper.create_user(&msg.creator, &msg.name, &msg.email, ctx.time)?;
            Ok(TxOutcome::free(format!("created user {}", msg.creator)))
        }
        Msg::TransferTokens(msg) => {
            let fee = keeper.params()?.transaction_fee;
            let total = msg.amount.add(&fee);
            let balance = ledger.balance(&msg.sender);
            if !total.is_all_lte(&balance) {
                return Err(ChainError::InsufficientFunds(format!(
                    "{} has {}, needs {}",
                    msg.sender, balance, total
                )));
            }

            let tx = Transaction::new(
                ctx.hash.clone(),
                msg.sender.clone(),
                msg.receiver.clone(),
                msg.amount.clone(),
                fee.clone(),
                ctx.height,
                ctx.time,
            );
            keeper.record_transaction(&tx)?;

            ledger.send(&msg.sender, &msg.receiver, &msg.amount)?;
            if !fee.is_zero() {
                ledger.send(&msg.sender, FEE_COLLECTOR_NAME, &fee)?;
            }
            Ok(TxOutcome {
                log: format!("transferred {} from {} to {}", msg.amount, msg.sender, msg.receiver),
                fee,
            })
        }
        Msg::MintTokens(msg) => {
            let miner = match keeper.miner(&msg.minter) {
                Ok(miner) => miner,
                Err(ChainError::MinerNotFound(_)) => {
                    return Err(ChainError::Unauthorized(format!(
                        "{} is not a registered miner",
                        msg.minter
                    )))
                }
                Err(e) => return Err(e),
            };
            if !miner.is_active() {
                return Err(ChainError::Unauthorized(format!("miner {} is inactive", msg.minter)));
            }
            keeper.mint(&msg.amount, ctx.time)?;
            ledger.mint(MODULE_NAME, &msg.minter, &msg.amount)?;
            Ok(TxOutcome::free(format!("minted {} to {}", msg.amount, msg.minter)))
        }
        Msg::BurnTokens(msg) => {
            let balance = ledger.balance(&msg.burner);
            if !msg.amount.is_all_lte(&balance) {
                return Err(ChainError::InsufficientFunds(format!(
                    "{} has {}, cannot burn {}",
                    msg.burner, balance, msg.amount
                )));
            }
            keeper.burn(&msg.amount)?;
            ledger.burn(MODULE_NAME, &msg.burner, &msg.amount)?;
            Ok(TxOutcome::free(format!("burned {} from {}", msg.amount, msg.burner)))
        }
        Msg::RegisterMiner(msg) => {
            keeper.register_miner(&msg.miner, &msg.description, msg.commission, ctx.time)?;
            Ok(TxOutcome::free(format!("registered miner {}", msg.miner)))
        }
        Msg::SetMinerStatus(msg) => {
            require_authority(ctx, &msg.authority)?;
            let miner = keeper.set_miner_status(&msg.miner, msg.status)?;
            Ok(TxOutcome::free(format!("miner {} is {}", miner.address, miner.status)))
        }
        Msg::UpdateParams(msg) => {
            require_authority(ctx, &msg.authority)?;
            keeper.update_params(&msg.params)?;
            Ok(TxOutcome::free("params updated".to_string()))
        }
    }
}

fn require_authority(ctx: &TxContext, authority: &str) -> Result<(), ChainError> {
    if ctx.authority.is_empty() || authority != ctx.authority {
        return Err(ChainError::Unauthorized(format!(
            "{} is not the governance authority",
            authority
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::{MemoryLedger, ModuleAccountPermissions};
    use crate::persistence::MemoryStore;
    use crate::records::TokenSupply;

    const GOV: &str = "mychain1gov";

    fn ctx(hash: &str) -> TxContext {
        TxContext {
            height: 1,
            time: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            hash: hash.to_string(),
            authority: GOV.to_string(),
        }
    }

    fn setup() -> (MemoryStore, MemoryLedger) {
        let params = Params::default();
        let mut store = MemoryStore::new();
        let mut keeper = Keeper::new(&mut store);
        keeper
            .set_token_supply(&TokenSupply::new(params.max_supply.clone(), DateTime::default()))
            .unwrap();
        keeper.set_params(&params).unwrap();
        (store, MemoryLedger::new(ModuleAccountPermissions::default()))
    }

    fn register(store: &mut MemoryStore, ledger: &mut MemoryLedger, miner: &str) {
        let msg = Msg::RegisterMiner(MsgRegisterMiner {
            miner: miner.to_string(),
            description: String::new(),
            commission: Rate::lit("0.1"),
        });
        handle_msg(store, ledger, &ctx("R"), &msg).unwrap();
    }

    fn mint(store: &mut MemoryStore, ledger: &mut MemoryLedger, to: &str, amount: u128) {
        let msg = Msg::MintTokens(MsgMintTokens {
            minter: to.to_string(),
            amount: Coins::native(amount),
        });
        handle_msg(store, ledger, &ctx("M"), &msg).unwrap();
    }

    #[test]
    fn test_validate_basic() {
        let transfer = Msg::TransferTokens(MsgTransferTokens {
            sender: "a".to_string(),
            receiver: "a".to_string(),
            amount: Coins::native(1),
        });
        assert!(transfer.validate_basic().is_err());

        let zero = Msg::MintTokens(MsgMintTokens {
            minter: "m".to_string(),
            amount: Coins::empty(),
        });
        assert!(zero.validate_basic().is_err());

        let unsigned = Msg::CreateUser(MsgCreateUser {
            creator: String::new(),
            name: "Alice".to_string(),
            email: String::new(),
        });
        assert!(unsigned.validate_basic().unwrap_err().to_string().contains("signer"));
    }

    #[test]
    fn test_hash_depends_on_position() {
        let msg = Msg::CreateUser(MsgCreateUser {
            creator: "a".to_string(),
            name: "A".to_string(),
            email: String::new(),
        });
        let first = msg.hash(1, 0).unwrap();
        assert_eq!(first.len(), 64);
        assert_eq!(first, first.to_uppercase());
        assert_ne!(first, msg.hash(1, 1).unwrap());
        assert_ne!(first, msg.hash(2, 0).unwrap());
    }

    #[test]
    fn test_transfer_charges_fee() {
        let (mut store, mut ledger) = setup();
        register(&mut store, &mut ledger, "m1");
        mint(&mut store, &mut ledger, "m1", 50);

        let msg = Msg::TransferTokens(MsgTransferTokens {
            sender: "m1".to_string(),
            receiver: "bob".to_string(),
            amount: Coins::native(20),
        });
        let outcome = handle_msg(&mut store, &mut ledger, &ctx("T1"), &msg).unwrap();
        assert_eq!(outcome.fee, Coins::native(1));
        assert_eq!(ledger.balance("m1"), Coins::native(29));
        assert_eq!(ledger.balance("bob"), Coins::native(20));
        assert_eq!(ledger.balance(FEE_COLLECTOR_NAME), Coins::native(1));

        let recorded = Keeper::new(&store).transaction("T1").unwrap();
        assert_eq!(recorded.amount, Coins::native(20));
        assert_eq!(recorded.fee, Coins::native(1));
    }

    #[test]
    fn test_transfer_without_fee_funds_fails_cleanly() {
        let (mut store, mut ledger) = setup();
        register(&mut store, &mut ledger, "m1");
        mint(&mut store, &mut ledger, "m1", 20);

        let msg = Msg::TransferTokens(MsgTransferTokens {
            sender: "m1".to_string(),
            receiver: "bob".to_string(),
            amount: Coins::native(20),
        });
        let err = handle_msg(&mut store, &mut ledger, &ctx("T1"), &msg).unwrap_err();
        assert!(matches!(err, ChainError::InsufficientFunds(_)));
        assert_eq!(ledger.balance("m1"), Coins::native(20));
        assert!(Keeper::new(&store).transaction("T1").is_err());
    }

    #[test]
    fn test_only_active_miners_mint() {
        let (mut store, mut ledger) = setup();
        let msg = Msg::MintTokens(MsgMintTokens {
            minter: "stranger".to_string(),
            amount: Coins::native(5),
        });
        let err = handle_msg(&mut store, &mut ledger, &ctx("M"), &msg).unwrap_err();
        assert!(matches!(err, ChainError::Unauthorized(_)));

        register(&mut store, &mut ledger, "m1");
        let pause = Msg::SetMinerStatus(MsgSetMinerStatus {
            authority: GOV.to_string(),
            miner: "m1".to_string(),
            status: MinerStatus::Inactive,
        });
        handle_msg(&mut store, &mut ledger, &ctx("S"), &pause).unwrap();
        let msg = Msg::MintTokens(MsgMintTokens {
            minter: "m1".to_string(),
            amount: Coins::native(5),
        });
        assert!(handle_msg(&mut store, &mut ledger, &ctx("M"), &msg).is_err());
        assert!(Keeper::new(&store).token_supply().unwrap().total_supply.is_zero());
    }

    #[test]
    fn test_burn_reduces_supply_and_balance() {
        let (mut store, mut ledger) = setup();
        register(&mut store, &mut ledger, "m1");
        mint(&mut store, &mut ledger, "m1", 30);

        let burn = Msg::BurnTokens(MsgBurnTokens {
            burner: "m1".to_string(),
            amount: Coins::native(10),
        });
        handle_msg(&mut store, &mut ledger, &ctx("B"), &burn).unwrap();
        assert_eq!(ledger.balance("m1"), Coins::native(20));
        assert_eq!(Keeper::new(&store).token_supply().unwrap().total_supply, Coins::native(20));

        let too_much = Msg::BurnTokens(MsgBurnTokens {
            burner: "m1".to_string(),
            amount: Coins::native(21),
        });
        assert!(handle_msg(&mut store, &mut ledger, &ctx("B2"), &too_much).is_err());
    }

    #[test]
    fn test_governed_messages_check_authority() {
        let (mut store, mut ledger) = setup();
        let update = Msg::UpdateParams(MsgUpdateParams {
            authority: "mychain1mallory".to_string(),
            params: Params {
                block_time: 12,
                ..Params::default()
            },
        });
        let err = handle_msg(&mut store, &mut ledger, &ctx("U"), &update).unwrap_err();
        assert!(matches!(err, ChainError::Unauthorized(_)));

        let update = Msg::UpdateParams(MsgUpdateParams {
            authority: GOV.to_string(),
            params: Params {
                block_time: 12,
                ..Params::default()
            },
        });
        handle_msg(&mut store, &mut ledger, &ctx("U"), &update).unwrap();
        assert_eq!(Keeper::new(&store).params().unwrap().block_time, 12);
    }

    #[test]
    fn test_uninitialized_store_rejects_messages() {
        let mut store = MemoryStore::new();
        let mut ledger = MemoryLedger::default();
        let msg = Msg::CreateUser(MsgCreateUser {
            creator: "a".to_string(),
            name: "A".to_string(),
            email: String::new(),
        });
        assert!(matches!(
            handle_msg(&mut store, &mut ledger, &ctx("C"), &msg),
            Err(ChainError::NotInitialized)
        ));
    }
}
