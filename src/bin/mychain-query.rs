#![forbid(unsafe_code)]
//! Inspect the state of a MyChain database

use clap::{Parser, Subcommand};
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::Color as TableColor;
use comfy_table::{Attribute, Cell, ContentArrangement, Table};
use mychain::bank::MemoryLedger;
use mychain::config::{load_config, DEFAULT_CONFIG_PATH};
use mychain::keeper::Keeper;
use mychain::persistence::SqliteStore;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Node configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Shows the module parameters
    Params,
    /// Shows the token supply
    Supply,
    /// Lists registered miners
    Miners,
    /// Lists recent blocks
    Blocks {
        /// Number of most recent blocks to show
        #[arg(long, default_value_t = 10)]
        last: u64,
    },
    /// Shows one user
    User { address: String },
}

fn header(titles: &[&str]) -> Vec<Cell> {
    titles
        .iter()
        .map(|t| Cell::new(t).fg(TableColor::Cyan).add_attribute(Attribute::Bold))
        .collect()
}

fn new_table(titles: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header(titles));
    table
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    let store = SqliteStore::open(&config.database.path, mychain::keys::STORE_KEY)?;
    let keeper = Keeper::new(&store);

    match &cli.command {
        Commands::Params => {
            println!("{}", keeper.params()?.to_string().cyan());
        }
        Commands::Supply => {
            let supply = keeper.token_supply()?;
            let mut table = new_table(&["Field", "Value"]);
            table.add_row(vec![Cell::new("Total"), Cell::new(supply.total_supply.to_string())]);
            table.add_row(vec![
                Cell::new("Circulating"),
                Cell::new(supply.circulating_supply.to_string()),
            ]);
            table.add_row(vec![Cell::new("Max"), Cell::new(supply.max_supply.to_string())]);
            table.add_row(vec![
                Cell::new("Remaining"),
                Cell::new(supply.remaining().to_string()).fg(TableColor::Green),
            ]);
            table.add_row(vec![Cell::new("Minted today"), Cell::new(supply.minted_today.to_string())]);
            table.add_row(vec![
                Cell::new("Last mint"),
                Cell::new(supply.last_mint_time.format("%Y-%m-%d %H:%M:%S").to_string()),
            ]);
            println!("{table}");
        }
        Commands::Miners => {
            let miners = keeper.miners()?;
            if miners.is_empty() {
                println!("{}", "📭 No miners registered".yellow());
                return Ok(());
            }
            let mut table = new_table(&["Address", "Status", "Commission", "Blocks", "Rewards"]);
            for miner in &miners {
                let color = if miner.is_active() {
                    TableColor::Green
                } else {
                    TableColor::DarkGrey
                };
                table.add_row(vec![
                    Cell::new(&miner.address).fg(TableColor::White),
                    Cell::new(miner.status.to_string()).fg(color),
                    Cell::new(miner.commission.to_string()),
                    Cell::new(miner.blocks_mined.to_string()),
                    Cell::new(miner.total_rewards.to_string()),
                ]);
            }
            println!("{table}");
        }
        Commands::Blocks { last } => {
            let latest = match keeper.latest_block_info()? {
                Some(latest) => latest.height,
                None => {
                    println!("{}", "📭 No blocks yet".yellow());
                    return Ok(());
                }
            };
            let from = latest.saturating_sub(last.saturating_sub(1));
            let mut table = new_table(&["Height", "Hash", "Miner", "Txs", "Reward", "Time"]);
            for block in keeper.blocks_since(from)? {
                table.add_row(vec![
                    Cell::new(format!("#{}", block.height)).fg(TableColor::White),
                    Cell::new(format!("{}...", &block.hash[..block.hash.len().min(13)])),
                    Cell::new(&block.miner),
                    Cell::new(block.tx_count.to_string()),
                    Cell::new(block.reward.to_string()).fg(TableColor::Cyan),
                    Cell::new(block.timestamp.format("%Y-%m-%d %H:%M:%S").to_string()),
                ]);
            }
            println!("{table}");
        }
        Commands::User { address } => {
            let ledger = MemoryLedger::load(config.module_accounts.clone(), &store)?;
            let user = keeper.user_with_balance(address, &ledger)?;
            println!("{} {}", "👤".bright_white(), user.name.bright_white().bold());
            println!("  Address:  {}", user.address);
            println!("  Email:    {}", user.email);
            println!("  Balance:  {}", user.balance.to_string().green());
            println!("  Created:  {}", user.created_at.format("%Y-%m-%d %H:%M:%S"));
        }
    }

    Ok(())
}
