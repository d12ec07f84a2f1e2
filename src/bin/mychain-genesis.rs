#![forbid(unsafe_code)]
//! Print or validate genesis files

use clap::{Parser, Subcommand};
use colored::*;
use mychain::genesis::GenesisState;
use mychain::params::Rate;
use mychain::records::Miner;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Prints the default genesis as JSON
    Default {
        /// Register a miner at genesis, given as ADDRESS[:COMMISSION]
        #[arg(long = "miner")]
        miners: Vec<String>,
    },
    /// Validates a genesis file
    Validate {
        /// Path to the genesis JSON file
        file: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Default { miners } => print_default(miners),
        Commands::Validate { file } => validate(file),
    }
}

fn print_default(miners: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let mut genesis = GenesisState::default();
    let registered_at = genesis.token_supply.last_mint_time;
    for entry in miners {
        let (address, commission) = match entry.split_once(':') {
            Some((address, rate)) => (address, rate.parse::<Rate>()?),
            None => (entry.as_str(), genesis.params.min_commission),
        };
        genesis.miners.push(Miner::new(address, "", commission, registered_at));
    }
    genesis.validate()?;
    println!("{}", genesis.to_json()?);
    Ok(())
}

fn validate(file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let raw = std::fs::read(file).map_err(|e| format!("Failed to read {}: {}", file.display(), e))?;

    let genesis = match GenesisState::from_json(&raw).and_then(|g| g.validate().map(|_| g)) {
        Ok(genesis) => genesis,
        Err(e) => {
            eprintln!("{} {}", "❌ Invalid genesis:".red().bold(), e);
            std::process::exit(1);
        }
    };

    println!("{} {}", "✅ Genesis is valid:".bright_green().bold(), file.display());
    println!("{}", genesis.params.to_string().cyan());
    println!("  Users:             {}", genesis.users.len());
    println!("  Miners:            {}", genesis.miners.len());
    println!("  Transactions:      {}", genesis.transactions.len());
    println!("  Total supply:      {}", genesis.token_supply.total_supply);
    Ok(())
}
