#![forbid(unsafe_code)]
//! MyChain node: applies genesis on first start, then produces blocks

use chrono::{DateTime, Duration, Utc};
use clap::Parser;
use colored::*;
use mychain::app::{App, AppConfig};
use mychain::config::{load_config, DEFAULT_CONFIG_PATH};
use mychain::error::ChainError;
use mychain::genesis::GenesisState;
use mychain::persistence::SqliteStore;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Node configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Number of blocks to produce
    #[arg(long, default_value_t = 1)]
    blocks: u64,
    /// Address credited with the block rewards
    #[arg(long)]
    miner: Option<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    let db_path = config.database.path.clone();
    if let Some(dir) = Path::new(&db_path).parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)?;
        }
    }

    let store = SqliteStore::open(&db_path, mychain::keys::STORE_KEY)?;
    let mut app = App::new(AppConfig::from(&config), Box::new(store))?;

    if let Err(ChainError::NotInitialized) = app.params() {
        let raw = match &config.chain.genesis_path {
            Some(path) => std::fs::read(path).map_err(|e| format!("Failed to read genesis {}: {}", path, e))?,
            None => GenesisState::default().to_json()?.into_bytes(),
        };
        let result = app.init_chain(&raw)?;
        info!(
            users = result.users,
            miners = result.miners,
            "initialized chain {}",
            config.chain.chain_id
        );
    }

    let params = app.params()?;
    let block_time = Duration::seconds(params.block_time as i64);
    let mut time: DateTime<Utc> = match app.latest_block_info()? {
        Some(latest) => latest.timestamp + block_time,
        None => Utc::now(),
    };

    for _ in 0..cli.blocks {
        app.begin_block(time, cli.miner.clone())?;
        let ended = match app.end_block() {
            Ok(ended) => ended,
            Err(e) => {
                warn!(error = %e, "stopping block production");
                eprintln!("{} {}", "❌ Block aborted:".red().bold(), e);
                break;
            }
        };
        let commit = app.commit()?;
        println!(
            "{} {} {} {}",
            "⛓️  Block".bright_cyan(),
            format!("#{}", commit.height).bright_white().bold(),
            &commit.hash[..16],
            format!("reward {}", ended.block.reward).green()
        );
        time += block_time;
    }

    let supply = app.token_supply()?;
    println!();
    println!("{} {}", "Total supply:".bright_green(), supply.total_supply);
    println!("{} {}", "Remaining:   ".bright_green(), supply.remaining());
    Ok(())
}
