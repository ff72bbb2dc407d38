use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
};

use chrono::TimeDelta;
use clap::Parser;
use claim_markets::{
    math::bonding_curve::{BASE_PRICE, BondingCurve, SLOPE},
    state::{
        MarketConfig,
        config::{DEFAULT_EXCLUSIVITY_WINDOW_MINS, DEFAULT_INITIAL_BALANCE},
    },
    types::FixedDecimal,
};

const DEFAULT_DATADIR: &str = "claim_markets_data";

const DEFAULT_RPC_ADDR: SocketAddr =
    SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 6060);

/// Default number of whole shares in each side's pool
const DEFAULT_INITIAL_POOL: u64 = 1_000_000_000;

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Data directory for the ledger database
    #[arg(default_value = DEFAULT_DATADIR, long)]
    pub datadir: PathBuf,
    /// Socket address to serve JSON-RPC on
    #[arg(default_value_t = DEFAULT_RPC_ADDR, long)]
    pub rpc_addr: SocketAddr,
    /// Log level, used when RUST_LOG is not set
    #[arg(default_value_t = tracing::Level::INFO, long)]
    pub log_level: tracing::Level,
    /// Also write daily-rolling log files to this directory
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
    /// Balance credited to a wallet on first login
    #[arg(default_value_t = DEFAULT_INITIAL_BALANCE, long)]
    pub initial_balance: FixedDecimal,
    /// Price of the first share on each side
    #[arg(default_value_t = BASE_PRICE, long)]
    pub base_price: FixedDecimal,
    /// Price increase per share sold
    #[arg(default_value_t = SLOPE, long)]
    pub slope: FixedDecimal,
    /// Whole shares available on each side of a new market
    #[arg(default_value_t = DEFAULT_INITIAL_POOL, long)]
    pub initial_pool: u64,
    /// Minutes after submission during which only the author may create a
    /// market
    #[arg(default_value_t = DEFAULT_EXCLUSIVITY_WINDOW_MINS, long)]
    pub exclusivity_window_mins: i64,
    /// Do not insert missing verification status rows at startup
    #[arg(long)]
    pub no_seed_statuses: bool,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub datadir: PathBuf,
    pub rpc_addr: SocketAddr,
    pub log_level: tracing::Level,
    pub log_dir: Option<PathBuf>,
    pub market: MarketConfig,
}

impl Cli {
    pub fn get_config(self) -> anyhow::Result<Config> {
        if self.initial_pool == 0 {
            anyhow::bail!("initial pool must be at least one share");
        }
        if self.exclusivity_window_mins < 0 {
            anyhow::bail!("exclusivity window must not be negative");
        }
        let exclusivity_window =
            TimeDelta::try_minutes(self.exclusivity_window_mins)
                .ok_or_else(|| anyhow::anyhow!("exclusivity window too large"))?;
        let curve = BondingCurve::new(
            self.base_price,
            self.slope,
            FixedDecimal::from_whole(self.initial_pool)?,
        );
        let market = MarketConfig {
            curve,
            initial_balance: self.initial_balance,
            exclusivity_window,
            seed_verification_statuses: !self.no_seed_statuses,
        };
        Ok(Config {
            datadir: self.datadir,
            rpc_addr: self.rpc_addr,
            log_level: self.log_level,
            log_dir: self.log_dir,
            market,
        })
    }
}
