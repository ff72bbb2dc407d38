use std::{net::Ipv4Addr, time::Duration};

use clap::{Parser, Subcommand};
use claim_markets_app_rpc_api::RpcClient;
use http::HeaderMap;
use jsonrpsee::{core::client::ClientT, http_client::HttpClientBuilder};
use tracing_subscriber::layer::SubscriberExt as _;
use url::{Host, Url};

#[derive(Clone, Debug, Subcommand)]
#[command(arg_required_else_help(true))]
pub enum Command {
    /// Buy shares of one side of a market
    BuyShares {
        market_id: u64,
        #[arg(long)]
        wallet: String,
        /// TRUE or FALSE
        #[arg(long)]
        side: String,
        /// Number of shares, up to 8 decimal places
        #[arg(long)]
        amount: String,
    },
    /// Create the market for an AI-verified claim
    CreateMarket {
        claim_id: u64,
        #[arg(long)]
        wallet: String,
    },
    /// Show a claim
    GetClaim { claim_id: u64 },
    /// Show a user account
    GetUser { wallet: String },
    /// List all markets, newest first
    ListMarkets,
    /// List the positions held by a wallet
    MyPositions { wallet: String },
    /// Get OpenAPI schema
    OpenapiSchema,
    /// Price a purchase without executing it
    QuoteBuy {
        market_id: u64,
        #[arg(long)]
        side: String,
        #[arg(long)]
        amount: String,
    },
    /// Move a claim to another verification status
    SetClaimStatus {
        claim_id: u64,
        /// Status name, e.g. `ai_reviewed`
        #[arg(long)]
        status: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Stop the node
    Stop,
    /// Submit a claim for review
    SubmitClaim {
        text: String,
        #[arg(long)]
        author: String,
    },
    /// Get or create the account of a wallet
    WalletLogin { wallet: String },
}

const DEFAULT_RPC_HOST: Host = Host::Ipv4(Ipv4Addr::LOCALHOST);

const DEFAULT_RPC_PORT: u16 = 6060;

const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
    /// Host used for requests to the RPC server
    #[arg(default_value_t = DEFAULT_RPC_HOST, long, value_parser = Host::parse)]
    pub rpc_host: Host,
    /// Port used for requests to the RPC server
    #[arg(default_value_t = DEFAULT_RPC_PORT, long)]
    pub rpc_port: u16,
    /// Timeout for RPC requests in seconds.
    #[arg(default_value_t = DEFAULT_TIMEOUT_SECS, long)]
    timeout_secs: u64,
    #[arg(short, long, help = "Enable verbose HTTP output")]
    pub verbose: bool,
}

impl Cli {
    fn rpc_url(&self) -> anyhow::Result<Url> {
        Ok(Url::parse(&format!(
            "http://{}:{}",
            self.rpc_host, self.rpc_port
        ))?)
    }
}

/// Handle a command, returning CLI output
async fn handle_command<RpcClient>(
    rpc_client: &RpcClient,
    command: Command,
) -> anyhow::Result<String>
where
    RpcClient: ClientT + Sync,
{
    Ok(match command {
        Command::BuyShares {
            market_id,
            wallet,
            side,
            amount,
        } => {
            let receipt = rpc_client
                .buy_shares(market_id, wallet, side, amount)
                .await?;
            serde_json::to_string_pretty(&receipt)?
        }
        Command::CreateMarket { claim_id, wallet } => {
            let created = rpc_client.create_market(claim_id, wallet).await?;
            serde_json::to_string_pretty(&created)?
        }
        Command::GetClaim { claim_id } => {
            let claim = rpc_client.get_claim(claim_id).await?;
            serde_json::to_string_pretty(&claim)?
        }
        Command::GetUser { wallet } => {
            let user = rpc_client.get_user(wallet).await?;
            serde_json::to_string_pretty(&user)?
        }
        Command::ListMarkets => {
            let markets = rpc_client.list_markets().await?;
            serde_json::to_string_pretty(&markets)?
        }
        Command::MyPositions { wallet } => {
            let positions = rpc_client.my_positions(wallet).await?;
            serde_json::to_string_pretty(&positions)?
        }
        Command::OpenapiSchema => {
            let openapi = rpc_client.openapi_schema().await?;
            serde_json::to_string_pretty(&openapi)?
        }
        Command::QuoteBuy {
            market_id,
            side,
            amount,
        } => {
            let quote = rpc_client.quote_buy(market_id, side, amount).await?;
            serde_json::to_string_pretty(&quote)?
        }
        Command::SetClaimStatus {
            claim_id,
            status,
            description,
        } => {
            let claim = rpc_client
                .set_claim_status(claim_id, status, description)
                .await?;
            serde_json::to_string_pretty(&claim)?
        }
        Command::Stop => {
            let () = rpc_client.stop().await?;
            String::default()
        }
        Command::SubmitClaim { text, author } => {
            let claim = rpc_client.submit_claim(text, author).await?;
            serde_json::to_string_pretty(&claim)?
        }
        Command::WalletLogin { wallet } => {
            let login = rpc_client.wallet_login(wallet).await?;
            serde_json::to_string_pretty(&login)?
        }
    })
}

fn set_tracing_subscriber() -> anyhow::Result<()> {
    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_ansi(std::io::IsTerminal::is_terminal(&std::io::stdout()))
        .with_file(true)
        .with_line_number(true);

    let subscriber = tracing_subscriber::registry().with(stdout_layer);
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<String> {
        if self.verbose {
            set_tracing_subscriber()?;
        }
        let request_id = uuid::Uuid::new_v4().as_simple().to_string();
        tracing::info!(%request_id);
        let builder = HttpClientBuilder::default()
            .request_timeout(Duration::from_secs(self.timeout_secs))
            .set_max_logging_length(1024)
            .set_headers(HeaderMap::from_iter([(
                http::header::HeaderName::from_static("x-request-id"),
                http::header::HeaderValue::from_str(&request_id)?,
            )]));
        let client = builder.build(self.rpc_url()?)?;
        let result = handle_command(&client, self.command).await?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser as _;

    use super::{Cli, Command};

    #[test]
    fn test_parse_buy_shares() {
        let cli = Cli::try_parse_from([
            "claim_markets_app_cli",
            "--rpc-port",
            "7000",
            "buy-shares",
            "4",
            "--wallet",
            "alice",
            "--side",
            "TRUE",
            "--amount",
            "12.5",
        ])
        .unwrap();
        assert_eq!(cli.rpc_port, 7000);
        assert_eq!(cli.rpc_url().unwrap().as_str(), "http://127.0.0.1:7000/");
        match cli.command {
            Command::BuyShares {
                market_id,
                wallet,
                side,
                amount,
            } => {
                assert_eq!(market_id, 4);
                assert_eq!(wallet, "alice");
                assert_eq!(side, "TRUE");
                assert_eq!(amount, "12.5");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_defaults() {
        let cli =
            Cli::try_parse_from(["claim_markets_app_cli", "list-markets"])
                .unwrap();
        assert_eq!(cli.rpc_port, 6060);
        assert_eq!(cli.timeout_secs, 60);
        assert!(!cli.verbose);
    }
}
