//! RPC API

use chrono::{DateTime, Utc};
use claim_markets::{
    state::{
        BuyReceipt, Claim, Market, MarketSummary, PositionSummary, Quote,
        UserAccount,
    },
    types::{
        ClaimId, FixedDecimal, MarketId, PositionId, Side,
        VerificationStatusName, WalletAddress,
    },
};
use jsonrpsee::{core::RpcResult, proc_macros::rpc};
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};

#[cfg(test)]
mod test;

/// `data` member of every engine error object
#[derive(Clone, Debug, Deserialize, Serialize, ToSchema)]
pub struct ErrorData {
    /// Error class, e.g. `insufficient_funds`
    pub kind: String,
    /// Status code of the equivalent HTTP response
    pub http_status: u16,
}

#[derive(Clone, Debug, Deserialize, Serialize, ToSchema)]
pub struct CreateMarketResponse {
    pub market_id: MarketId,
    pub claim_slug: String,
}

impl From<&(Market, Claim)> for CreateMarketResponse {
    fn from((market, claim): &(Market, Claim)) -> Self {
        Self {
            market_id: market.id,
            claim_slug: claim.slug.clone(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, ToSchema)]
pub struct MarketInfo {
    pub market_id: MarketId,
    pub creator: WalletAddress,
    pub created_at: DateTime<Utc>,
    pub claim_id: ClaimId,
    pub claim_text: String,
    pub claim_slug: String,
    pub status: VerificationStatusName,
    pub true_remaining: FixedDecimal,
    pub false_remaining: FixedDecimal,
    pub current_true_price: FixedDecimal,
    pub current_false_price: FixedDecimal,
}

impl From<MarketSummary> for MarketInfo {
    fn from(summary: MarketSummary) -> Self {
        Self {
            market_id: summary.market_id,
            creator: summary.creator,
            created_at: summary.created_at,
            claim_id: summary.claim_id,
            claim_text: summary.claim_text,
            claim_slug: summary.claim_slug,
            status: summary.status,
            true_remaining: summary.true_remaining,
            false_remaining: summary.false_remaining,
            current_true_price: summary.current_true_price,
            current_false_price: summary.current_false_price,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, ToSchema)]
pub struct BuyResponse {
    pub position_id: PositionId,
    pub side: Side,
    pub shares_bought: FixedDecimal,
    pub total_cost: FixedDecimal,
    pub new_total_shares: FixedDecimal,
    pub cost_basis: FixedDecimal,
    pub remaining_true: FixedDecimal,
    pub remaining_false: FixedDecimal,
    pub updated_balance: FixedDecimal,
}

impl From<BuyReceipt> for BuyResponse {
    fn from(receipt: BuyReceipt) -> Self {
        Self {
            position_id: receipt.position_id,
            side: receipt.side,
            shares_bought: receipt.shares_bought,
            total_cost: receipt.total_cost,
            new_total_shares: receipt.new_total_shares,
            cost_basis: receipt.cost_basis,
            remaining_true: receipt.remaining_true,
            remaining_false: receipt.remaining_false,
            updated_balance: receipt.updated_balance,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, ToSchema)]
pub struct QuoteResponse {
    pub side: Side,
    pub amount: FixedDecimal,
    pub current_price: FixedDecimal,
    pub cost: FixedDecimal,
    pub remaining: FixedDecimal,
}

impl From<Quote> for QuoteResponse {
    fn from(quote: Quote) -> Self {
        Self {
            side: quote.side,
            amount: quote.shares,
            current_price: quote.current_price,
            cost: quote.cost,
            remaining: quote.remaining,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, ToSchema)]
pub struct UserInfo {
    pub wallet_address: WalletAddress,
    pub balance: FixedDecimal,
    pub verification_status: VerificationStatusName,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserAccount> for UserInfo {
    fn from(account: UserAccount) -> Self {
        Self {
            wallet_address: account.wallet_address,
            balance: account.balance,
            verification_status: account.verification_status,
            created_at: account.created_at,
            updated_at: account.updated_at,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, ToSchema)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub user: UserInfo,
    /// `true` if the account was created by this login
    pub is_new: bool,
}

#[derive(Clone, Debug, Deserialize, Serialize, ToSchema)]
pub struct PositionInfo {
    pub position_id: PositionId,
    pub market_id: MarketId,
    pub claim_id: ClaimId,
    pub claim_text: String,
    pub claim_slug: String,
    pub side: Side,
    pub shares: FixedDecimal,
    pub cost_basis: FixedDecimal,
    pub current_price: FixedDecimal,
}

impl From<PositionSummary> for PositionInfo {
    fn from(summary: PositionSummary) -> Self {
        Self {
            position_id: summary.position_id,
            market_id: summary.market_id,
            claim_id: summary.claim_id,
            claim_text: summary.claim_text,
            claim_slug: summary.claim_slug,
            side: summary.side,
            shares: summary.shares,
            cost_basis: summary.cost_basis,
            current_price: summary.current_price,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, ToSchema)]
pub struct ClaimInfo {
    pub claim_id: ClaimId,
    pub text: String,
    pub slug: String,
    pub fingerprint: String,
    pub author: WalletAddress,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub verification_status: VerificationStatusName,
    pub status_description: Option<String>,
}

impl From<Claim> for ClaimInfo {
    fn from(claim: Claim) -> Self {
        Self {
            claim_id: claim.id,
            text: claim.text,
            slug: claim.slug,
            fingerprint: claim.fingerprint,
            author: claim.author,
            created_at: claim.created_at,
            updated_at: claim.updated_at,
            verification_status: claim.verification_status,
            status_description: claim.status_description,
        }
    }
}

/// OpenAPI document of the RPC wire types
#[derive(OpenApi)]
#[openapi(
    info(title = "Claim markets RPC"),
    components(schemas(
        BuyResponse,
        ClaimInfo,
        CreateMarketResponse,
        ErrorData,
        LoginResponse,
        MarketInfo,
        PositionInfo,
        QuoteResponse,
        UserInfo,
    ))
)]
pub struct RpcDoc;

/// Amounts and sides are taken as strings and validated by the server, so
/// malformed values fail with the engine's validation error code.
#[rpc(client, server)]
pub trait Rpc {
    /// Buy shares of one side of a market
    #[method(name = "buy_shares")]
    async fn buy_shares(
        &self,
        market_id: u64,
        wallet_address: String,
        side: String,
        amount: String,
    ) -> RpcResult<BuyResponse>;

    /// Create the market for an AI-verified claim
    #[method(name = "create_market")]
    async fn create_market(
        &self,
        claim_id: u64,
        wallet_address: String,
    ) -> RpcResult<CreateMarketResponse>;

    #[method(name = "get_claim")]
    async fn get_claim(&self, claim_id: u64) -> RpcResult<ClaimInfo>;

    #[method(name = "get_user")]
    async fn get_user(&self, wallet_address: String) -> RpcResult<UserInfo>;

    /// List all markets, newest first
    #[method(name = "list_markets")]
    async fn list_markets(&self) -> RpcResult<Vec<MarketInfo>>;

    /// Positions held by a wallet
    #[method(name = "my_positions")]
    async fn my_positions(
        &self,
        wallet_address: String,
    ) -> RpcResult<Vec<PositionInfo>>;

    /// Get OpenAPI schema
    #[method(name = "openapi_schema")]
    async fn openapi_schema(&self) -> RpcResult<utoipa::openapi::OpenApi>;

    /// Price a purchase without executing it
    #[method(name = "quote_buy")]
    async fn quote_buy(
        &self,
        market_id: u64,
        side: String,
        amount: String,
    ) -> RpcResult<QuoteResponse>;

    /// Move a claim to another verification status
    #[method(name = "set_claim_status")]
    async fn set_claim_status(
        &self,
        claim_id: u64,
        status: String,
        description: Option<String>,
    ) -> RpcResult<ClaimInfo>;

    /// Stop the node
    #[method(name = "stop")]
    async fn stop(&self);

    /// Submit a claim for review
    #[method(name = "submit_claim")]
    async fn submit_claim(
        &self,
        text: String,
        author: String,
    ) -> RpcResult<ClaimInfo>;

    /// Get or create the account of a wallet
    #[method(name = "wallet_login")]
    async fn wallet_login(
        &self,
        wallet_address: String,
    ) -> RpcResult<LoginResponse>;
}
