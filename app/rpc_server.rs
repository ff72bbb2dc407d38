use std::net::SocketAddr;

use claim_markets::{
    node::{self, Node},
    state::{self, ErrorKind},
    validation::RequestValidator,
};
use claim_markets_app_rpc_api::{
    BuyResponse, ClaimInfo, CreateMarketResponse, ErrorData, LoginResponse,
    MarketInfo, PositionInfo, QuoteResponse, RpcServer, UserInfo,
};
use jsonrpsee::{
    core::{RpcResult, async_trait},
    server::{RpcServiceBuilder, Server},
    types::ErrorObject,
};
use tower_http::{
    request_id::{
        MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
    },
    trace::{DefaultOnFailure, DefaultOnResponse, TraceLayer},
};

use crate::app::App;

/// Map an engine error to a JSON-RPC error carrying its stable code.
fn custom_err(error: node::Error) -> ErrorObject<'static> {
    let kind = error.kind();
    let message = format!("{:#}", anyhow::Error::from(error));
    match kind {
        ErrorKind::InternalState | ErrorKind::Storage => {
            tracing::error!(%kind, error = %message, "request failed");
        }
        _ => {
            tracing::warn!(%kind, error = %message, "request rejected");
        }
    }
    let data = ErrorData {
        kind: kind.to_string(),
        http_status: kind.http_status(),
    };
    ErrorObject::owned(kind.code(), message, Some(data))
}

fn invalid(error: state::Error) -> ErrorObject<'static> {
    custom_err(error.into())
}

pub struct RpcServerImpl {
    app: App,
}

impl RpcServerImpl {
    #[inline(always)]
    fn node(&self) -> &Node {
        &self.app.node
    }
}

#[async_trait]
impl RpcServer for RpcServerImpl {
    async fn buy_shares(
        &self,
        market_id: u64,
        wallet_address: String,
        side: String,
        amount: String,
    ) -> RpcResult<BuyResponse> {
        let market_id =
            RequestValidator::parse_market_id(market_id).map_err(invalid)?;
        let wallet =
            RequestValidator::parse_wallet(&wallet_address).map_err(invalid)?;
        let side = RequestValidator::parse_side(&side).map_err(invalid)?;
        let shares = RequestValidator::parse_amount(&amount).map_err(invalid)?;
        let receipt = self
            .node()
            .buy_shares(&wallet, market_id, side, shares)
            .map_err(custom_err)?;
        Ok(receipt.into())
    }

    async fn create_market(
        &self,
        claim_id: u64,
        wallet_address: String,
    ) -> RpcResult<CreateMarketResponse> {
        let claim_id =
            RequestValidator::parse_claim_id(claim_id).map_err(invalid)?;
        let requester =
            RequestValidator::parse_wallet(&wallet_address).map_err(invalid)?;
        let created = self
            .node()
            .create_market(claim_id, &requester)
            .map_err(custom_err)?;
        Ok(CreateMarketResponse::from(&created))
    }

    async fn get_claim(&self, claim_id: u64) -> RpcResult<ClaimInfo> {
        let claim_id =
            RequestValidator::parse_claim_id(claim_id).map_err(invalid)?;
        let claim = self.node().get_claim(claim_id).map_err(custom_err)?;
        Ok(claim.into())
    }

    async fn get_user(&self, wallet_address: String) -> RpcResult<UserInfo> {
        let wallet =
            RequestValidator::parse_wallet(&wallet_address).map_err(invalid)?;
        let account = self.node().get_user(&wallet).map_err(custom_err)?;
        Ok(account.into())
    }

    async fn list_markets(&self) -> RpcResult<Vec<MarketInfo>> {
        let markets = self.node().list_markets().map_err(custom_err)?;
        Ok(markets.into_iter().map(MarketInfo::from).collect())
    }

    async fn my_positions(
        &self,
        wallet_address: String,
    ) -> RpcResult<Vec<PositionInfo>> {
        let wallet =
            RequestValidator::parse_wallet(&wallet_address).map_err(invalid)?;
        let positions =
            self.node().user_positions(&wallet).map_err(custom_err)?;
        Ok(positions.into_iter().map(PositionInfo::from).collect())
    }

    async fn openapi_schema(&self) -> RpcResult<utoipa::openapi::OpenApi> {
        let res =
            <claim_markets_app_rpc_api::RpcDoc as utoipa::OpenApi>::openapi();
        Ok(res)
    }

    async fn quote_buy(
        &self,
        market_id: u64,
        side: String,
        amount: String,
    ) -> RpcResult<QuoteResponse> {
        let market_id =
            RequestValidator::parse_market_id(market_id).map_err(invalid)?;
        let side = RequestValidator::parse_side(&side).map_err(invalid)?;
        let shares = RequestValidator::parse_amount(&amount).map_err(invalid)?;
        let quote = self
            .node()
            .quote_buy(market_id, side, shares)
            .map_err(custom_err)?;
        Ok(quote.into())
    }

    async fn set_claim_status(
        &self,
        claim_id: u64,
        status: String,
        description: Option<String>,
    ) -> RpcResult<ClaimInfo> {
        let claim_id =
            RequestValidator::parse_claim_id(claim_id).map_err(invalid)?;
        let status = RequestValidator::parse_status(&status).map_err(invalid)?;
        let claim = self
            .node()
            .set_claim_status(claim_id, status, description)
            .map_err(custom_err)?;
        Ok(claim.into())
    }

    async fn stop(&self) {
        std::process::exit(0);
    }

    async fn submit_claim(
        &self,
        text: String,
        author: String,
    ) -> RpcResult<ClaimInfo> {
        RequestValidator::validate_claim_text(&text).map_err(invalid)?;
        let author = RequestValidator::parse_wallet(&author).map_err(invalid)?;
        let claim =
            self.node().submit_claim(text, author).map_err(custom_err)?;
        Ok(claim.into())
    }

    async fn wallet_login(
        &self,
        wallet_address: String,
    ) -> RpcResult<LoginResponse> {
        let wallet =
            RequestValidator::parse_wallet(&wallet_address).map_err(invalid)?;
        let (account, is_new) =
            self.node().wallet_login(&wallet).map_err(custom_err)?;
        Ok(LoginResponse {
            user: account.into(),
            is_new,
        })
    }
}

#[derive(Clone, Debug)]
struct RequestIdMaker;

impl MakeRequestId for RequestIdMaker {
    fn make_request_id<B>(
        &mut self,
        _: &http::Request<B>,
    ) -> Option<RequestId> {
        use uuid::Uuid;
        let id = Uuid::new_v4();
        let id = id.as_simple();
        let id = format!("req_{id}");

        let Ok(header_value) = http::HeaderValue::from_str(&id) else {
            return None;
        };

        Some(RequestId::new(header_value))
    }
}

pub async fn run_server(
    app: App,
    rpc_addr: SocketAddr,
) -> anyhow::Result<SocketAddr> {
    const REQUEST_ID_HEADER: &str = "x-request-id";

    let tracer = tower::ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(
            http::HeaderName::from_static(REQUEST_ID_HEADER),
            RequestIdMaker,
        ))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(move |request: &http::Request<_>| {
                    let request_id = request
                        .headers()
                        .get(http::HeaderName::from_static(REQUEST_ID_HEADER))
                        .and_then(|h| h.to_str().ok())
                        .filter(|s| !s.is_empty());

                    tracing::span!(
                        tracing::Level::DEBUG,
                        "request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id,
                    )
                })
                .on_request(())
                .on_eos(())
                .on_response(
                    DefaultOnResponse::new().level(tracing::Level::INFO),
                )
                .on_failure(
                    DefaultOnFailure::new().level(tracing::Level::ERROR),
                ),
        )
        .layer(PropagateRequestIdLayer::new(http::HeaderName::from_static(
            REQUEST_ID_HEADER,
        )))
        .into_inner();

    let http_middleware = tower::ServiceBuilder::new().layer(tracer);
    let rpc_middleware = RpcServiceBuilder::new().rpc_logger(1024);

    let server = Server::builder()
        .set_http_middleware(http_middleware)
        .set_rpc_middleware(rpc_middleware)
        .build(rpc_addr)
        .await?;

    let addr = server.local_addr()?;
    let handle = server.start(RpcServerImpl { app }.into_rpc());

    tokio::spawn(handle.stopped());

    Ok(addr)
}

#[cfg(test)]
mod tests {
    use claim_markets::{
        node::Node,
        state::MarketConfig,
        types::{VerificationStatusName, WalletAddress},
    };
    use claim_markets_app_rpc_api::{ErrorData, RpcServer as _};
    use jsonrpsee::types::ErrorObject;
    use tempfile::TempDir;

    use super::RpcServerImpl;
    use crate::app::App;

    fn server() -> (TempDir, RpcServerImpl) {
        let dir = TempDir::new().unwrap();
        let node = Node::new(dir.path(), MarketConfig::default()).unwrap();
        (dir, RpcServerImpl { app: App { node } })
    }

    fn error_data(err: &ErrorObject<'_>) -> ErrorData {
        serde_json::from_str(err.data().unwrap().get()).unwrap()
    }

    #[tokio::test]
    async fn test_malformed_fields_are_validation_errors() {
        let (_dir, server) = server();
        let err = server
            .buy_shares(1, "alice".to_owned(), "MAYBE".to_owned(), "1".to_owned())
            .await
            .unwrap_err();
        assert_eq!(err.code(), 1400);
        let data = error_data(&err);
        assert_eq!(data.kind, "validation");
        assert_eq!(data.http_status, 400);

        let err = server
            .quote_buy(1, "TRUE".to_owned(), "1.123456789".to_owned())
            .await
            .unwrap_err();
        assert_eq!(err.code(), 1400);
        let err = server.wallet_login("   ".to_owned()).await.unwrap_err();
        assert_eq!(err.code(), 1400);
    }

    #[tokio::test]
    async fn test_buy_flow_over_rpc() {
        let (_dir, server) = server();
        let claim = server
            .submit_claim("Launch slips".to_owned(), "author".to_owned())
            .await
            .unwrap();
        let err = server
            .create_market(claim.claim_id.0, "author".to_owned())
            .await
            .unwrap_err();
        assert_eq!(err.code(), 1412);
        assert_eq!(error_data(&err).kind, "precondition");

        server
            .set_claim_status(
                claim.claim_id.0,
                VerificationStatusName::AiReviewed.to_string(),
                None,
            )
            .await
            .unwrap();
        let created = server
            .create_market(claim.claim_id.0, "author".to_owned())
            .await
            .unwrap();
        assert_eq!(created.claim_slug, "launch-slips");

        let err = server
            .buy_shares(
                created.market_id.0,
                "alice".to_owned(),
                "TRUE".to_owned(),
                "1000".to_owned(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), 1404);

        let login = server.wallet_login("alice".to_owned()).await.unwrap();
        assert!(login.is_new);
        let bought = server
            .buy_shares(
                created.market_id.0,
                "alice".to_owned(),
                "TRUE".to_owned(),
                "1000".to_owned(),
            )
            .await
            .unwrap();
        assert_eq!(bought.total_cost.to_string(), "0.15000000");

        let positions = server.my_positions("alice".to_owned()).await.unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].claim_slug, "launch-slips");
        let user = server.get_user("alice".to_owned()).await.unwrap();
        assert_eq!(user.wallet_address, WalletAddress::new("alice").unwrap());
        assert_eq!(user.balance.to_string(), "999.85000000");

        let err = server
            .buy_shares(
                created.market_id.0,
                "alice".to_owned(),
                "FALSE".to_owned(),
                "1".to_owned(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), 1409);
        assert_eq!(error_data(&err).http_status, 400);
    }
}
