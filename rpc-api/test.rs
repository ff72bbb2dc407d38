use chrono::{TimeZone, Utc};
use claim_markets::{
    state::MarketSummary,
    types::{ClaimId, MarketId, VerificationStatusName, WalletAddress},
};
use utoipa::OpenApi as _;

use crate::{MarketInfo, RpcDoc};

#[test]
fn openapi_lists_wire_types() {
    let doc = RpcDoc::openapi();
    let schemas = doc.components.expect("components").schemas;
    for name in ["BuyResponse", "MarketInfo", "FixedDecimal", "ErrorData"] {
        assert!(schemas.contains_key(name), "missing schema {name}");
    }
}

#[test]
fn market_info_serializes_decimals_as_strings() {
    let summary = MarketSummary {
        market_id: MarketId(3),
        creator: WalletAddress::new("creator").unwrap(),
        created_at: Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap(),
        claim_id: ClaimId(9),
        claim_text: "Text".to_owned(),
        claim_slug: "text".to_owned(),
        status: VerificationStatusName::MarketCreated,
        true_remaining: "999999000".parse().unwrap(),
        false_remaining: "1000000000".parse().unwrap(),
        current_true_price: "0.0002".parse().unwrap(),
        current_false_price: "0.0001".parse().unwrap(),
    };
    let json = serde_json::to_value(MarketInfo::from(summary)).unwrap();
    assert_eq!(json["market_id"], 3);
    assert_eq!(json["status"], "market_created");
    assert_eq!(json["true_remaining"], "999999000.00000000");
    assert_eq!(json["current_true_price"], "0.00020000");
    assert_eq!(json["current_false_price"], "0.00010000");
}
