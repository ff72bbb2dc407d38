//! Parsing of untyped request fields into engine types.
//!
//! Everything that arrives as text over the API goes through here, so a
//! malformed field surfaces as [`Error::Validation`] rather than a transport
//! error.

use crate::{
    state::Error,
    types::{
        ClaimId, FixedDecimal, MarketId, Side, VerificationStatusName,
        WalletAddress,
    },
};

/// Maximum accepted length of a claim text, in characters
pub const MAX_CLAIM_TEXT_LEN: usize = 2_000;

pub struct RequestValidator;

impl RequestValidator {
    pub fn parse_wallet(wallet: &str) -> Result<WalletAddress, Error> {
        WalletAddress::new(wallet).map_err(|err| Error::validation(err.to_string()))
    }

    /// Sides are case-sensitive: `TRUE` or `FALSE`.
    pub fn parse_side(side: &str) -> Result<Side, Error> {
        side.parse().map_err(|_| {
            Error::validation(format!(
                "side must be TRUE or FALSE, got `{side}`"
            ))
        })
    }

    /// Parse a strictly positive share amount with at most 8 fractional
    /// digits.
    pub fn parse_amount(amount: &str) -> Result<FixedDecimal, Error> {
        let amount: FixedDecimal = amount
            .trim()
            .parse()
            .map_err(|err| Error::validation(format!("invalid amount: {err}")))?;
        if amount.is_zero() {
            return Err(Error::validation("amount must be greater than zero"));
        }
        Ok(amount)
    }

    pub fn parse_status(status: &str) -> Result<VerificationStatusName, Error> {
        status.parse().map_err(|_| {
            Error::validation(format!("unknown verification status `{status}`"))
        })
    }

    pub fn validate_claim_text(text: &str) -> Result<(), Error> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(Error::validation("claim text must not be empty"));
        }
        let len = trimmed.chars().count();
        if len > MAX_CLAIM_TEXT_LEN {
            return Err(Error::validation(format!(
                "claim text is {len} characters, limit is {MAX_CLAIM_TEXT_LEN}"
            )));
        }
        Ok(())
    }

    pub fn parse_market_id(market_id: u64) -> Result<MarketId, Error> {
        if market_id == 0 {
            return Err(Error::validation("market id must be positive"));
        }
        Ok(MarketId(market_id))
    }

    pub fn parse_claim_id(claim_id: u64) -> Result<ClaimId, Error> {
        if claim_id == 0 {
            return Err(Error::validation("claim id must be positive"));
        }
        Ok(ClaimId(claim_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ErrorKind;

    #[test]
    fn test_parse_side() {
        assert_eq!(RequestValidator::parse_side("TRUE").unwrap(), Side::True);
        assert_eq!(RequestValidator::parse_side("FALSE").unwrap(), Side::False);
        for bad in ["", "true", "YES", "TRUE "] {
            let err = RequestValidator::parse_side(bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation, "{bad:?}");
        }
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(
            RequestValidator::parse_amount("1000").unwrap(),
            FixedDecimal::from_units(1_000 * 100_000_000)
        );
        assert_eq!(
            RequestValidator::parse_amount("0.00000001").unwrap(),
            FixedDecimal::from_units(1)
        );
        for bad in ["0", "0.0", "-5", "abc", "", "0.000000001", "NaN", "1.2.3"] {
            let err = RequestValidator::parse_amount(bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation, "{bad:?}");
        }
    }

    #[test]
    fn test_parse_wallet_and_status() {
        assert!(RequestValidator::parse_wallet("  ").is_err());
        assert_eq!(
            RequestValidator::parse_wallet("wallet1").unwrap().as_str(),
            "wallet1"
        );
        assert_eq!(
            RequestValidator::parse_status("ai_reviewed").unwrap(),
            VerificationStatusName::AiReviewed
        );
        assert!(RequestValidator::parse_status("approved").is_err());
    }

    #[test]
    fn test_claim_text_limits() {
        assert!(RequestValidator::validate_claim_text("ok").is_ok());
        assert!(RequestValidator::validate_claim_text(" \n ").is_err());
        let long = "x".repeat(MAX_CLAIM_TEXT_LEN + 1);
        assert!(RequestValidator::validate_claim_text(&long).is_err());
    }

    #[test]
    fn test_ids_must_be_positive() {
        assert!(RequestValidator::parse_market_id(0).is_err());
        assert_eq!(RequestValidator::parse_claim_id(3).unwrap(), ClaimId(3));
    }
}
