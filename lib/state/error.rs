//! State errors

use sneed::{db::error as db, env::error as env, rwtxn::error as rwtxn};
use thiserror::Error;
use transitive::Transitive;

use crate::{
    math::bonding_curve::BondingCurveError,
    types::{
        ClaimId, FixedDecimal, MarketId, Side, VerificationStatusName,
        WalletAddress,
    },
};

/// Classification of [`Error`]s with stable codes, used by the RPC layer
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Forbidden,
    InsufficientFunds,
    InsufficientShares,
    Precondition,
    InternalState,
    Storage,
}

impl ErrorKind {
    pub fn code(self) -> i32 {
        match self {
            Self::Validation => 1400,
            Self::Forbidden => 1403,
            Self::NotFound => 1404,
            Self::Conflict => 1409,
            Self::InsufficientFunds => 1410,
            Self::InsufficientShares => 1411,
            Self::Precondition => 1412,
            Self::InternalState => 1500,
            Self::Storage => 1501,
        }
    }

    /// Status code of the equivalent HTTP response
    pub fn http_status(self) -> u16 {
        match self {
            Self::Validation
            | Self::Conflict
            | Self::InsufficientFunds
            | Self::InsufficientShares
            | Self::Precondition => 400,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::InternalState | Self::Storage => 500,
        }
    }
}

#[derive(Debug, Error, Transitive)]
#[transitive(from(db::Delete, db::Error))]
#[transitive(from(db::Error, sneed::Error))]
#[transitive(from(db::IterInit, db::Error))]
#[transitive(from(db::IterItem, db::Error))]
#[transitive(from(db::Put, db::Error))]
#[transitive(from(db::TryGet, db::Error))]
#[transitive(from(env::CreateDb, env::Error))]
#[transitive(from(env::Error, sneed::Error))]
#[transitive(from(env::ReadTxn, env::Error))]
#[transitive(from(env::WriteTxn, env::Error))]
#[transitive(from(rwtxn::Commit, rwtxn::Error))]
#[transitive(from(rwtxn::Error, sneed::Error))]
pub enum Error {
    #[error("invalid request: {reason}")]
    Validation { reason: String },
    #[error(transparent)]
    BondingCurve(#[from] BondingCurveError),

    #[error("claim {claim_id} not found")]
    ClaimNotFound { claim_id: ClaimId },
    #[error("market {market_id} not found")]
    MarketNotFound { market_id: MarketId },
    #[error("user {wallet} not found")]
    UserNotFound { wallet: WalletAddress },

    #[error("market {market_id} already exists for claim {claim_id}")]
    MarketExists {
        claim_id: ClaimId,
        market_id: MarketId,
    },
    #[error(
        "already holding {held} in market {market_id}; opposite side held, no sell path exists to exit it"
    )]
    OppositeSideHeld { market_id: MarketId, held: Side },

    #[error(
        "only the claim's author can create a market within {window_mins} minutes of submission"
    )]
    ExclusivityWindow { claim_id: ClaimId, window_mins: i64 },

    #[error("insufficient balance: cost {required}, available {available}")]
    InsufficientFunds {
        required: FixedDecimal,
        available: FixedDecimal,
    },
    #[error(
        "not enough {side} shares available: requested {requested}, remaining {remaining}"
    )]
    InsufficientShares {
        side: Side,
        requested: FixedDecimal,
        remaining: FixedDecimal,
    },

    #[error(
        "claim {claim_id} must be AI-verified before market creation (status: {status})"
    )]
    ClaimNotVerified {
        claim_id: ClaimId,
        status: VerificationStatusName,
    },

    #[error("required verification status `{name}` is missing")]
    MissingVerificationStatus { name: VerificationStatusName },
    #[error("ledger inconsistency: {0}")]
    LedgerInconsistency(String),

    #[error(transparent)]
    Db(#[from] sneed::Error),
}

impl Error {
    pub(crate) fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::BondingCurve(BondingCurveError::NonPositiveDelta)
            | Self::BondingCurve(BondingCurveError::Overflow) => {
                ErrorKind::Validation
            }
            Self::BondingCurve(
                BondingCurveError::RemainingExceedsPool { .. },
            ) => ErrorKind::InternalState,
            Self::ClaimNotFound { .. }
            | Self::MarketNotFound { .. }
            | Self::UserNotFound { .. } => ErrorKind::NotFound,
            Self::MarketExists { .. } | Self::OppositeSideHeld { .. } => {
                ErrorKind::Conflict
            }
            Self::ExclusivityWindow { .. } => ErrorKind::Forbidden,
            Self::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            Self::InsufficientShares { .. } => ErrorKind::InsufficientShares,
            Self::ClaimNotVerified { .. } => ErrorKind::Precondition,
            Self::MissingVerificationStatus { .. }
            | Self::LedgerInconsistency(_) => ErrorKind::InternalState,
            Self::Db(_) => ErrorKind::Storage,
        }
    }
}
