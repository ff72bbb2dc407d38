use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};
use utoipa::ToSchema;

pub use crate::math::fixed::FixedDecimal;

/// Maximum length of a generated claim slug
pub const MAX_SLUG_LEN: usize = 150;

#[derive(
    Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd,
    Serialize,
)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

/// Version of the persisted state layout
pub const VERSION: Version = Version {
    major: 0,
    minor: 3,
    patch: 0,
};

macro_rules! sequential_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone,
            Copy,
            Debug,
            Deserialize,
            Eq,
            Hash,
            Ord,
            PartialEq,
            PartialOrd,
            Serialize,
            ToSchema,
        )]
        #[repr(transparent)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            pub fn next(self) -> Self {
                Self(self.0 + 1)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse().map(Self)
            }
        }
    };
}

sequential_id!(
    /// Unique identifier for a claim
    ClaimId
);
sequential_id!(
    /// Unique identifier for a market
    MarketId
);
sequential_id!(
    /// Unique identifier for a market position
    PositionId
);

#[derive(Debug, thiserror::Error)]
#[error("wallet address must not be empty")]
pub struct EmptyWalletAddress;

/// Wallet identity of a user. Authentication happens upstream; here it is
/// an opaque, non-empty string.
#[derive(
    Clone,
    Debug,
    Deserialize,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
    ToSchema,
)]
#[repr(transparent)]
#[serde(transparent)]
pub struct WalletAddress(String);

impl WalletAddress {
    pub fn new(address: impl Into<String>) -> Result<Self, EmptyWalletAddress> {
        let address = address.into().trim().to_owned();
        if address.is_empty() {
            return Err(EmptyWalletAddress);
        }
        Ok(Self(address))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for WalletAddress {
    type Err = EmptyWalletAddress;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Outcome side of a binary claim market
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
    Eq,
    Hash,
    IntoStaticStr,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
    ToSchema,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum Side {
    True,
    False,
}

/// Names of the rows in the verification status reference table
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
    Eq,
    Hash,
    IntoStaticStr,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
    ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum VerificationStatusName {
    Unverified,
    PendingAiReview,
    MarketCreated,
    AiReviewed,
    UserApproved,
    AiVariantsGenerated,
    ValidatorReview,
    ApprovedForBlockchain,
    Published,
    Rejected,
}

impl VerificationStatusName {
    /// Statuses from which a market may be opened
    pub fn is_ai_verified(self) -> bool {
        matches!(self, Self::AiReviewed | Self::AiVariantsGenerated)
    }

    pub fn default_description(self) -> &'static str {
        match self {
            Self::Unverified => "Default status when claim is first submitted.",
            Self::PendingAiReview => "Claim is undergoing checks by AI.",
            Self::MarketCreated => "A market has been opened for the claim.",
            Self::AiReviewed => "AI has reviewed and approved the claim.",
            Self::UserApproved => {
                "User has selected and approved a claim variant."
            }
            Self::AiVariantsGenerated => {
                "AI has generated variants of the claim."
            }
            Self::ValidatorReview => "Validators are reviewing the claim.",
            Self::ApprovedForBlockchain => {
                "Claim is approved and ready for the blockchain."
            }
            Self::Published => "Claim is live on the blockchain.",
            Self::Rejected => {
                "Claim has been rejected and will not proceed."
            }
        }
    }
}

/// URL slug of a claim text: lowercase ASCII alphanumerics separated by
/// single hyphens, truncated to [`MAX_SLUG_LEN`].
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len().min(MAX_SLUG_LEN));
    let mut pending_hyphen = false;
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else if c.is_whitespace() || c == '-' || c == '_' {
            pending_hyphen = true;
        }
        if slug.len() >= MAX_SLUG_LEN {
            break;
        }
    }
    slug.truncate(MAX_SLUG_LEN);
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Content fingerprint of a claim text: blake3 over the lowercase
/// alphanumeric characters, hex-encoded.
pub fn fingerprint(text: &str) -> String {
    let normalized: String = text
        .chars()
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_alphanumeric())
        .collect();
    hex::encode(blake3::hash(normalized.as_bytes()).as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_parsing() {
        assert_eq!("TRUE".parse::<Side>().unwrap(), Side::True);
        assert_eq!("FALSE".parse::<Side>().unwrap(), Side::False);
        assert!("true".parse::<Side>().is_err());
        assert!("MAYBE".parse::<Side>().is_err());
        assert_eq!(Side::True.to_string(), "TRUE");
        assert_eq!(serde_json::to_string(&Side::False).unwrap(), "\"FALSE\"");
    }

    #[test]
    fn test_status_names() {
        assert_eq!(
            "ai_variants_generated"
                .parse::<VerificationStatusName>()
                .unwrap(),
            VerificationStatusName::AiVariantsGenerated
        );
        assert_eq!(
            VerificationStatusName::MarketCreated.to_string(),
            "market_created"
        );
        assert!(VerificationStatusName::AiReviewed.is_ai_verified());
        assert!(!VerificationStatusName::PendingAiReview.is_ai_verified());
        assert!(!VerificationStatusName::MarketCreated.is_ai_verified());
    }

    #[test]
    fn test_wallet_address_rejects_blank() {
        assert!(WalletAddress::new("   ").is_err());
        assert_eq!(WalletAddress::new(" abc ").unwrap().as_str(), "abc");
    }

    #[test]
    fn test_slugify() {
        assert_eq!(
            slugify("The Fed will cut rates in 2025!"),
            "the-fed-will-cut-rates-in-2025"
        );
        assert_eq!(slugify("  --Hello__World--  "), "hello-world");
        assert_eq!(slugify("!!!"), "");
        let long = "a ".repeat(200);
        let slug = slugify(&long);
        assert!(slug.len() <= MAX_SLUG_LEN);
        assert!(!slug.ends_with('-'));
    }

    #[test]
    fn test_fingerprint_ignores_case_and_punctuation() {
        assert_eq!(
            fingerprint("The sky is blue."),
            fingerprint("the SKY is   blue")
        );
        assert_ne!(fingerprint("The sky is blue"), fingerprint("The sky is red"));
    }
}
