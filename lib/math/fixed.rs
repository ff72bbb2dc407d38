//! Fixed-point decimal amounts.
//!
//! Balances, pool sizes, share counts and costs are [`Decimal`]s pinned to
//! a scale of 8 fractional digits, so that one base unit is `0.00000001`.
//! Results that are not representable at that scale are rounded
//! half-to-even ([`RoundingStrategy::MidpointNearestEven`]).

use std::{fmt, str::FromStr};

use rust_decimal::{
    Decimal, RoundingStrategy,
    prelude::{FromPrimitive as _, ToPrimitive as _},
};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use thiserror::Error;

/// Number of fractional digits carried by every [`FixedDecimal`].
pub const SCALE: u32 = 8;

/// Base units in one whole unit (`10^SCALE`).
pub const UNITS_PER_WHOLE: u64 = 100_000_000;

/// Errors that can occur when building or parsing a [`FixedDecimal`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FixedDecimalError {
    #[error("invalid decimal: {0}")]
    Parse(String),
    #[error("negative values are not allowed")]
    Negative,
    #[error("value has {found} fractional digits (max {SCALE})")]
    TooManyFractionalDigits { found: u32 },
    #[error("value exceeds the maximum representable amount")]
    Overflow,
}

/// `numerator / denominator` rounded half-to-even to an integer. Returns
/// `None` if `denominator` is zero or exceeds the 96-bit decimal mantissa.
pub fn round_half_even(numerator: u128, denominator: u128) -> Option<u128> {
    let quotient = numerator.checked_div(denominator)?;
    let remainder = Decimal::from_u128(numerator % denominator)?;
    let fraction = remainder.checked_div(Decimal::from_u128(denominator)?)?;
    // carry the quotient's parity so a tie resolves towards an even result
    let parity = quotient % 2;
    let step = (Decimal::from_u128(parity)? + fraction)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven)
        .to_u128()?;
    Some(quotient - parity + step)
}

/// Unsigned decimal with exactly [`SCALE`] fractional digits whose base
/// units fit in a `u64`.
///
/// Serialized as a decimal string (`"0.15000000"`) in human-readable
/// formats and as raw base units in binary formats such as bincode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FixedDecimal(Decimal);

impl Default for FixedDecimal {
    fn default() -> Self {
        Self::ZERO
    }
}

impl FixedDecimal {
    pub const ZERO: Self = Self::from_units(0);
    pub const MAX: Self = Self::from_units(u64::MAX);

    #[allow(clippy::cast_possible_truncation)]
    pub const fn from_units(units: u64) -> Self {
        Self(Decimal::from_parts(
            units as u32,
            (units >> 32) as u32,
            0,
            false,
            SCALE,
        ))
    }

    pub fn units(self) -> u64 {
        // scale is pinned, so the mantissa is the unit count
        self.0.mantissa().to_u64().unwrap_or(u64::MAX)
    }

    /// Build from a whole number of units, e.g. `from_whole(1000)` is
    /// `1000.00000000`.
    pub fn from_whole(whole: u64) -> Result<Self, FixedDecimalError> {
        whole
            .checked_mul(UNITS_PER_WHOLE)
            .map(Self::from_units)
            .ok_or(FixedDecimalError::Overflow)
    }

    /// Pin `value` to the fixed scale. Trailing zeros beyond the scale are
    /// accepted; any other extra precision is an error.
    pub fn from_decimal(value: Decimal) -> Result<Self, FixedDecimalError> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(FixedDecimalError::Negative);
        }
        let normalized = value.normalize();
        if normalized.scale() > SCALE {
            return Err(FixedDecimalError::TooManyFractionalDigits {
                found: normalized.scale(),
            });
        }
        if normalized > Self::MAX.0 {
            return Err(FixedDecimalError::Overflow);
        }
        let mut pinned = normalized.abs();
        pinned.rescale(SCALE);
        Ok(Self(pinned))
    }

    pub fn as_decimal(self) -> Decimal {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.units().checked_add(rhs.units()).map(Self::from_units)
    }

    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.units().checked_sub(rhs.units()).map(Self::from_units)
    }
}

impl fmt::Display for FixedDecimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for FixedDecimal {
    type Err = FixedDecimalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = Decimal::from_str(s.trim())
            .map_err(|err| FixedDecimalError::Parse(err.to_string()))?;
        Self::from_decimal(value)
    }
}

impl Serialize for FixedDecimal {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if serializer.is_human_readable() {
            rust_decimal::serde::str::serialize(&self.0, serializer)
        } else {
            serializer.serialize_u64(self.units())
        }
    }
}

impl<'de> Deserialize<'de> for FixedDecimal {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        if deserializer.is_human_readable() {
            let value = rust_decimal::serde::str::deserialize(deserializer)?;
            Self::from_decimal(value).map_err(de::Error::custom)
        } else {
            u64::deserialize(deserializer).map(Self::from_units)
        }
    }
}

impl utoipa::PartialSchema for FixedDecimal {
    fn schema() -> utoipa::openapi::RefOr<utoipa::openapi::schema::Schema> {
        let object = utoipa::openapi::ObjectBuilder::new()
            .schema_type(utoipa::openapi::schema::Type::String)
            .pattern(Some(r"^\d+\.\d{8}$"))
            .description(Some("Decimal amount with exactly 8 fractional digits"))
            .build();
        utoipa::openapi::RefOr::T(utoipa::openapi::schema::Schema::Object(
            object,
        ))
    }
}

impl utoipa::ToSchema for FixedDecimal {
    fn name() -> std::borrow::Cow<'static, str> {
        std::borrow::Cow::Borrowed("FixedDecimal")
    }
}
