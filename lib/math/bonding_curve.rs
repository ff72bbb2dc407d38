//! Linear bonding curve pricing.
//!
//! The price of one share grows linearly with the number of shares already
//! sold on a side:
//!
//! ```text
//! x     = initial_pool - side_remaining
//! price = base_price + slope * x
//! cost  = base_price * delta + (slope / 2) * ((x + delta)^2 - x^2)
//! ```
//!
//! `cost` is the closed-form integral of `price` over `[x, x + delta]`.
//! Both quantities are evaluated exactly on base units and rounded once,
//! half-to-even, to 8 fractional digits.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::math::fixed::{FixedDecimal, UNITS_PER_WHOLE, round_half_even};

/// `0.0001`
pub const BASE_PRICE: FixedDecimal = FixedDecimal::from_units(10_000);
/// `0.0000001`
pub const SLOPE: FixedDecimal = FixedDecimal::from_units(10);
/// `1_000_000_000` shares per side
pub const INITIAL_POOL: FixedDecimal =
    FixedDecimal::from_units(1_000_000_000 * UNITS_PER_WHOLE);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BondingCurveError {
    #[error("share amount must be positive")]
    NonPositiveDelta,
    #[error(
        "remaining shares {remaining} exceed the initial pool {initial_pool}"
    )]
    RemainingExceedsPool {
        remaining: FixedDecimal,
        initial_pool: FixedDecimal,
    },
    #[error("amount too large to price")]
    Overflow,
}

/// Parameters of a linear bonding curve. Configuration supplies the curve
/// for new markets; each market keeps the curve it was opened with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BondingCurve {
    pub base_price: FixedDecimal,
    pub slope: FixedDecimal,
    pub initial_pool: FixedDecimal,
}

impl Default for BondingCurve {
    fn default() -> Self {
        Self {
            base_price: BASE_PRICE,
            slope: SLOPE,
            initial_pool: INITIAL_POOL,
        }
    }
}

impl BondingCurve {
    pub fn new(
        base_price: FixedDecimal,
        slope: FixedDecimal,
        initial_pool: FixedDecimal,
    ) -> Self {
        Self {
            base_price,
            slope,
            initial_pool,
        }
    }

    /// Shares already sold on a side, in base units.
    fn sold_units(
        &self,
        side_remaining: FixedDecimal,
    ) -> Result<u128, BondingCurveError> {
        self.initial_pool
            .checked_sub(side_remaining)
            .map(|sold| u128::from(sold.units()))
            .ok_or(BondingCurveError::RemainingExceedsPool {
                remaining: side_remaining,
                initial_pool: self.initial_pool,
            })
    }

    /// Instantaneous price of the next share on a side.
    pub fn price(
        &self,
        side_remaining: FixedDecimal,
    ) -> Result<FixedDecimal, BondingCurveError> {
        let x = self.sold_units(side_remaining)?;
        let one = u128::from(UNITS_PER_WHOLE);
        let base = u128::from(self.base_price.units());
        let slope = u128::from(self.slope.units());
        // price * ONE = base + slope * x / ONE
        let numerator = base
            .checked_mul(one)
            .and_then(|b| slope.checked_mul(x).and_then(|s| b.checked_add(s)))
            .ok_or(BondingCurveError::Overflow)?;
        Self::to_fixed(numerator, one)
    }

    /// Total cost of buying `delta` shares on a side holding
    /// `side_remaining` unsold shares.
    pub fn cost_to_buy(
        &self,
        side_remaining: FixedDecimal,
        delta: FixedDecimal,
    ) -> Result<FixedDecimal, BondingCurveError> {
        if delta.is_zero() {
            return Err(BondingCurveError::NonPositiveDelta);
        }
        let x = self.sold_units(side_remaining)?;
        let d = u128::from(delta.units());
        let one = u128::from(UNITS_PER_WHOLE);
        let base = u128::from(self.base_price.units());
        let slope = u128::from(self.slope.units());
        // cost * ONE = (2 * base * d * ONE + slope * d * (2x + d)) / (2 * ONE^2)
        let linear_term = base
            .checked_mul(d)
            .and_then(|v| v.checked_mul(one))
            .and_then(|v| v.checked_mul(2));
        let quadratic_term = x
            .checked_mul(2)
            .and_then(|v| v.checked_add(d))
            .and_then(|v| v.checked_mul(d))
            .and_then(|v| v.checked_mul(slope));
        let numerator = linear_term
            .zip(quadratic_term)
            .and_then(|(l, q)| l.checked_add(q))
            .ok_or(BondingCurveError::Overflow)?;
        Self::to_fixed(numerator, 2 * one * one)
    }

    fn to_fixed(
        numerator: u128,
        denominator: u128,
    ) -> Result<FixedDecimal, BondingCurveError> {
        let units = round_half_even(numerator, denominator)
            .ok_or(BondingCurveError::Overflow)?;
        u64::try_from(units)
            .map(FixedDecimal::from_units)
            .map_err(|_| BondingCurveError::Overflow)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn dec(s: &str) -> FixedDecimal {
        s.parse().unwrap()
    }

    fn remaining_after(sold: &str) -> FixedDecimal {
        INITIAL_POOL.checked_sub(dec(sold)).unwrap()
    }

    #[test]
    fn test_initial_price() {
        let curve = BondingCurve::default();
        assert_eq!(curve.price(INITIAL_POOL).unwrap(), dec("0.0001"));
    }

    #[test]
    fn test_worked_example() {
        let curve = BondingCurve::default();

        let cost = curve.cost_to_buy(INITIAL_POOL, dec("1000")).unwrap();
        assert_eq!(cost.to_string(), "0.15000000");

        let remaining = remaining_after("1000");
        assert_eq!(curve.price(remaining).unwrap(), dec("0.0002"));

        let cost = curve.cost_to_buy(remaining, dec("500")).unwrap();
        assert_eq!(cost.to_string(), "0.11250000");
    }

    #[test]
    fn test_cost_rounds_half_to_even() {
        let curve = BondingCurve::default();
        // base*d is exactly half a unit and the quadratic term pushes the
        // exact cost just past the tie, so it rounds up
        let cost = curve.cost_to_buy(INITIAL_POOL, dec("0.00005")).unwrap();
        assert_eq!(cost.units(), 1);

        // a pure tie: slope = 0 and base*d = 0.5 units exactly
        let flat = BondingCurve::new(
            dec("0.0001"),
            FixedDecimal::ZERO,
            INITIAL_POOL,
        );
        let cost = flat.cost_to_buy(INITIAL_POOL, dec("0.00005")).unwrap();
        assert_eq!(cost.units(), 0);
        let cost = flat.cost_to_buy(INITIAL_POOL, dec("0.00015")).unwrap();
        assert_eq!(cost.units(), 2);
    }

    #[test]
    fn test_zero_delta_rejected() {
        let curve = BondingCurve::default();
        assert_eq!(
            curve.cost_to_buy(INITIAL_POOL, FixedDecimal::ZERO),
            Err(BondingCurveError::NonPositiveDelta)
        );
    }

    #[test]
    fn test_remaining_above_pool_rejected() {
        let curve = BondingCurve::default();
        let too_many = INITIAL_POOL.checked_add(dec("1")).unwrap();
        assert!(matches!(
            curve.price(too_many),
            Err(BondingCurveError::RemainingExceedsPool { .. })
        ));
    }

    #[test]
    fn test_buying_whole_pool_fits() {
        let curve = BondingCurve::default();
        let cost = curve.cost_to_buy(INITIAL_POOL, INITIAL_POOL).unwrap();
        // 0.0001 * 1e9 + 0.00000005 * 1e18
        assert_eq!(cost, dec("50000100000"));
        assert_eq!(curve.price(FixedDecimal::ZERO).unwrap(), dec("100.0001"));
    }

    #[test]
    fn test_absurd_delta_overflows() {
        let curve = BondingCurve::default();
        assert_eq!(
            curve.cost_to_buy(INITIAL_POOL, FixedDecimal::MAX),
            Err(BondingCurveError::Overflow)
        );
    }

    #[test]
    fn test_split_purchase_matches_single_purchase() {
        let curve = BondingCurve::default();
        let whole = curve.cost_to_buy(INITIAL_POOL, dec("1500")).unwrap();
        let first = curve.cost_to_buy(INITIAL_POOL, dec("1000")).unwrap();
        let second =
            curve.cost_to_buy(remaining_after("1000"), dec("500")).unwrap();
        assert_eq!(first.checked_add(second).unwrap(), whole);
    }

    proptest! {
        #[test]
        fn price_non_decreasing_in_sold(
            sold in 0u64..INITIAL_POOL.units(),
            step in 1u64..1_000_000_000_000,
        ) {
            let curve = BondingCurve::default();
            let before = FixedDecimal::from_units(INITIAL_POOL.units() - sold);
            let after = FixedDecimal::from_units(
                before.units().saturating_sub(step),
            );
            prop_assert!(curve.price(after).unwrap() >= curve.price(before).unwrap());
        }

        #[test]
        fn cost_strictly_increasing_in_delta(
            sold in 0u64..INITIAL_POOL.units() / 2,
            delta in 1u64..1_000_000_000_000,
        ) {
            let curve = BondingCurve::default();
            let remaining = FixedDecimal::from_units(INITIAL_POOL.units() - sold);
            let smaller = curve
                .cost_to_buy(remaining, FixedDecimal::from_units(delta))
                .unwrap();
            let larger = curve
                .cost_to_buy(
                    remaining,
                    FixedDecimal::from_units(delta + UNITS_PER_WHOLE),
                )
                .unwrap();
            prop_assert!(larger > smaller);
        }

        #[test]
        fn small_delta_cost_tracks_price(
            sold in 0u64..INITIAL_POOL.units(),
            whole_shares in 1u64..100,
        ) {
            let curve = BondingCurve::default();
            let remaining = FixedDecimal::from_units(INITIAL_POOL.units() - sold);
            let delta = FixedDecimal::from_whole(whole_shares).unwrap();
            let cost = curve.cost_to_buy(remaining, delta).unwrap().units();
            let linear = curve.price(remaining).unwrap().units() * whole_shares;
            // the gap is the quadratic term slope/2 * delta^2 (5 units per
            // share squared) plus at most half a unit of price rounding per
            // share and half a unit of cost rounding
            let drift = cost.abs_diff(linear);
            let bound = 5 * whole_shares * whole_shares + whole_shares + 1;
            prop_assert!(drift <= bound, "drift {drift} exceeds {bound}");
        }
    }
}
