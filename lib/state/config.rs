use chrono::TimeDelta;

use crate::{math::bonding_curve::BondingCurve, types::FixedDecimal};

/// Balance granted to a wallet on first login
pub const DEFAULT_INITIAL_BALANCE: FixedDecimal =
    FixedDecimal::from_units(1_000 * crate::math::fixed::UNITS_PER_WHOLE);

/// Minutes after submission during which only the author may open a market
pub const DEFAULT_EXCLUSIVITY_WINDOW_MINS: i64 = 30;

/// Engine parameters, built once at startup and handed to [`super::State`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MarketConfig {
    pub curve: BondingCurve,
    pub initial_balance: FixedDecimal,
    pub exclusivity_window: TimeDelta,
    /// Insert missing verification status rows when the node opens
    pub seed_verification_statuses: bool,
}

impl MarketConfig {
    pub fn exclusivity_window_mins(&self) -> i64 {
        self.exclusivity_window.num_minutes()
    }
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            curve: BondingCurve::default(),
            initial_balance: DEFAULT_INITIAL_BALANCE,
            exclusivity_window: TimeDelta::minutes(
                DEFAULT_EXCLUSIVITY_WINDOW_MINS,
            ),
            seed_verification_statuses: true,
        }
    }
}
