use chrono::{DateTime, Utc};
use fallible_iterator::FallibleIterator;
use heed::types::SerdeBincode;
use serde::{Deserialize, Serialize};
use sneed::{DatabaseUnique, Env, RoTxn, RwTxn, UnitKey};

use crate::{
    math::bonding_curve::BondingCurve,
    state::Error,
    types::{ClaimId, FixedDecimal, MarketId, Side, WalletAddress},
};

/// Binary market on a single claim. Each side starts with the curve's
/// initial pool of unsold shares; pools only ever shrink.
///
/// The curve is fixed when the market opens and is priced from then on,
/// whatever curve later configuration supplies for new markets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Market {
    pub id: MarketId,
    pub claim_id: ClaimId,
    pub creator: WalletAddress,
    pub created_at: DateTime<Utc>,
    pub curve: BondingCurve,
    pub true_remaining: FixedDecimal,
    pub false_remaining: FixedDecimal,
}

impl Market {
    pub fn new(
        id: MarketId,
        claim_id: ClaimId,
        creator: WalletAddress,
        curve: BondingCurve,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            claim_id,
            creator,
            created_at,
            curve,
            true_remaining: curve.initial_pool,
            false_remaining: curve.initial_pool,
        }
    }

    pub fn remaining(&self, side: Side) -> FixedDecimal {
        match side {
            Side::True => self.true_remaining,
            Side::False => self.false_remaining,
        }
    }

    fn remaining_mut(&mut self, side: Side) -> &mut FixedDecimal {
        match side {
            Side::True => &mut self.true_remaining,
            Side::False => &mut self.false_remaining,
        }
    }

    /// Remove `shares` from a side's pool, refusing to oversell.
    pub fn take_shares(
        &mut self,
        side: Side,
        shares: FixedDecimal,
    ) -> Result<(), Error> {
        let remaining = self.remaining(side);
        let new_remaining = remaining.checked_sub(shares).ok_or(
            Error::InsufficientShares {
                side,
                requested: shares,
                remaining,
            },
        )?;
        *self.remaining_mut(side) = new_remaining;
        Ok(())
    }

    pub fn current_price(&self, side: Side) -> Result<FixedDecimal, Error> {
        Ok(self.curve.price(self.remaining(side))?)
    }

    /// Cost of buying `shares` on `side` at the current pool
    pub fn cost_to_buy(
        &self,
        side: Side,
        shares: FixedDecimal,
    ) -> Result<FixedDecimal, Error> {
        Ok(self.curve.cost_to_buy(self.remaining(side), shares)?)
    }
}

#[derive(Clone)]
pub struct MarketsDatabase {
    /// Primary market storage by ID
    markets: DatabaseUnique<SerdeBincode<MarketId>, SerdeBincode<Market>>,
    /// Unique index: ClaimId -> MarketId. Enforces one market per claim.
    markets_by_claim:
        DatabaseUnique<SerdeBincode<ClaimId>, SerdeBincode<MarketId>>,
    next_market_id: DatabaseUnique<UnitKey, SerdeBincode<MarketId>>,
}

impl MarketsDatabase {
    pub const NUM_DBS: u32 = 3;

    /// Create new markets database with its claim index. Does not commit
    /// the RwTxn.
    pub fn new(env: &Env, rwtxn: &mut RwTxn) -> Result<Self, Error> {
        let markets = DatabaseUnique::create(env, rwtxn, "markets")?;
        let markets_by_claim =
            DatabaseUnique::create(env, rwtxn, "markets_by_claim")?;
        let next_market_id =
            DatabaseUnique::create(env, rwtxn, "next_market_id")?;
        Ok(Self {
            markets,
            markets_by_claim,
            next_market_id,
        })
    }

    /// Allocate the next market id
    pub fn next_market_id(
        &self,
        rwtxn: &mut RwTxn,
    ) -> Result<MarketId, Error> {
        let id = self
            .next_market_id
            .try_get(rwtxn, &())?
            .unwrap_or(MarketId(1));
        self.next_market_id.put(rwtxn, &(), &id.next())?;
        Ok(id)
    }

    /// Add a market, maintaining the claim index. Fails if the claim already
    /// has a market.
    pub fn add_market(
        &self,
        rwtxn: &mut RwTxn,
        market: &Market,
    ) -> Result<(), Error> {
        if let Some(market_id) =
            self.markets_by_claim.try_get(rwtxn, &market.claim_id)?
        {
            return Err(Error::MarketExists {
                claim_id: market.claim_id,
                market_id,
            });
        }
        self.markets.put(rwtxn, &market.id, market)?;
        self.markets_by_claim
            .put(rwtxn, &market.claim_id, &market.id)?;
        Ok(())
    }

    /// Get a market by ID
    pub fn try_get_market(
        &self,
        rotxn: &RoTxn,
        market_id: MarketId,
    ) -> Result<Option<Market>, Error> {
        Ok(self.markets.try_get(rotxn, &market_id)?)
    }

    pub fn get_market(
        &self,
        rotxn: &RoTxn,
        market_id: MarketId,
    ) -> Result<Market, Error> {
        self.try_get_market(rotxn, market_id)?
            .ok_or(Error::MarketNotFound { market_id })
    }

    pub fn try_get_market_by_claim(
        &self,
        rotxn: &RoTxn,
        claim_id: ClaimId,
    ) -> Result<Option<Market>, Error> {
        match self.markets_by_claim.try_get(rotxn, &claim_id)? {
            Some(market_id) => self.try_get_market(rotxn, market_id),
            None => Ok(None),
        }
    }

    /// Get all markets, newest first
    pub fn get_all_markets(
        &self,
        rotxn: &RoTxn,
    ) -> Result<Vec<Market>, Error> {
        let mut markets: Vec<Market> = self
            .markets
            .iter(rotxn)?
            .map(|(_, market)| Ok(market))
            .collect()?;
        markets.sort_by(|a, b| {
            b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id))
        });
        Ok(markets)
    }

    /// Overwrite an existing market row
    pub fn put_market(
        &self,
        rwtxn: &mut RwTxn,
        market: &Market,
    ) -> Result<(), Error> {
        self.markets.put(rwtxn, &market.id, market)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::bonding_curve::INITIAL_POOL;

    fn market(curve: BondingCurve) -> Market {
        Market::new(
            MarketId(1),
            ClaimId(7),
            WalletAddress::new("creator").unwrap(),
            curve,
            Utc::now(),
        )
    }

    #[test]
    fn test_take_shares_decrements_one_side() {
        let mut market = market(BondingCurve::default());
        let shares: FixedDecimal = "1000".parse().unwrap();
        market.take_shares(Side::True, shares).unwrap();
        assert_eq!(
            market.true_remaining,
            INITIAL_POOL.checked_sub(shares).unwrap()
        );
        assert_eq!(market.false_remaining, INITIAL_POOL);
    }

    #[test]
    fn test_take_shares_refuses_oversell() {
        let mut market = market(BondingCurve::default());
        let too_many = INITIAL_POOL.checked_add(FixedDecimal::from_units(1)).unwrap();
        let err = market.take_shares(Side::False, too_many).unwrap_err();
        assert!(matches!(err, Error::InsufficientShares { side: Side::False, .. }));
        assert_eq!(market.false_remaining, INITIAL_POOL);
    }

    #[test]
    fn test_current_price_per_side() {
        let mut market = market(BondingCurve::default());
        market
            .take_shares(Side::True, "1000".parse().unwrap())
            .unwrap();
        assert_eq!(
            market.current_price(Side::True).unwrap(),
            "0.0002".parse().unwrap()
        );
        assert_eq!(
            market.current_price(Side::False).unwrap(),
            "0.0001".parse().unwrap()
        );
    }

    #[test]
    fn test_pools_start_at_the_market_curve() {
        let curve = BondingCurve::new(
            "0.5".parse().unwrap(),
            "0.01".parse().unwrap(),
            "100".parse().unwrap(),
        );
        let market = market(curve);
        assert_eq!(market.true_remaining, curve.initial_pool);
        assert_eq!(market.false_remaining, curve.initial_pool);
        assert_eq!(
            market.current_price(Side::True).unwrap(),
            "0.5".parse().unwrap()
        );
        // 0.5 * 10 + 0.005 * 100
        assert_eq!(
            market.cost_to_buy(Side::True, "10".parse().unwrap()).unwrap(),
            "5.5".parse().unwrap()
        );
    }
}
