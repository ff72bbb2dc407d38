//! Share purchases against a market's bonding curve

use chrono::{DateTime, Utc};
use sneed::{RoTxn, RwTxn};

use crate::{
    state::{Error, State},
    types::{FixedDecimal, MarketId, PositionId, Side, WalletAddress},
};

/// Result of a committed purchase
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuyReceipt {
    pub market_id: MarketId,
    pub position_id: PositionId,
    pub side: Side,
    pub shares_bought: FixedDecimal,
    pub total_cost: FixedDecimal,
    /// Shares held on the side after the purchase
    pub new_total_shares: FixedDecimal,
    pub cost_basis: FixedDecimal,
    pub remaining_true: FixedDecimal,
    pub remaining_false: FixedDecimal,
    pub updated_balance: FixedDecimal,
}

/// Price of a purchase, without executing it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Quote {
    pub market_id: MarketId,
    pub side: Side,
    pub shares: FixedDecimal,
    pub current_price: FixedDecimal,
    pub cost: FixedDecimal,
    pub remaining: FixedDecimal,
}

fn require_positive(shares: FixedDecimal) -> Result<(), Error> {
    if shares.is_zero() {
        return Err(Error::validation("amount must be greater than zero"));
    }
    Ok(())
}

impl State {
    /// Cost of buying `shares` on `side` at the market's current pool
    pub fn quote_buy(
        &self,
        rotxn: &RoTxn,
        market_id: MarketId,
        side: Side,
        shares: FixedDecimal,
    ) -> Result<Quote, Error> {
        require_positive(shares)?;
        let market = self.markets().get_market(rotxn, market_id)?;
        let remaining = market.remaining(side);
        if remaining < shares {
            return Err(Error::InsufficientShares {
                side,
                requested: shares,
                remaining,
            });
        }
        let quote = Quote {
            market_id,
            side,
            shares,
            current_price: market.current_price(side)?,
            cost: market.cost_to_buy(side, shares)?,
            remaining,
        };
        tracing::debug!(
            %market_id,
            %side,
            %shares,
            cost = %quote.cost,
            "quoted purchase"
        );
        Ok(quote)
    }

    /// Buy `shares` on `side` of a market for `wallet`.
    ///
    /// Every check runs before the first write; the balance debit, pool
    /// decrement and position upsert all go into `rwtxn`. Callers must
    /// drop `rwtxn` without committing if this returns an error.
    pub fn buy(
        &self,
        rwtxn: &mut RwTxn,
        wallet: &WalletAddress,
        market_id: MarketId,
        side: Side,
        shares: FixedDecimal,
        now: DateTime<Utc>,
    ) -> Result<BuyReceipt, Error> {
        require_positive(shares)?;
        let mut market = self.markets().get_market(rwtxn, market_id)?;
        let mut account = self.accounts().get_account(rwtxn, wallet)?;
        match self.positions().try_get_position(rwtxn, wallet, market_id)? {
            Some(position) if position.side != side => {
                return Err(Error::OppositeSideHeld {
                    market_id,
                    held: position.side,
                });
            }
            Some(_) | None => (),
        }

        let remaining = market.remaining(side);
        if remaining < shares {
            return Err(Error::InsufficientShares {
                side,
                requested: shares,
                remaining,
            });
        }
        let cost = market.cost_to_buy(side, shares)?;
        if account.balance < cost {
            return Err(Error::InsufficientFunds {
                required: cost,
                available: account.balance,
            });
        }

        account.debit(cost, now)?;
        market.take_shares(side, shares)?;
        self.accounts().put_account(rwtxn, &account)?;
        self.markets().put_market(rwtxn, &market)?;
        let position = self.positions().upsert_position(
            rwtxn, wallet, market_id, side, shares, cost,
        )?;
        tracing::info!(
            %market_id,
            %wallet,
            %side,
            %shares,
            %cost,
            balance = %account.balance,
            "bought shares"
        );
        Ok(BuyReceipt {
            market_id,
            position_id: position.id,
            side,
            shares_bought: shares,
            total_cost: cost,
            new_total_shares: position.shares,
            cost_basis: position.cost_basis,
            remaining_true: market.true_remaining,
            remaining_false: market.false_remaining,
            updated_balance: account.balance,
        })
    }
}
