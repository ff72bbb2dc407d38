//! Per-(user, market) share holdings

use heed::types::SerdeBincode;
use serde::{Deserialize, Serialize};
use sneed::{DatabaseUnique, Env, RoTxn, RwTxn, UnitKey};

use crate::{
    state::error::Error,
    types::{FixedDecimal, MarketId, PositionId, Side, WalletAddress},
};

/// Shares a user holds on one side of one market, and what they paid.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct MarketPosition {
    pub id: PositionId,
    pub wallet_address: WalletAddress,
    pub market_id: MarketId,
    pub side: Side,
    pub shares: FixedDecimal,
    pub cost_basis: FixedDecimal,
}

impl MarketPosition {
    pub fn new(
        id: PositionId,
        wallet_address: WalletAddress,
        market_id: MarketId,
        side: Side,
    ) -> Self {
        Self {
            id,
            wallet_address,
            market_id,
            side,
            shares: FixedDecimal::ZERO,
            cost_basis: FixedDecimal::ZERO,
        }
    }

    /// Add a same-side purchase to the position
    pub fn accumulate(
        &mut self,
        shares: FixedDecimal,
        cost: FixedDecimal,
    ) -> Result<(), Error> {
        let total_shares = self
            .shares
            .checked_add(shares)
            .ok_or_else(|| Error::validation("position share total overflows"))?;
        let total_cost = self
            .cost_basis
            .checked_add(cost)
            .ok_or_else(|| Error::validation("position cost basis overflows"))?;
        self.shares = total_shares;
        self.cost_basis = total_cost;
        Ok(())
    }
}

type PositionKey = (WalletAddress, MarketId);

#[derive(Clone)]
pub struct Dbs {
    /// Keyed by (wallet, market), so a pair can only ever hold one row
    positions:
        DatabaseUnique<SerdeBincode<PositionKey>, SerdeBincode<MarketPosition>>,
    /// Secondary index: wallet -> markets it holds a position in
    markets_by_wallet:
        DatabaseUnique<SerdeBincode<WalletAddress>, SerdeBincode<Vec<MarketId>>>,
    /// Secondary index: market -> wallets holding a position in it
    wallets_by_market:
        DatabaseUnique<SerdeBincode<MarketId>, SerdeBincode<Vec<WalletAddress>>>,
    next_position_id: DatabaseUnique<UnitKey, SerdeBincode<PositionId>>,
}

impl Dbs {
    pub const NUM_DBS: u32 = 4;

    /// Does not commit the RwTxn.
    pub fn new(env: &Env, rwtxn: &mut RwTxn) -> Result<Self, Error> {
        let positions =
            DatabaseUnique::create(env, rwtxn, "market_positions")?;
        let markets_by_wallet =
            DatabaseUnique::create(env, rwtxn, "position_markets_by_wallet")?;
        let wallets_by_market =
            DatabaseUnique::create(env, rwtxn, "position_wallets_by_market")?;
        let next_position_id =
            DatabaseUnique::create(env, rwtxn, "next_position_id")?;
        Ok(Self {
            positions,
            markets_by_wallet,
            wallets_by_market,
            next_position_id,
        })
    }

    pub fn next_position_id(
        &self,
        rwtxn: &mut RwTxn,
    ) -> Result<PositionId, Error> {
        let id = self
            .next_position_id
            .try_get(rwtxn, &())?
            .unwrap_or(PositionId(1));
        self.next_position_id.put(rwtxn, &(), &id.next())?;
        Ok(id)
    }

    pub fn try_get_position(
        &self,
        rotxn: &RoTxn,
        wallet: &WalletAddress,
        market_id: MarketId,
    ) -> Result<Option<MarketPosition>, Error> {
        Ok(self
            .positions
            .try_get(rotxn, &(wallet.clone(), market_id))?)
    }

    /// Write a position row, adding the pair to both indexes when the row
    /// is new.
    pub fn put_position(
        &self,
        rwtxn: &mut RwTxn,
        position: &MarketPosition,
    ) -> Result<(), Error> {
        let wallet = &position.wallet_address;
        let market_id = position.market_id;
        let key = (wallet.clone(), market_id);
        if self.positions.try_get(rwtxn, &key)?.is_none() {
            let mut market_ids = self
                .markets_by_wallet
                .try_get(rwtxn, wallet)?
                .unwrap_or_default();
            market_ids.push(market_id);
            self.markets_by_wallet.put(rwtxn, wallet, &market_ids)?;
            let mut wallets = self
                .wallets_by_market
                .try_get(rwtxn, &market_id)?
                .unwrap_or_default();
            wallets.push(wallet.clone());
            self.wallets_by_market.put(rwtxn, &market_id, &wallets)?;
        }
        self.positions.put(rwtxn, &key, position)?;
        Ok(())
    }

    /// Add a purchase to the (wallet, market) position, creating it on the
    /// first purchase. The caller checks the side beforehand.
    pub fn upsert_position(
        &self,
        rwtxn: &mut RwTxn,
        wallet: &WalletAddress,
        market_id: MarketId,
        side: Side,
        shares: FixedDecimal,
        cost: FixedDecimal,
    ) -> Result<MarketPosition, Error> {
        let mut position =
            match self.try_get_position(rwtxn, wallet, market_id)? {
                Some(position) if position.side != side => {
                    return Err(Error::OppositeSideHeld {
                        market_id,
                        held: position.side,
                    });
                }
                Some(position) => position,
                None => {
                    let id = self.next_position_id(rwtxn)?;
                    MarketPosition::new(id, wallet.clone(), market_id, side)
                }
            };
        position.accumulate(shares, cost)?;
        self.put_position(rwtxn, &position)?;
        Ok(position)
    }

    /// Positions held by `wallet`, oldest first
    pub fn get_user_positions(
        &self,
        rotxn: &RoTxn,
        wallet: &WalletAddress,
    ) -> Result<Vec<MarketPosition>, Error> {
        let market_ids = self
            .markets_by_wallet
            .try_get(rotxn, wallet)?
            .unwrap_or_default();
        let mut res = Vec::with_capacity(market_ids.len());
        for market_id in market_ids {
            res.push(self.get_indexed_position(rotxn, wallet, market_id)?);
        }
        res.sort_by_key(|position| position.id);
        Ok(res)
    }

    /// Positions in `market_id`, oldest first
    pub fn get_market_positions(
        &self,
        rotxn: &RoTxn,
        market_id: MarketId,
    ) -> Result<Vec<MarketPosition>, Error> {
        let wallets = self
            .wallets_by_market
            .try_get(rotxn, &market_id)?
            .unwrap_or_default();
        let mut res = Vec::with_capacity(wallets.len());
        for wallet in &wallets {
            res.push(self.get_indexed_position(rotxn, wallet, market_id)?);
        }
        res.sort_by_key(|position| position.id);
        Ok(res)
    }

    fn get_indexed_position(
        &self,
        rotxn: &RoTxn,
        wallet: &WalletAddress,
        market_id: MarketId,
    ) -> Result<MarketPosition, Error> {
        self.try_get_position(rotxn, wallet, market_id)?.ok_or_else(|| {
            Error::LedgerInconsistency(format!(
                "position index lists {wallet} in market {market_id} without a position row"
            ))
        })
    }

    /// Sum of shares held by all users on one side of a market
    pub fn total_shares(
        &self,
        rotxn: &RoTxn,
        market_id: MarketId,
        side: Side,
    ) -> Result<FixedDecimal, Error> {
        self.get_market_positions(rotxn, market_id)?
            .into_iter()
            .filter(|position| position.side == side)
            .try_fold(FixedDecimal::ZERO, |total, position| {
                total.checked_add(position.shares).ok_or_else(|| {
                    Error::LedgerInconsistency(format!(
                        "{side} share total of market {market_id} overflows"
                    ))
                })
            })
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        state::{ErrorKind, test_utils::TestEnv},
        types::{FixedDecimal, MarketId, Side, WalletAddress},
    };

    fn dec(s: &str) -> FixedDecimal {
        s.parse().unwrap()
    }

    fn wallet(s: &str) -> WalletAddress {
        WalletAddress::new(s).unwrap()
    }

    #[test]
    fn test_positions_listed_by_wallet_and_market() {
        let test_env = TestEnv::default();
        let positions = test_env.state.positions();
        let mut rwtxn = test_env.env.write_txn().unwrap();
        let buys = [
            ("alice", 1, Side::True, "10", "0.001"),
            ("bob", 1, Side::False, "5", "0.0005"),
            ("alice", 2, Side::False, "7", "0.0007"),
            ("alice", 1, Side::True, "3", "0.0003"),
            ("carol", 2, Side::False, "1", "0.0001"),
        ];
        for (who, market, side, shares, cost) in buys {
            positions
                .upsert_position(
                    &mut rwtxn,
                    &wallet(who),
                    MarketId(market),
                    side,
                    dec(shares),
                    dec(cost),
                )
                .unwrap();
        }
        rwtxn.commit().unwrap();

        let rotxn = test_env.env.read_txn().unwrap();
        let alice = positions.get_user_positions(&rotxn, &wallet("alice")).unwrap();
        assert_eq!(alice.len(), 2);
        assert_eq!(alice[0].market_id, MarketId(1));
        assert_eq!(alice[0].shares, dec("13"));
        assert_eq!(alice[0].cost_basis, dec("0.0013"));
        assert_eq!(alice[1].market_id, MarketId(2));
        assert!(alice[0].id < alice[1].id);

        let market_one = positions.get_market_positions(&rotxn, MarketId(1)).unwrap();
        let holders: Vec<_> = market_one
            .iter()
            .map(|position| position.wallet_address.as_str())
            .collect();
        assert_eq!(holders, ["alice", "bob"]);
        assert_eq!(
            positions.total_shares(&rotxn, MarketId(2), Side::False).unwrap(),
            dec("8")
        );
        assert!(positions
            .get_user_positions(&rotxn, &wallet("dave"))
            .unwrap()
            .is_empty());
        assert!(positions
            .get_market_positions(&rotxn, MarketId(3))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_opposite_side_leaves_position_unchanged() {
        let test_env = TestEnv::default();
        let positions = test_env.state.positions();
        let mut rwtxn = test_env.env.write_txn().unwrap();
        positions
            .upsert_position(
                &mut rwtxn,
                &wallet("alice"),
                MarketId(1),
                Side::True,
                dec("10"),
                dec("0.001"),
            )
            .unwrap();
        let err = positions
            .upsert_position(
                &mut rwtxn,
                &wallet("alice"),
                MarketId(1),
                Side::False,
                dec("1"),
                dec("0.0001"),
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        let held = positions.get_market_positions(&rwtxn, MarketId(1)).unwrap();
        assert_eq!(held.len(), 1);
        assert_eq!(held[0].shares, dec("10"));
    }
}
