use chrono::{DateTime, Utc};
use heed::types::SerdeBincode;
use sneed::{DatabaseUnique, RoTxn, RwTxn, UnitKey};

use crate::types::{
    ClaimId, FixedDecimal, MarketId, PositionId, Side, VERSION,
    VerificationStatusName, Version, WalletAddress,
};

pub mod accounts;
pub mod claims;
pub mod config;
pub mod error;
mod lifecycle;
pub mod markets;
pub mod positions;
mod trade;

pub use accounts::UserAccount;
pub use claims::{Claim, VerificationStatus};
pub use config::MarketConfig;
pub use error::{Error, ErrorKind};
pub use markets::{Market, MarketsDatabase};
pub use positions::MarketPosition;
pub use trade::{BuyReceipt, Quote};

/// Market listing row joined with its claim and current prices
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MarketSummary {
    pub market_id: MarketId,
    pub creator: WalletAddress,
    pub created_at: DateTime<Utc>,
    pub claim_id: ClaimId,
    pub claim_text: String,
    pub claim_slug: String,
    pub status: VerificationStatusName,
    pub true_remaining: FixedDecimal,
    pub false_remaining: FixedDecimal,
    pub current_true_price: FixedDecimal,
    pub current_false_price: FixedDecimal,
}

/// A user's position joined with the claim it bets on
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PositionSummary {
    pub position_id: PositionId,
    pub market_id: MarketId,
    pub claim_id: ClaimId,
    pub claim_text: String,
    pub claim_slug: String,
    pub side: Side,
    pub shares: FixedDecimal,
    pub cost_basis: FixedDecimal,
    pub current_price: FixedDecimal,
}

#[derive(Clone)]
pub struct State {
    config: MarketConfig,
    accounts: accounts::Dbs,
    claims: claims::Dbs,
    markets: MarketsDatabase,
    positions: positions::Dbs,
    _version: DatabaseUnique<UnitKey, SerdeBincode<Version>>,
}

impl State {
    pub const NUM_DBS: u32 = accounts::Dbs::NUM_DBS
        + claims::Dbs::NUM_DBS
        + MarketsDatabase::NUM_DBS
        + positions::Dbs::NUM_DBS
        + 1;

    pub fn new(env: &sneed::Env, config: MarketConfig) -> Result<Self, Error> {
        let mut rwtxn = env.write_txn()?;
        let accounts = accounts::Dbs::new(env, &mut rwtxn)?;
        let claims = claims::Dbs::new(env, &mut rwtxn)?;
        let markets = MarketsDatabase::new(env, &mut rwtxn)?;
        let positions = positions::Dbs::new(env, &mut rwtxn)?;
        let version = DatabaseUnique::create(env, &mut rwtxn, "state_version")?;
        if version.try_get(&rwtxn, &())?.is_none() {
            version.put(&mut rwtxn, &(), &VERSION)?;
        }
        rwtxn.commit()?;
        Ok(Self {
            config,
            accounts,
            claims,
            markets,
            positions,
            _version: version,
        })
    }

    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    pub fn accounts(&self) -> &accounts::Dbs {
        &self.accounts
    }

    pub fn claims(&self) -> &claims::Dbs {
        &self.claims
    }

    pub fn markets(&self) -> &MarketsDatabase {
        &self.markets
    }

    pub fn positions(&self) -> &positions::Dbs {
        &self.positions
    }

    /// Return the account for `wallet`, creating it with the configured
    /// starting balance on first login. The flag is `true` for a new
    /// account.
    pub fn get_or_create_account(
        &self,
        rwtxn: &mut RwTxn,
        wallet: &WalletAddress,
        now: DateTime<Utc>,
    ) -> Result<(UserAccount, bool), Error> {
        if let Some(account) = self.accounts.try_get_account(rwtxn, wallet)? {
            return Ok((account, false));
        }
        let status = self.claims.require_verification_status(
            rwtxn,
            VerificationStatusName::Unverified,
        )?;
        let account = UserAccount::new(
            wallet.clone(),
            self.config.initial_balance,
            status.name,
            now,
        );
        self.accounts.put_account(rwtxn, &account)?;
        tracing::info!(%wallet, balance = %account.balance, "created user account");
        Ok((account, true))
    }

    /// All markets with their claims and current prices, newest first
    pub fn list_markets(
        &self,
        rotxn: &RoTxn,
    ) -> Result<Vec<MarketSummary>, Error> {
        self.markets
            .get_all_markets(rotxn)?
            .into_iter()
            .map(|market| {
                let claim = self.claims.get_claim(rotxn, market.claim_id)?;
                Ok(MarketSummary {
                    market_id: market.id,
                    creator: market.creator.clone(),
                    created_at: market.created_at,
                    claim_id: claim.id,
                    claim_text: claim.text,
                    claim_slug: claim.slug,
                    status: claim.verification_status,
                    true_remaining: market.true_remaining,
                    false_remaining: market.false_remaining,
                    current_true_price: market.current_price(Side::True)?,
                    current_false_price: market.current_price(Side::False)?,
                })
            })
            .collect()
    }

    /// Positions held by an existing user, oldest first
    pub fn user_positions(
        &self,
        rotxn: &RoTxn,
        wallet: &WalletAddress,
    ) -> Result<Vec<PositionSummary>, Error> {
        let _account = self.accounts.get_account(rotxn, wallet)?;
        self.positions
            .get_user_positions(rotxn, wallet)?
            .into_iter()
            .map(|position| {
                let market =
                    self.markets.get_market(rotxn, position.market_id)?;
                let claim = self.claims.get_claim(rotxn, market.claim_id)?;
                Ok(PositionSummary {
                    position_id: position.id,
                    market_id: market.id,
                    claim_id: claim.id,
                    claim_text: claim.text,
                    claim_slug: claim.slug,
                    side: position.side,
                    shares: position.shares,
                    cost_basis: position.cost_basis,
                    current_price: market.current_price(position.side)?,
                })
            })
            .collect()
    }

    /// Check that every side of `market_id` satisfies
    /// `remaining + held == initial pool`.
    pub fn verify_conservation(
        &self,
        rotxn: &RoTxn,
        market_id: MarketId,
    ) -> Result<(), Error> {
        let market = self.markets.get_market(rotxn, market_id)?;
        for side in [Side::True, Side::False] {
            let held = self.positions.total_shares(rotxn, market_id, side)?;
            let accounted = market.remaining(side).checked_add(held);
            if accounted != Some(market.curve.initial_pool) {
                tracing::error!(
                    %market_id,
                    %side,
                    remaining = %market.remaining(side),
                    %held,
                    "share conservation violated"
                );
                return Err(Error::LedgerInconsistency(format!(
                    "market {market_id} {side}: remaining {} + held {held} != initial pool {}",
                    market.remaining(side),
                    market.curve.initial_pool
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_utils {
    use sneed::Env;
    use tempfile::TempDir;

    use super::{MarketConfig, State};

    /// LMDB environment in a throwaway directory
    pub struct TestEnv {
        pub env: Env,
        pub state: State,
        _dir: TempDir,
    }

    impl TestEnv {
        pub fn new(config: MarketConfig) -> Self {
            let test_env = Self::unseeded(config);
            let mut rwtxn = test_env.env.write_txn().unwrap();
            test_env
                .state
                .claims()
                .seed_verification_statuses(&mut rwtxn)
                .unwrap();
            rwtxn.commit().unwrap();
            test_env
        }

        /// Environment with an empty verification status table
        pub fn unseeded(config: MarketConfig) -> Self {
            let dir = TempDir::new().unwrap();
            let env = {
                let mut env_open_opts = heed::EnvOpenOptions::new();
                env_open_opts
                    .map_size(64 * 1024 * 1024)
                    .max_dbs(State::NUM_DBS);
                unsafe { Env::open(&env_open_opts, dir.path()) }.unwrap()
            };
            let state = State::new(&env, config).unwrap();
            Self {
                env,
                state,
                _dir: dir,
            }
        }
    }

    impl Default for TestEnv {
        fn default() -> Self {
            Self::new(MarketConfig::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{test_utils::TestEnv, *};

    #[test]
    fn test_wallet_login_creates_account_once() {
        let test_env = TestEnv::default();
        let wallet = WalletAddress::new("alice").unwrap();
        let now = Utc::now();
        let mut rwtxn = test_env.env.write_txn().unwrap();
        let (account, is_new) = test_env
            .state
            .get_or_create_account(&mut rwtxn, &wallet, now)
            .unwrap();
        assert!(is_new);
        assert_eq!(account.balance, "1000".parse().unwrap());
        assert_eq!(
            account.verification_status,
            VerificationStatusName::Unverified
        );
        let (again, is_new) = test_env
            .state
            .get_or_create_account(&mut rwtxn, &wallet, now)
            .unwrap();
        assert!(!is_new);
        assert_eq!(again, account);
        rwtxn.commit().unwrap();
    }

    #[test]
    fn test_user_positions_requires_account() {
        let test_env = TestEnv::default();
        let rotxn = test_env.env.read_txn().unwrap();
        let err = test_env
            .state
            .user_positions(&rotxn, &WalletAddress::new("ghost").unwrap())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_list_markets_empty() {
        let test_env = TestEnv::default();
        let rotxn = test_env.env.read_txn().unwrap();
        assert!(test_env.state.list_markets(&rotxn).unwrap().is_empty());
    }
}
