use std::path::Path;

use chrono::{DateTime, Utc};
use sneed::{Env, EnvError, RwTxnError, env};

use crate::{
    state::{
        self, BuyReceipt, Claim, ErrorKind, Market, MarketConfig,
        MarketPosition, MarketSummary, PositionSummary, Quote, State,
        UserAccount,
    },
    types::{
        ClaimId, FixedDecimal, MarketId, Side, VerificationStatusName,
        WalletAddress,
    },
};

/// Size of the LMDB memory map
const MAP_SIZE: usize = 1024 * 1024 * 1024;

#[allow(clippy::duplicated_attributes)]
#[derive(thiserror::Error, transitive::Transitive, Debug)]
#[transitive(from(env::error::OpenEnv, EnvError))]
#[transitive(from(env::error::ReadTxn, EnvError))]
#[transitive(from(env::error::WriteTxn, EnvError))]
pub enum Error {
    #[error("Database env error")]
    DbEnv(#[from] EnvError),
    #[error("Database write error")]
    DbWrite(#[from] RwTxnError),
    #[error("I/O error")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    State(Box<state::Error>),
}

impl From<state::Error> for Error {
    fn from(err: state::Error) -> Self {
        Self::State(Box::new(err))
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::State(err) => err.kind(),
            Self::DbEnv(_) | Self::DbWrite(_) | Self::Io(_) => {
                ErrorKind::Storage
            }
        }
    }
}

/// Owns the database environment. Each method runs in its own
/// transaction: queries in a read transaction, mutations in a write
/// transaction that is committed only if the whole operation succeeds.
#[derive(Clone)]
pub struct Node {
    env: Env,
    state: State,
}

impl Node {
    pub fn new(datadir: &Path, config: MarketConfig) -> Result<Self, Error> {
        let env_path = datadir.join("data.mdb");
        std::fs::create_dir_all(&env_path)?;
        let env = {
            let mut env_open_opts = heed::EnvOpenOptions::new();
            env_open_opts.map_size(MAP_SIZE).max_dbs(State::NUM_DBS);
            unsafe { Env::open(&env_open_opts, &env_path) }?
        };
        let seed_statuses = config.seed_verification_statuses;
        let state = State::new(&env, config)?;
        if seed_statuses {
            let mut rwtxn = env.write_txn()?;
            let added = state.claims().seed_verification_statuses(&mut rwtxn)?;
            rwtxn.commit().map_err(RwTxnError::from)?;
            if added > 0 {
                tracing::info!(added, "seeded verification statuses");
            }
        }
        tracing::debug!(path = %env_path.display(), "opened database");
        Ok(Self { env, state })
    }

    pub fn config(&self) -> &MarketConfig {
        self.state.config()
    }

    pub fn wallet_login(
        &self,
        wallet: &WalletAddress,
    ) -> Result<(UserAccount, bool), Error> {
        let mut rwtxn = self.env.write_txn()?;
        let res =
            self.state
                .get_or_create_account(&mut rwtxn, wallet, Utc::now())?;
        rwtxn.commit().map_err(RwTxnError::from)?;
        Ok(res)
    }

    pub fn get_user(
        &self,
        wallet: &WalletAddress,
    ) -> Result<UserAccount, Error> {
        let rotxn = self.env.read_txn()?;
        Ok(self.state.accounts().get_account(&rotxn, wallet)?)
    }

    pub fn submit_claim(
        &self,
        text: String,
        author: WalletAddress,
    ) -> Result<Claim, Error> {
        self.submit_claim_at(text, author, Utc::now())
    }

    /// Submit a claim with an explicit submission time
    pub fn submit_claim_at(
        &self,
        text: String,
        author: WalletAddress,
        now: DateTime<Utc>,
    ) -> Result<Claim, Error> {
        let mut rwtxn = self.env.write_txn()?;
        let claim = self.state.submit_claim(&mut rwtxn, text, author, now)?;
        rwtxn.commit().map_err(RwTxnError::from)?;
        Ok(claim)
    }

    pub fn set_claim_status(
        &self,
        claim_id: ClaimId,
        status: VerificationStatusName,
        description: Option<String>,
    ) -> Result<Claim, Error> {
        let mut rwtxn = self.env.write_txn()?;
        let claim = self.state.set_claim_status(
            &mut rwtxn,
            claim_id,
            status,
            description,
            Utc::now(),
        )?;
        rwtxn.commit().map_err(RwTxnError::from)?;
        Ok(claim)
    }

    pub fn get_claim(&self, claim_id: ClaimId) -> Result<Claim, Error> {
        let rotxn = self.env.read_txn()?;
        Ok(self.state.claims().get_claim(&rotxn, claim_id)?)
    }

    pub fn try_get_claim_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<Claim>, Error> {
        let rotxn = self.env.read_txn()?;
        Ok(self.state.claims().try_get_claim_by_slug(&rotxn, slug)?)
    }

    pub fn create_market(
        &self,
        claim_id: ClaimId,
        requester: &WalletAddress,
    ) -> Result<(Market, Claim), Error> {
        self.create_market_at(claim_id, requester, Utc::now())
    }

    /// Create a market as if requested at `now`
    pub fn create_market_at(
        &self,
        claim_id: ClaimId,
        requester: &WalletAddress,
        now: DateTime<Utc>,
    ) -> Result<(Market, Claim), Error> {
        let mut rwtxn = self.env.write_txn()?;
        let res =
            self.state
                .create_market(&mut rwtxn, claim_id, requester, now)?;
        rwtxn.commit().map_err(RwTxnError::from)?;
        Ok(res)
    }

    pub fn get_market(&self, market_id: MarketId) -> Result<Market, Error> {
        let rotxn = self.env.read_txn()?;
        Ok(self.state.markets().get_market(&rotxn, market_id)?)
    }

    pub fn list_markets(&self) -> Result<Vec<MarketSummary>, Error> {
        let rotxn = self.env.read_txn()?;
        Ok(self.state.list_markets(&rotxn)?)
    }

    pub fn quote_buy(
        &self,
        market_id: MarketId,
        side: Side,
        shares: FixedDecimal,
    ) -> Result<Quote, Error> {
        let rotxn = self.env.read_txn()?;
        Ok(self.state.quote_buy(&rotxn, market_id, side, shares)?)
    }

    /// Execute a purchase. Either the debit, pool decrement and position
    /// update are all committed, or nothing is.
    pub fn buy_shares(
        &self,
        wallet: &WalletAddress,
        market_id: MarketId,
        side: Side,
        shares: FixedDecimal,
    ) -> Result<BuyReceipt, Error> {
        let mut rwtxn = self.env.write_txn()?;
        let receipt = self.state.buy(
            &mut rwtxn,
            wallet,
            market_id,
            side,
            shares,
            Utc::now(),
        )?;
        rwtxn.commit().map_err(RwTxnError::from)?;
        Ok(receipt)
    }

    pub fn user_positions(
        &self,
        wallet: &WalletAddress,
    ) -> Result<Vec<PositionSummary>, Error> {
        let rotxn = self.env.read_txn()?;
        Ok(self.state.user_positions(&rotxn, wallet)?)
    }

    pub fn market_positions(
        &self,
        market_id: MarketId,
    ) -> Result<Vec<MarketPosition>, Error> {
        let rotxn = self.env.read_txn()?;
        Ok(self
            .state
            .positions()
            .get_market_positions(&rotxn, market_id)?)
    }

    pub fn verify_conservation(&self, market_id: MarketId) -> Result<(), Error> {
        let rotxn = self.env.read_txn()?;
        Ok(self.state.verify_conservation(&rotxn, market_id)?)
    }
}
