//! User accounts and balances

use chrono::{DateTime, Utc};
use fallible_iterator::FallibleIterator as _;
use heed::types::SerdeBincode;
use serde::{Deserialize, Serialize};
use sneed::{DatabaseUnique, Env, RoTxn, RwTxn};

use crate::{
    state::error::Error,
    types::{FixedDecimal, VerificationStatusName, WalletAddress},
};

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct UserAccount {
    pub wallet_address: WalletAddress,
    pub balance: FixedDecimal,
    pub verification_status: VerificationStatusName,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserAccount {
    pub fn new(
        wallet_address: WalletAddress,
        balance: FixedDecimal,
        verification_status: VerificationStatusName,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            wallet_address,
            balance,
            verification_status,
            created_at: now,
            updated_at: now,
        }
    }

    /// Subtract `amount` from the balance, refusing to go below zero.
    pub fn debit(
        &mut self,
        amount: FixedDecimal,
        now: DateTime<Utc>,
    ) -> Result<(), Error> {
        let balance = self.balance.checked_sub(amount).ok_or(
            Error::InsufficientFunds {
                required: amount,
                available: self.balance,
            },
        )?;
        self.balance = balance;
        self.updated_at = now;
        Ok(())
    }
}

#[derive(Clone)]
pub struct Dbs {
    accounts:
        DatabaseUnique<SerdeBincode<WalletAddress>, SerdeBincode<UserAccount>>,
}

impl Dbs {
    pub const NUM_DBS: u32 = 1;

    /// Does not commit the RwTxn.
    pub fn new(env: &Env, rwtxn: &mut RwTxn) -> Result<Self, Error> {
        let accounts = DatabaseUnique::create(env, rwtxn, "user_accounts")?;
        Ok(Self { accounts })
    }

    pub fn try_get_account(
        &self,
        rotxn: &RoTxn,
        wallet: &WalletAddress,
    ) -> Result<Option<UserAccount>, Error> {
        Ok(self.accounts.try_get(rotxn, wallet)?)
    }

    pub fn get_account(
        &self,
        rotxn: &RoTxn,
        wallet: &WalletAddress,
    ) -> Result<UserAccount, Error> {
        self.try_get_account(rotxn, wallet)?
            .ok_or_else(|| Error::UserNotFound {
                wallet: wallet.clone(),
            })
    }

    pub fn put_account(
        &self,
        rwtxn: &mut RwTxn,
        account: &UserAccount,
    ) -> Result<(), Error> {
        self.accounts.put(rwtxn, &account.wallet_address, account)?;
        Ok(())
    }

    /// Debit an account if it holds at least `amount`. Nothing is written
    /// when the balance is short.
    pub fn try_debit(
        &self,
        rwtxn: &mut RwTxn,
        wallet: &WalletAddress,
        amount: FixedDecimal,
        now: DateTime<Utc>,
    ) -> Result<UserAccount, Error> {
        let mut account = self.get_account(rwtxn, wallet)?;
        account.debit(amount, now)?;
        self.put_account(rwtxn, &account)?;
        Ok(account)
    }

    pub fn get_all_accounts(
        &self,
        rotxn: &RoTxn,
    ) -> Result<Vec<UserAccount>, Error> {
        let mut accounts = Vec::new();
        let mut iter = self.accounts.iter(rotxn)?;
        while let Some((_, account)) = iter.next()? {
            accounts.push(account);
        }
        Ok(accounts)
    }
}
