//! Claim submission, status changes and the market creation gate

use chrono::{DateTime, Utc};
use sneed::RwTxn;

use crate::{
    state::{Claim, Error, Market, State},
    types::{ClaimId, VerificationStatusName, WalletAddress},
};

const MARKET_CREATED_DESCRIPTION: &str =
    "Market has been created for this claim.";

impl State {
    /// Store a new claim awaiting AI review
    pub fn submit_claim(
        &self,
        rwtxn: &mut RwTxn,
        text: String,
        author: WalletAddress,
        now: DateTime<Utc>,
    ) -> Result<Claim, Error> {
        let status = self.claims().require_verification_status(
            rwtxn,
            VerificationStatusName::PendingAiReview,
        )?;
        let claim_id = self.claims().next_claim_id(rwtxn)?;
        let claim = Claim::new(claim_id, text, author, &status, now)?;
        let claim = self.claims().insert_claim(rwtxn, claim)?;
        tracing::info!(
            claim_id = %claim.id,
            slug = %claim.slug,
            author = %claim.author,
            "submitted claim"
        );
        Ok(claim)
    }

    /// Move a claim to another verification status. `market_created` is
    /// reserved for [`Self::create_market`].
    pub fn set_claim_status(
        &self,
        rwtxn: &mut RwTxn,
        claim_id: ClaimId,
        name: VerificationStatusName,
        description: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Claim, Error> {
        if name == VerificationStatusName::MarketCreated {
            return Err(Error::validation(
                "market_created is only set by creating a market",
            ));
        }
        let mut claim = self.claims().get_claim(rwtxn, claim_id)?;
        let status = self.claims().require_verification_status(rwtxn, name)?;
        let previous = claim.verification_status;
        claim.set_status(&status, description, now);
        self.claims().put_claim(rwtxn, &claim)?;
        tracing::info!(
            %claim_id,
            from = %previous,
            to = %claim.verification_status,
            "changed claim status"
        );
        Ok(claim)
    }

    /// Open the market for a claim and mark the claim `market_created`.
    ///
    /// Checks, in order: the claim exists, it has no market yet, it has been
    /// AI-verified, and the requester is the author if the claim is still
    /// inside its exclusivity window. Both writes go into `rwtxn`, so they
    /// commit or abort together.
    pub fn create_market(
        &self,
        rwtxn: &mut RwTxn,
        claim_id: ClaimId,
        requester: &WalletAddress,
        now: DateTime<Utc>,
    ) -> Result<(Market, Claim), Error> {
        let mut claim = self.claims().get_claim(rwtxn, claim_id)?;
        if let Some(existing) =
            self.markets().try_get_market_by_claim(rwtxn, claim_id)?
        {
            return Err(Error::MarketExists {
                claim_id,
                market_id: existing.id,
            });
        }
        if !claim.verification_status.is_ai_verified() {
            return Err(Error::ClaimNotVerified {
                claim_id,
                status: claim.verification_status,
            });
        }
        // A clock behind the claim's timestamp still counts as inside the
        // window.
        let window = self.config().exclusivity_window;
        if now - claim.created_at <= window && *requester != claim.author {
            tracing::debug!(
                %claim_id,
                %requester,
                author = %claim.author,
                "market creation refused inside exclusivity window"
            );
            return Err(Error::ExclusivityWindow {
                claim_id,
                window_mins: self.config().exclusivity_window_mins(),
            });
        }
        let status = self.claims().require_verification_status(
            rwtxn,
            VerificationStatusName::MarketCreated,
        )?;

        let market_id = self.markets().next_market_id(rwtxn)?;
        let market = Market::new(
            market_id,
            claim_id,
            requester.clone(),
            self.config().curve,
            now,
        );
        self.markets().add_market(rwtxn, &market)?;
        claim.set_status(
            &status,
            Some(MARKET_CREATED_DESCRIPTION.to_owned()),
            now,
        );
        self.claims().put_claim(rwtxn, &claim)?;
        tracing::info!(
            %market_id,
            %claim_id,
            creator = %requester,
            "created market"
        );
        Ok((market, claim))
    }
}
