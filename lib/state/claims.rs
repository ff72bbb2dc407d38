//! Claims and the verification status reference table.
//!
//! Claims are owned by the submission pipeline; this store keeps only what
//! market creation needs: author, creation time, status and slug.

use chrono::{DateTime, Utc};
use heed::types::SerdeBincode;
use serde::{Deserialize, Serialize};
use sneed::{DatabaseUnique, Env, RoTxn, RwTxn, UnitKey};
use strum::IntoEnumIterator as _;

use crate::{
    state::error::Error,
    types::{
        ClaimId, MAX_SLUG_LEN, VerificationStatusName, WalletAddress,
        fingerprint, slugify,
    },
};

/// `base` cut short enough that `base` + `suffix` fits in [`MAX_SLUG_LEN`].
/// Slugs are ASCII, so cutting at any byte offset is safe.
fn suffixed_slug(base: &str, suffix: &str) -> String {
    let keep = MAX_SLUG_LEN.saturating_sub(suffix.len()).min(base.len());
    let base = base[..keep].trim_end_matches('-');
    format!("{base}{suffix}")
}

/// Row of the verification status reference table
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct VerificationStatus {
    pub name: VerificationStatusName,
    pub description: String,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct Claim {
    pub id: ClaimId,
    pub text: String,
    pub slug: String,
    pub fingerprint: String,
    pub author: WalletAddress,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub verification_status: VerificationStatusName,
    pub status_description: Option<String>,
}

impl Claim {
    /// Build a claim with its derived fields. `slug` is the candidate slug;
    /// uniqueness is resolved by [`Dbs::insert_claim`].
    pub fn new(
        id: ClaimId,
        text: String,
        author: WalletAddress,
        status: &VerificationStatus,
        created_at: DateTime<Utc>,
    ) -> Result<Self, Error> {
        let text = text.trim().to_owned();
        if text.is_empty() {
            return Err(Error::validation("claim text must not be empty"));
        }
        let mut slug = slugify(&text);
        if slug.is_empty() {
            slug = format!("claim-{id}");
        }
        Ok(Self {
            id,
            fingerprint: fingerprint(&text),
            slug,
            text,
            author,
            created_at,
            updated_at: created_at,
            verification_status: status.name,
            status_description: None,
        })
    }

    pub fn set_status(
        &mut self,
        status: &VerificationStatus,
        description: Option<String>,
        now: DateTime<Utc>,
    ) {
        self.verification_status = status.name;
        self.status_description = description;
        self.updated_at = now;
    }
}

#[derive(Clone)]
pub struct Dbs {
    claims: DatabaseUnique<SerdeBincode<ClaimId>, SerdeBincode<Claim>>,
    claims_by_slug: DatabaseUnique<SerdeBincode<String>, SerdeBincode<ClaimId>>,
    next_claim_id: DatabaseUnique<UnitKey, SerdeBincode<ClaimId>>,
    statuses: DatabaseUnique<
        SerdeBincode<VerificationStatusName>,
        SerdeBincode<VerificationStatus>,
    >,
}

impl Dbs {
    pub const NUM_DBS: u32 = 4;

    /// Does not commit the RwTxn.
    pub fn new(env: &Env, rwtxn: &mut RwTxn) -> Result<Self, Error> {
        let claims = DatabaseUnique::create(env, rwtxn, "claims")?;
        let claims_by_slug =
            DatabaseUnique::create(env, rwtxn, "claims_by_slug")?;
        let next_claim_id =
            DatabaseUnique::create(env, rwtxn, "next_claim_id")?;
        let statuses =
            DatabaseUnique::create(env, rwtxn, "verification_statuses")?;
        Ok(Self {
            claims,
            claims_by_slug,
            next_claim_id,
            statuses,
        })
    }

    /// Insert every known status that does not have a row yet. Returns the
    /// number of rows added.
    pub fn seed_verification_statuses(
        &self,
        rwtxn: &mut RwTxn,
    ) -> Result<usize, Error> {
        let mut added = 0;
        for name in VerificationStatusName::iter() {
            if self.statuses.try_get(rwtxn, &name)?.is_some() {
                continue;
            }
            let status = VerificationStatus {
                name,
                description: name.default_description().to_owned(),
            };
            self.statuses.put(rwtxn, &name, &status)?;
            tracing::debug!(status = %name, "added verification status");
            added += 1;
        }
        Ok(added)
    }

    pub fn put_verification_status(
        &self,
        rwtxn: &mut RwTxn,
        status: &VerificationStatus,
    ) -> Result<(), Error> {
        self.statuses.put(rwtxn, &status.name, status)?;
        Ok(())
    }

    pub fn try_get_verification_status(
        &self,
        rotxn: &RoTxn,
        name: VerificationStatusName,
    ) -> Result<Option<VerificationStatus>, Error> {
        Ok(self.statuses.try_get(rotxn, &name)?)
    }

    /// Look up a status row that the engine cannot operate without. A
    /// missing row is reference data gone missing, not a user error.
    pub fn require_verification_status(
        &self,
        rotxn: &RoTxn,
        name: VerificationStatusName,
    ) -> Result<VerificationStatus, Error> {
        match self.try_get_verification_status(rotxn, name)? {
            Some(status) => Ok(status),
            None => {
                tracing::error!(
                    status = %name,
                    "required verification status row is missing"
                );
                Err(Error::MissingVerificationStatus { name })
            }
        }
    }

    pub fn try_get_claim(
        &self,
        rotxn: &RoTxn,
        claim_id: ClaimId,
    ) -> Result<Option<Claim>, Error> {
        Ok(self.claims.try_get(rotxn, &claim_id)?)
    }

    pub fn get_claim(
        &self,
        rotxn: &RoTxn,
        claim_id: ClaimId,
    ) -> Result<Claim, Error> {
        self.try_get_claim(rotxn, claim_id)?
            .ok_or(Error::ClaimNotFound { claim_id })
    }

    pub fn try_get_claim_by_slug(
        &self,
        rotxn: &RoTxn,
        slug: &str,
    ) -> Result<Option<Claim>, Error> {
        match self.claims_by_slug.try_get(rotxn, &slug.to_owned())? {
            Some(claim_id) => self.try_get_claim(rotxn, claim_id),
            None => Ok(None),
        }
    }

    /// Allocate the next claim id
    pub fn next_claim_id(&self, rwtxn: &mut RwTxn) -> Result<ClaimId, Error> {
        let id = self
            .next_claim_id
            .try_get(rwtxn, &())?
            .unwrap_or(ClaimId(1));
        self.next_claim_id.put(rwtxn, &(), &id.next())?;
        Ok(id)
    }

    /// Store a new claim, suffixing its slug with the claim id until the
    /// slug is free.
    pub fn insert_claim(
        &self,
        rwtxn: &mut RwTxn,
        mut claim: Claim,
    ) -> Result<Claim, Error> {
        let base_slug = claim.slug.clone();
        let mut attempt = 0u32;
        while self.claims_by_slug.try_get(rwtxn, &claim.slug)?.is_some() {
            attempt += 1;
            let suffix = match attempt {
                1 => format!("-{}", claim.id),
                _ => format!("-{}-{attempt}", claim.id),
            };
            claim.slug = suffixed_slug(&base_slug, &suffix);
        }
        self.claims_by_slug.put(rwtxn, &claim.slug, &claim.id)?;
        self.claims.put(rwtxn, &claim.id, &claim)?;
        Ok(claim)
    }

    /// Overwrite an existing claim. The slug index is left untouched.
    pub fn put_claim(
        &self,
        rwtxn: &mut RwTxn,
        claim: &Claim,
    ) -> Result<(), Error> {
        self.claims.put(rwtxn, &claim.id, claim)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::suffixed_slug;
    use crate::types::MAX_SLUG_LEN;

    #[test]
    fn test_suffixed_slug_fits_limit() {
        assert_eq!(suffixed_slug("same-text", "-2"), "same-text-2");
        let base = "ab-".repeat(50);
        let slug = suffixed_slug(&base, "-17");
        assert_eq!(slug.len(), MAX_SLUG_LEN - 1);
        assert!(slug.ends_with("ab-17"));
    }
}
