//! Acknowledgment arbiter - resolves claim races to a single winner.
//!
//! Multiple operators may claim the same transfer concurrently. The
//! arbiter never checks-then-inserts: the only write is an atomic
//! conditional insert against the store's uniqueness constraint, and
//! the row-created flag decides who won. Arrival order at the
//! application layer is irrelevant; the database decides.

use std::sync::Arc;

use chrono::{FixedOffset, NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::{debug, instrument};

use crate::error::{ClaimError, ClaimResult, StorageError};
use crate::metrics::record_claim;
use crate::models::{Acknowledgment, ClaimOutcome, Transfer};
use crate::ports::{ClaimedTransfer, Repositories};

/// One claimant's claims on a civil date, with the running total amount.
#[derive(Debug, Clone)]
pub struct DayClaims {
    pub claims: Vec<ClaimedTransfer>,
    pub total: Decimal,
}

/// Claim resolution service.
///
/// The state machine per transfer is `Unclaimed -> Claimed(owner)`:
/// one-shot and irreversible within this engine. A claimant retrying
/// their own claim gets an idempotent success; anyone else gets a
/// conflict naming the actual owner.
pub struct ClaimService {
    repositories: Arc<dyn Repositories>,
    /// Fixed offset used to derive the civil date of a claim.
    civil_offset: FixedOffset,
}

impl ClaimService {
    pub fn new(repositories: Arc<dyn Repositories>, civil_offset: FixedOffset) -> Self {
        Self {
            repositories,
            civil_offset,
        }
    }

    /// Resolve a claim request to its definitive outcome.
    ///
    /// `identity` may be the surrogate identifier or the provider's
    /// natural identifier; numeric identities try the surrogate first.
    #[instrument(skip(self), fields(claimant = %claimant))]
    pub async fn claim(&self, identity: &str, claimant: &str) -> ClaimResult<ClaimOutcome> {
        let transfer = self.resolve(identity).await?;

        let claimed_at = Utc::now();
        let ack = Acknowledgment {
            transfer_id: transfer.id,
            claimant: claimant.to_string(),
            claimed_at,
            claimed_on: claimed_at.with_timezone(&self.civil_offset).date_naive(),
        };

        if self.repositories.acknowledgments().try_claim(&ack).await? {
            debug!(transfer = transfer.id, "Claim won");
            record_claim("won");
            return Ok(ClaimOutcome::Won {
                owner: claimant.to_string(),
            });
        }

        // Losing insert: exactly one follow-up read to name the owner.
        let existing = self
            .repositories
            .acknowledgments()
            .get_for_transfer(transfer.id)
            .await?
            .ok_or_else(|| {
                // Acknowledgments are never deleted, so a lost race with
                // no surviving row means the store is inconsistent.
                ClaimError::Storage(StorageError::NotFound(format!(
                    "acknowledgment for transfer {}",
                    transfer.id
                )))
            })?;

        if existing.claimant == claimant {
            debug!(transfer = transfer.id, "Idempotent claim retry");
            record_claim("retry");
            Ok(ClaimOutcome::AlreadyOwnedBySelf {
                owner: existing.claimant,
            })
        } else {
            debug!(transfer = transfer.id, owner = %existing.claimant, "Claim conflict");
            record_claim("conflict");
            Ok(ClaimOutcome::Conflict {
                owner: existing.claimant,
            })
        }
    }

    /// Transfers with no acknowledgment, most recent first.
    pub async fn list_unclaimed(&self, limit: u32) -> ClaimResult<Vec<Transfer>> {
        Ok(self.repositories.transfers().list_unclaimed(limit).await?)
    }

    /// One claimant's claims on a civil date, with the running total.
    pub async fn claims_for_day(&self, claimant: &str, date: NaiveDate) -> ClaimResult<DayClaims> {
        let claims = self
            .repositories
            .acknowledgments()
            .list_for_claimant_on(claimant, date)
            .await?;
        let total = claims.iter().map(|c| c.transfer.amount).sum();
        Ok(DayClaims { claims, total })
    }

    /// Resolve an identity to a stored transfer.
    async fn resolve(&self, identity: &str) -> ClaimResult<Transfer> {
        if let Ok(id) = identity.parse::<i64>() {
            if let Some(transfer) = self.repositories.transfers().get(id).await? {
                return Ok(transfer);
            }
        }

        self.repositories
            .transfers()
            .get_by_provider_id(identity)
            .await?
            .ok_or_else(|| ClaimError::NotFound(identity.to_string()))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryRepositories;
    use chrono::DateTime;
    use rust_decimal::Decimal;

    fn service(repos: Arc<InMemoryRepositories>) -> ClaimService {
        // UTC-3 civil timezone, matching the reference deployment.
        let offset = FixedOffset::west_opt(3 * 3600).unwrap();
        ClaimService::new(repos, offset)
    }

    async fn seed_transfer(repos: &InMemoryRepositories, provider_id: &str) -> i64 {
        repos
            .seed_transfer(1, provider_id, Utc::now(), Decimal::new(150050, 2))
            .await
    }

    #[tokio::test]
    async fn first_claim_wins() {
        let repos = Arc::new(InMemoryRepositories::new());
        let id = seed_transfer(&repos, "139322351059").await;

        let outcome = service(repos.clone())
            .claim(&id.to_string(), "Banfield")
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ClaimOutcome::Won {
                owner: "Banfield".into()
            }
        );
    }

    #[tokio::test]
    async fn losing_claim_reports_true_owner() {
        let repos = Arc::new(InMemoryRepositories::new());
        let id = seed_transfer(&repos, "139322351059").await;
        let svc = service(repos.clone());

        svc.claim(&id.to_string(), "Banfield").await.unwrap();
        let outcome = svc.claim(&id.to_string(), "Adrogue").await.unwrap();

        assert_eq!(
            outcome,
            ClaimOutcome::Conflict {
                owner: "Banfield".into()
            }
        );
    }

    #[tokio::test]
    async fn self_retry_is_idempotent_success() {
        let repos = Arc::new(InMemoryRepositories::new());
        let id = seed_transfer(&repos, "139322351059").await;
        let svc = service(repos.clone());

        svc.claim(&id.to_string(), "Banfield").await.unwrap();
        let outcome = svc.claim(&id.to_string(), "Banfield").await.unwrap();

        assert_eq!(
            outcome,
            ClaimOutcome::AlreadyOwnedBySelf {
                owner: "Banfield".into()
            }
        );
        // No duplicate row.
        assert_eq!(repos.ack_count().await, 1);
    }

    #[tokio::test]
    async fn concurrent_claims_produce_exactly_one_winner() {
        let repos = Arc::new(InMemoryRepositories::new());
        let id = seed_transfer(&repos, "139322351059").await;
        let svc = Arc::new(service(repos.clone()));

        let mut handles = Vec::new();
        for claimant in ["Banfield", "Adrogue", "Lanus", "Temperley"] {
            let svc = svc.clone();
            handles.push(tokio::spawn(async move {
                svc.claim(&id.to_string(), claimant).await.unwrap()
            }));
        }

        let mut wins = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                ClaimOutcome::Won { .. } => wins += 1,
                ClaimOutcome::Conflict { .. } => conflicts += 1,
                ClaimOutcome::AlreadyOwnedBySelf { .. } => panic!("no retries issued"),
            }
        }

        assert_eq!(wins, 1);
        assert_eq!(conflicts, 3);
        assert_eq!(repos.ack_count().await, 1);
    }

    #[tokio::test]
    async fn claim_by_natural_identifier_resolves() {
        let repos = Arc::new(InMemoryRepositories::new());
        seed_transfer(&repos, "pay-abc-999").await;

        let outcome = service(repos.clone())
            .claim("pay-abc-999", "Banfield")
            .await
            .unwrap();
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn unknown_identity_is_not_found() {
        let repos = Arc::new(InMemoryRepositories::new());
        let err = service(repos).claim("does-not-exist", "Banfield").await;
        assert!(matches!(err, Err(ClaimError::NotFound(_))));
    }

    #[tokio::test]
    async fn claims_for_day_sums_amounts() {
        let repos = Arc::new(InMemoryRepositories::new());
        let svc = service(repos.clone());

        let a = repos
            .seed_transfer(1, "a", Utc::now(), Decimal::new(1000, 2))
            .await;
        let b = repos
            .seed_transfer(1, "b", Utc::now(), Decimal::new(2550, 2))
            .await;
        svc.claim(&a.to_string(), "Banfield").await.unwrap();
        svc.claim(&b.to_string(), "Banfield").await.unwrap();

        let offset = FixedOffset::west_opt(3 * 3600).unwrap();
        let today = Utc::now().with_timezone(&offset).date_naive();
        let day = svc.claims_for_day("Banfield", today).await.unwrap();

        assert_eq!(day.claims.len(), 2);
        assert_eq!(day.total, Decimal::new(3550, 2));
    }

    #[test]
    fn civil_date_shifts_across_midnight() {
        // 01:30 UTC is still the previous day at UTC-3.
        let at: DateTime<Utc> = "2024-05-02T01:30:00Z".parse().unwrap();
        let offset = FixedOffset::west_opt(3 * 3600).unwrap();
        assert_eq!(
            at.with_timezone(&offset).date_naive(),
            "2024-05-01".parse::<NaiveDate>().unwrap()
        );
    }
}
