//! Port traits for data repositories.
//!
//! These traits define the storage interface used by the domain layer.
//! Implementations live in the infrastructure layer (e.g., `paydesk-storage`).
//!
//! The event store is the single synchronization point between the poller
//! and the claim arbiter: both rely on its uniqueness constraints instead
//! of in-process locks.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

use crate::error::StorageResult;
use crate::models::{Account, Acknowledgment, Transfer};

// =============================================================================
// Write Shapes
// =============================================================================

/// A normalized transfer ready for insertion, before the store has
/// assigned its surrogate identifier.
#[derive(Debug, Clone)]
pub struct NewTransfer {
    pub account_id: i64,
    pub provider_id: String,
    pub date_created: DateTime<Utc>,
    pub amount: Decimal,
    pub status: String,
    pub payment_type: String,
    pub raw: serde_json::Value,
    pub ingested_at: DateTime<Utc>,
}

/// Account data as seeded from configuration (no identifier yet).
#[derive(Debug, Clone)]
pub struct AccountSeed {
    pub name: String,
    pub access_token: String,
    pub active: bool,
}

/// A transfer together with its acknowledgment, as returned by
/// claims-by-day queries.
#[derive(Debug, Clone)]
pub struct ClaimedTransfer {
    pub transfer: Transfer,
    pub claimed_at: DateTime<Utc>,
}

// =============================================================================
// Repository Traits
// =============================================================================

/// Repository for provider accounts (the account directory).
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// List accounts eligible for polling: `active = TRUE` with a
    /// non-placeholder credential, ordered by identifier for
    /// deterministic iteration.
    async fn list_active(&self) -> StorageResult<Vec<Account>>;

    /// Get an account by identifier.
    async fn get(&self, id: i64) -> StorageResult<Option<Account>>;

    /// Insert or update an account by name (configuration seeding).
    async fn upsert(&self, seed: &AccountSeed) -> StorageResult<Account>;
}

/// Repository for ingested transfers.
#[async_trait]
pub trait TransferRepository: Send + Sync {
    /// Insert a transfer unless `(account_id, provider_id)` already
    /// exists. Returns the surrogate id on insertion, `None` when the
    /// pair was already present: the normal outcome for an already-seen
    /// event, not an error.
    async fn insert_if_absent(&self, transfer: &NewTransfer) -> StorageResult<Option<i64>>;

    /// Get a transfer by surrogate identifier.
    async fn get(&self, id: i64) -> StorageResult<Option<Transfer>>;

    /// Get a transfer by provider natural identifier.
    ///
    /// The natural id is only unique per account; when several accounts
    /// carry the same id, the most recently ingested transfer wins.
    async fn get_by_provider_id(&self, provider_id: &str) -> StorageResult<Option<Transfer>>;

    /// List transfers with no acknowledgment, most recent first.
    async fn list_unclaimed(&self, limit: u32) -> StorageResult<Vec<Transfer>>;
}

/// Repository for acknowledgments (claims).
#[async_trait]
pub trait AcknowledgmentRepository: Send + Sync {
    /// Atomic conditional insert: create the acknowledgment unless one
    /// already exists for the transfer. Returns `true` when the row was
    /// actually created, i.e. the caller won the race.
    ///
    /// This is the sole arbitration mechanism for concurrent claims;
    /// a separate existence check beforehand would be racy.
    async fn try_claim(&self, ack: &Acknowledgment) -> StorageResult<bool>;

    /// Get the acknowledgment for a transfer, if any.
    async fn get_for_transfer(&self, transfer_id: i64) -> StorageResult<Option<Acknowledgment>>;

    /// List one claimant's claims on a given civil date, oldest first.
    async fn list_for_claimant_on(
        &self,
        claimant: &str,
        date: NaiveDate,
    ) -> StorageResult<Vec<ClaimedTransfer>>;
}

// =============================================================================
// Composite Repository
// =============================================================================

/// Combined repository access for the poller and the claim arbiter.
pub trait Repositories: Send + Sync {
    /// Access the account repository.
    fn accounts(&self) -> &dyn AccountRepository;

    /// Access the transfer repository.
    fn transfers(&self) -> &dyn TransferRepository;

    /// Access the acknowledgment repository.
    fn acknowledgments(&self) -> &dyn AcknowledgmentRepository;
}
