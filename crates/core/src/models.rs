//! Domain models for ingested payments and their claims.
//!
//! These models are storage-agnostic and represent the canonical
//! form of ingested data within the domain layer. The store is a
//! ledger: a [`Transfer`] is written once on first observation and
//! never mutated afterwards.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Sentinel credential meaning "account created but not yet configured".
///
/// Accounts carrying this token (or an empty token) must never be polled.
pub const PLACEHOLDER_TOKEN: &str = "PLACEHOLDER_TOKEN";

// =============================================================================
// Accounts
// =============================================================================

/// A provider credential scope whose payments are polled independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Internal account identifier.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Provider access credential, sent as a bearer token.
    pub access_token: String,
    /// Whether the poller should consider this account at all.
    pub active: bool,
}

impl Account {
    /// Whether this account may be polled.
    ///
    /// An inactive account or one with a placeholder/empty credential is
    /// skipped. The account directory enforces the same rule in SQL; this
    /// is the in-process guard for accounts obtained another way.
    pub fn is_pollable(&self) -> bool {
        self.active && !self.access_token.is_empty() && self.access_token != PLACEHOLDER_TOKEN
    }
}

// =============================================================================
// Transfers
// =============================================================================

/// One normalized, deduplicated payment notification from the provider.
///
/// The pair `(account_id, provider_id)` is unique: re-observing the same
/// provider event across any number of poll ticks never creates a second
/// row. The surrogate `id` is assigned at insertion and is what claims
/// reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transfer {
    /// Surrogate identifier assigned by the store.
    pub id: i64,
    /// Owning account.
    pub account_id: i64,
    /// Provider-assigned natural identifier, unique per account.
    pub provider_id: String,
    /// Event timestamp, normalized to UTC.
    pub date_created: DateTime<Utc>,
    /// Amount, fixed-point with two fraction digits.
    pub amount: Decimal,
    /// Provider status string (e.g. "approved", "pending", "rejected").
    pub status: String,
    /// Provider payment-method classifier.
    pub payment_type: String,
    /// Opaque raw payload retained for audit/debugging.
    pub raw: serde_json::Value,
    /// When this transfer was first observed.
    pub ingested_at: DateTime<Utc>,
}

// =============================================================================
// Acknowledgments
// =============================================================================

/// The single permitted binding of one transfer to one claimant.
///
/// At most one acknowledgment exists per transfer, enforced by the
/// storage layer (`transfer_id` is the primary key), not by application
/// logic. Never mutated, never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acknowledgment {
    /// The claimed transfer's surrogate identifier.
    pub transfer_id: i64,
    /// Authenticated identity that won the claim.
    pub claimant: String,
    /// Claim instant, UTC.
    pub claimed_at: DateTime<Utc>,
    /// Calendar date of the claim in the configured civil timezone,
    /// used for "claims by day" queries.
    pub claimed_on: NaiveDate,
}

/// Outcome of a claim request.
///
/// Exactly one `Won` outcome exists system-wide per transfer, regardless
/// of arrival order or interleaving; the database decides, not the
/// application clock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ClaimOutcome {
    /// No prior acknowledgment existed; one was created for the caller.
    Won {
        /// The new owner (the caller).
        owner: String,
    },
    /// The caller already owns the acknowledgment; idempotent success.
    AlreadyOwnedBySelf {
        /// The existing owner (the caller).
        owner: String,
    },
    /// Another claimant got there first. A business outcome, not an error.
    Conflict {
        /// The true current owner, for "already taken by X" reporting.
        owner: String,
    },
}

impl ClaimOutcome {
    /// The current owner of the transfer after this claim attempt.
    pub fn owner(&self) -> &str {
        match self {
            Self::Won { owner } | Self::AlreadyOwnedBySelf { owner } | Self::Conflict { owner } => {
                owner
            }
        }
    }

    /// Whether the caller ends up owning the transfer.
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Conflict { .. })
    }
}

// =============================================================================
// Poller State
// =============================================================================

/// Per-tick ingestion summary, emitted for observability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Accounts successfully processed this tick.
    pub accounts_processed: usize,
    /// Accounts whose processing failed this tick.
    pub accounts_failed: usize,
    /// Transfers returned by the provider (including already-seen ones).
    pub transfers_seen: usize,
    /// Transfers newly inserted this tick.
    pub transfers_inserted: usize,
}

// =============================================================================
// Tests
// =============================================================================
