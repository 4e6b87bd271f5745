//! Error types for the paydesk domain layer.
//!
//! This module defines a hierarchy of error types:
//!
//! - [`StorageError`] - Database/repository errors
//! - [`ProviderError`] - Payment provider HTTP errors
//! - [`ClaimError`] - Claim request failures
//! - [`PollerError`] - Top-level ingestion loop errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.
//!
//! A lost claim race is deliberately *not* an error: it is the
//! `Conflict` variant of [`crate::models::ClaimOutcome`].

use thiserror::Error;

// =============================================================================
// Storage Errors
// =============================================================================

/// Database and repository errors.
///
/// These errors originate from storage operations like queries,
/// transactions, and data serialization.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Failed to establish database connection.
    #[error("Database connection error: {0}")]
    ConnectionError(String),

    /// SQL query execution failed.
    #[error("Query execution error: {0}")]
    QueryError(String),

    /// Requested record was not found.
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Database constraint was violated (unique, foreign key, etc.).
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Database migration failed.
    #[error("Migration error: {0}")]
    MigrationError(String),

    /// Transaction commit/rollback failed.
    #[error("Transaction error: {0}")]
    TransactionError(String),

    /// Data serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

// =============================================================================
// Provider Errors
// =============================================================================

/// Payment provider API errors.
///
/// These errors occur when querying the provider's payment search
/// endpoint. The client never retries; the poller's next scheduled
/// tick re-covers the window.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Could not reach the provider at all.
    #[error("Provider connection failed: {0}")]
    ConnectionFailed(String),

    /// Provider answered with a non-success HTTP status.
    #[error("Provider request failed with status {status}: {body}")]
    RequestFailed {
        /// HTTP status code returned by the provider.
        status: u16,
        /// Response body, kept for diagnostics.
        body: String,
    },

    /// Response body was not the expected shape (e.g. missing `results`).
    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),
}

// =============================================================================
// Claim Errors
// =============================================================================

/// Claim request failures surfaced to the operator API.
#[derive(Debug, Error)]
pub enum ClaimError {
    /// No transfer matches the given identity.
    #[error("Transfer not found: {0}")]
    NotFound(String),

    /// Storage operation failed; the caller may retry manually.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

// =============================================================================
// Poller Errors
// =============================================================================

/// Top-level ingestion loop errors.
///
/// This is the main error type returned by [`crate::services::PollerService`].
/// Per-account failures never surface here; they are contained within a tick.
#[derive(Debug, Error)]
pub enum PollerError {
    /// Account directory unreachable or malformed; fatal to the
    /// current tick, not the process.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Storage/database error.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Provider API error.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Graceful shutdown was requested.
    ///
    /// This is not really an error but uses the error type for control flow.
    #[error("Poller shutdown requested")]
    ShutdownRequested,
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Result type for claim operations.
pub type ClaimResult<T> = Result<T, ClaimError>;

/// Result type for poller operations.
pub type PollerResult<T> = Result<T, PollerError>;
