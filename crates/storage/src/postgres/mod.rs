//! PostgreSQL storage adapter.
//!
//! This module implements the repository traits defined in `paydesk-core`
//! using PostgreSQL as the backing store.
//!
//! # Architecture
//!
//! - [`Database`] - Connection pool and migrations
//! - [`PgRepositories`] - Composite repository implementing `Repositories`
//! - Individual repos: `PgAccountRepository`, `PgTransferRepository`,
//!   `PgAcknowledgmentRepository`
//!
//! # Usage
//!
//! ```ignore
//! let config = DatabaseConfig::for_poller(&database_url);
//! let db = Database::connect(&config).await?;
//! db.migrate().await?;
//!
//! let repositories = PgRepositories::new(Arc::new(db));
//! ```

mod account_repo;
mod ack_repo;
mod database;
mod transfer_repo;

pub use account_repo::PgAccountRepository;
pub use ack_repo::PgAcknowledgmentRepository;
pub use database::{Database, DatabaseConfig};
pub use transfer_repo::PgTransferRepository;

use std::sync::Arc;

use paydesk_core::ports::{
    AccountRepository, AcknowledgmentRepository, Repositories, TransferRepository,
};

// =============================================================================
// Composite Repository
// =============================================================================

/// Aggregated PostgreSQL repositories implementing the `Repositories` trait.
///
/// This provides a single entry point for all storage operations. No
/// cross-table transactions are needed here: every write in this system
/// is a single-row conditional insert arbitrated by a constraint.
pub struct PgRepositories {
    accounts: PgAccountRepository,
    transfers: PgTransferRepository,
    acknowledgments: PgAcknowledgmentRepository,
}

impl PgRepositories {
    /// Create a new repository aggregate from a database connection.
    pub fn new(db: Arc<Database>) -> Self {
        let pool = db.pool().clone();
        Self {
            accounts: PgAccountRepository::new(pool.clone()),
            transfers: PgTransferRepository::new(pool.clone()),
            acknowledgments: PgAcknowledgmentRepository::new(pool),
        }
    }
}

impl Repositories for PgRepositories {
    fn accounts(&self) -> &dyn AccountRepository {
        &self.accounts
    }

    fn transfers(&self) -> &dyn TransferRepository {
        &self.transfers
    }

    fn acknowledgments(&self) -> &dyn AcknowledgmentRepository {
        &self.acknowledgments
    }
}
