//! Storage layer for the paydesk engine.
//!
//! This crate provides PostgreSQL implementations of the repository traits
//! defined in `paydesk-core`. It handles all database interactions including
//! connection pooling, migrations, and queries.
//!
//! # Architecture
//!
//! The storage layer follows the repository pattern:
//!
//! - [`postgres::Database`] - Connection pool management
//! - [`postgres::PgRepositories`] - Composite repository for all entity types
//! - Individual repositories for accounts, transfers and acknowledgments
//!
//! The two correctness-critical constraints live in the schema, not in
//! application code: `transfers` is unique on `(account_id, provider_id)`
//! (ingestion dedup) and `acknowledgments` keys on `transfer_id`
//! (at-most-one claim).
//!
//! # Usage
//!
//! ```ignore
//! use paydesk_storage::{Database, DatabaseConfig, PgRepositories};
//!
//! let config = DatabaseConfig::for_poller(&database_url);
//! let db = Database::connect(&config).await?;
//! db.migrate().await?;
//!
//! let repositories = Arc::new(PgRepositories::new(Arc::new(db)));
//! ```

pub mod postgres;

pub use postgres::{Database, DatabaseConfig, PgRepositories};
