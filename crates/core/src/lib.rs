//! Core domain layer for the paydesk ingestion-and-arbitration engine.
//!
//! This crate contains the domain models, port traits (interfaces), and
//! business logic services for payment-event ingestion and claim
//! arbitration. It follows hexagonal architecture principles - this is
//! the innermost layer with no dependencies on infrastructure.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     paydesk (binary)                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │     paydesk-api       │        paydesk-provider             │
//! │  (operator HTTP)      │        (payment API)                │
//! ├───────────────────────┴─────────────────────────────────────┤
//! │                    paydesk-storage                          │
//! │                     (PostgreSQL)                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │                     paydesk-core  ← YOU ARE HERE            │
//! │               (models, ports, services)                     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`models`] - Domain models (Account, Transfer, Acknowledgment)
//! - [`ports`] - Interface traits for adapters to implement
//! - [`services`] - Core business logic (PollerService, ClaimService)
//! - [`error`] - Domain error types
//! - [`metrics`] - Prometheus metrics definitions
//! - [`testing`] - In-memory port doubles for tests
//!
//! # Key Concepts
//!
//! ## Ports
//!
//! Ports define interfaces that external adapters must implement:
//!
//! - [`ports::ProviderSource`] - Search payment events at the provider
//! - [`ports::Repositories`] - Persist and query ingested data
//!
//! ## The two paths
//!
//! The poller (write path) and the claim arbiter (claim path) never
//! communicate directly: the event store is their only synchronization
//! point, and its uniqueness constraints are the only arbitration
//! mechanism: deduplication on `(account, provider id)`, and the
//! at-most-one-claim guarantee on the transfer reference.

pub mod error;
pub mod metrics;
pub mod models;
pub mod ports;
pub mod services;
pub mod testing;
