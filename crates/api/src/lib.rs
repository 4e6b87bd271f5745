//! Operator-facing HTTP API for the paydesk engine.
//!
//! Serves the claim action and the two read views the dashboard
//! consumes. Every `/api` route requires HTTP Basic credentials,
//! verified through the [`Authenticator`] port - the credential store
//! itself is an external collaborator.
//!
//! # Routes
//!
//! - `POST /api/transfers/{identity}/claim` - claim a transfer
//! - `GET  /api/transfers/unclaimed?limit=N` - unclaimed transfers
//! - `GET  /api/claims?date=YYYY-MM-DD[&claimant=X]` - claims by day
//! - `GET  /health` - liveness probe (unauthenticated)

mod auth;
mod routes;
mod server;

pub use auth::{Authenticator, Claimant};
pub use routes::{router, AppState};
pub use server::{serve_with_shutdown, ServerConfig};
