//! Core business logic services.

mod arbiter;
mod poller;

pub use arbiter::{ClaimService, DayClaims};
pub use poller::{PollerConfig, PollerService, MIN_POLL_INTERVAL};
