//! Port traits connecting the domain layer to its adapters.

mod provider_source;
mod repository;

pub use provider_source::*;
pub use repository::*;
