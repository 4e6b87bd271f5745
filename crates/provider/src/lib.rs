//! Payment provider adapter for the paydesk engine.
//!
//! This crate implements the [`ProviderSource`] port from `paydesk-core`,
//! querying the provider's payment search endpoint over HTTPS with each
//! account's bearer credential.
//!
//! # Usage
//!
//! ```ignore
//! use paydesk_provider::{PaymentsClient, PaymentsClientConfig};
//!
//! let client = PaymentsClient::new(PaymentsClientConfig {
//!     base_url: "https://api.provider.example".to_string(),
//!     ..Default::default()
//! })?;
//!
//! let raw = client.search(&account, &window).await?;
//! ```
//!
//! [`ProviderSource`]: paydesk_core::ports::ProviderSource

mod client;

pub use client::{PaymentsClient, PaymentsClientConfig, PAGE_LIMIT};
