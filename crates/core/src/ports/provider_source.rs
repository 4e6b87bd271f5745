//! Port trait for the external payment provider.
//!
//! This trait defines the interface for fetching payment events from
//! the provider's search API. Implementations live in the infrastructure
//! layer (e.g., `paydesk-provider`).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::ProviderResult;
use crate::models::Account;

/// Half-open time range `[start, end)` queried on each poll tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl PollWindow {
    /// Sliding look-back window ending at `now`.
    pub fn looking_back(now: DateTime<Utc>, lookback: chrono::Duration) -> Self {
        Self {
            start: now - lookback,
            end: now,
        }
    }
}

/// One payment event as returned by the provider, before normalization.
///
/// The provider is eventually consistent and may return events already
/// seen; deduplication is the poller's responsibility, not the client's.
/// Field shapes are loose on purpose: the poller normalizes them into a
/// [`crate::models::Transfer`].
#[derive(Debug, Clone, Deserialize)]
pub struct RawTransfer {
    /// Provider-assigned natural identifier. Numeric in the wire format,
    /// but treated as an opaque string by the domain.
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    /// Creation timestamp, ISO-8601 with offset.
    pub date_created: DateTime<Utc>,
    /// Amount as reported by the provider.
    pub transaction_amount: Decimal,
    /// Status string; missing means unknown.
    #[serde(default)]
    pub status: Option<String>,
    /// Payment-method classifier; missing means unknown.
    #[serde(default)]
    pub payment_type_id: Option<String>,
    /// The full untouched payload element, retained for audit.
    #[serde(skip)]
    pub raw: serde_json::Value,
}

/// Accept the natural identifier as either a JSON number or a string.
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IdRepr {
        Num(i64),
        Str(String),
    }

    Ok(match IdRepr::deserialize(deserializer)? {
        IdRepr::Num(n) => n.to_string(),
        IdRepr::Str(s) => s,
    })
}

/// Port trait for the payment provider's search API.
///
/// A single page of the most recent events within the window is returned;
/// no internal retries, no deduplication.
#[async_trait]
pub trait ProviderSource: Send + Sync {
    /// Search one account's payment events within a time window.
    ///
    /// Authenticated with the account's credential as a bearer token.
    /// A non-success response fails with
    /// [`crate::error::ProviderError::RequestFailed`]; retry is the
    /// poller's responsibility via the next scheduled tick.
    async fn search(&self, account: &Account, window: &PollWindow)
        -> ProviderResult<Vec<RawTransfer>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn looking_back_window_is_half_open_behind_now() {
        let now = Utc::now();
        let window = PollWindow::looking_back(now, Duration::seconds(60));
        assert_eq!(window.end, now);
        assert_eq!(window.end - window.start, Duration::seconds(60));
    }

    #[test]
    fn raw_transfer_accepts_numeric_and_string_ids() {
        let numeric: RawTransfer = serde_json::from_str(
            r#"{"id": 139322351059, "date_created": "2024-05-01T12:30:00.000-03:00",
                "transaction_amount": 1500.50, "status": "approved",
                "payment_type_id": "account_money"}"#,
        )
        .unwrap();
        assert_eq!(numeric.id, "139322351059");
        assert_eq!(numeric.transaction_amount.to_string(), "1500.50");

        let stringy: RawTransfer = serde_json::from_str(
            r#"{"id": "abc-123", "date_created": "2024-05-01T15:30:00.000Z",
                "transaction_amount": 10}"#,
        )
        .unwrap();
        assert_eq!(stringy.id, "abc-123");
        assert!(stringy.status.is_none());
    }
}
