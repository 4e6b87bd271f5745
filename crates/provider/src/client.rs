//! HTTP client for the provider's payment search API.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, instrument, trace};

use paydesk_core::error::{ProviderError, ProviderResult};
use paydesk_core::models::Account;
use paydesk_core::ports::{PollWindow, ProviderSource, RawTransfer};

/// Fixed page size for search requests.
///
/// Known gap, preserved deliberately: only one page is fetched per
/// account per tick. An account producing more than this many events
/// within one look-back window will have its oldest events in the
/// window never observed.
pub const PAGE_LIMIT: u32 = 50;

/// Configuration for the payments client.
#[derive(Debug, Clone)]
pub struct PaymentsClientConfig {
    /// Base URL of the provider API (no trailing slash).
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for PaymentsClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.mercadopago.com".to_string(),
            timeout: Duration::from_secs(15),
        }
    }
}

/// Payment provider adapter implementing the ProviderSource port.
///
/// The client is stateless across accounts: every request carries the
/// queried account's own bearer credential. No retries (the poller's
/// next tick re-covers the window) and no deduplication (the store's
/// insert-if-absent handles re-observed events).
#[derive(Clone)]
pub struct PaymentsClient {
    client: Client,
    base_url: String,
}

impl PaymentsClient {
    /// Build a client from configuration.
    pub fn new(config: PaymentsClientConfig) -> ProviderResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProviderError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url,
        })
    }
}

#[async_trait]
impl ProviderSource for PaymentsClient {
    #[instrument(skip_all, fields(account = account.id))]
    async fn search(
        &self,
        account: &Account,
        window: &PollWindow,
    ) -> ProviderResult<Vec<RawTransfer>> {
        let url = format!("{}/v1/payments/search", self.base_url);
        debug!(begin = %format_instant(window.start), end = %format_instant(window.end), "Searching payments");

        let response = self
            .client
            .get(&url)
            .bearer_auth(&account.access_token)
            .query(&search_query(window))
            .send()
            .await
            .map_err(|e| ProviderError::ConnectionFailed(e.to_string()))?;

        match response.status() {
            StatusCode::OK => {
                let body: serde_json::Value = response
                    .json()
                    .await
                    .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;
                parse_results(body)
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(ProviderError::RequestFailed {
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }
}

// =============================================================================
// Request/Response Shaping
// =============================================================================

/// Query parameters for one window search, most recent first.
fn search_query(window: &PollWindow) -> Vec<(&'static str, String)> {
    vec![
        ("sort", "date_created".to_string()),
        ("criteria", "desc".to_string()),
        ("range", "date_created".to_string()),
        ("begin_date", format_instant(window.start)),
        ("end_date", format_instant(window.end)),
        ("limit", PAGE_LIMIT.to_string()),
    ]
}

/// ISO-8601 UTC instant with millisecond precision and trailing `Z`,
/// the only timestamp format the search endpoint accepts.
fn format_instant(instant: DateTime<Utc>) -> String {
    instant.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Extract and decode the `results` array of a search response.
///
/// Each element keeps its untouched payload in `RawTransfer::raw`;
/// elements that fail to decode poison the whole page (the tick retries
/// the window anyway).
fn parse_results(body: serde_json::Value) -> ProviderResult<Vec<RawTransfer>> {
    let results = body
        .get("results")
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| ProviderError::MalformedResponse("missing 'results' array".to_string()))?;

    let mut transfers = Vec::with_capacity(results.len());
    for element in results {
        let mut transfer: RawTransfer = serde_json::from_value(element.clone())
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;
        transfer.raw = element.clone();
        trace!(provider_id = %transfer.id, "Decoded payment");
        transfers.push(transfer);
    }

    Ok(transfers)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn instants_are_formatted_with_milliseconds_and_z() {
        let instant: DateTime<Utc> = "2024-05-01T15:30:00.123456Z".parse().unwrap();
        assert_eq!(format_instant(instant), "2024-05-01T15:30:00.123Z");
    }

    #[test]
    fn query_carries_window_and_fixed_page_size() {
        let start: DateTime<Utc> = "2024-05-01T15:29:00Z".parse().unwrap();
        let end: DateTime<Utc> = "2024-05-01T15:30:00Z".parse().unwrap();
        let query = search_query(&PollWindow { start, end });

        assert!(query.contains(&("sort", "date_created".to_string())));
        assert!(query.contains(&("criteria", "desc".to_string())));
        assert!(query.contains(&("begin_date", "2024-05-01T15:29:00.000Z".to_string())));
        assert!(query.contains(&("end_date", "2024-05-01T15:30:00.000Z".to_string())));
        assert!(query.contains(&("limit", "50".to_string())));
    }

    #[test]
    fn parse_results_decodes_and_keeps_raw_payload() {
        let body = json!({
            "paging": { "total": 1 },
            "results": [{
                "id": 139322351059_i64,
                "date_created": "2024-05-01T12:30:00.000-03:00",
                "transaction_amount": 1500.5,
                "status": "approved",
                "payment_type_id": "account_money",
                "payer": { "email": "someone@example.com" }
            }]
        });

        let transfers = parse_results(body).unwrap();
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].id, "139322351059");
        assert_eq!(transfers[0].raw["payer"]["email"], "someone@example.com");
    }

    #[test]
    fn missing_results_field_is_malformed() {
        let err = parse_results(json!({ "message": "internal error" }));
        assert!(matches!(err, Err(ProviderError::MalformedResponse(_))));
    }
}
