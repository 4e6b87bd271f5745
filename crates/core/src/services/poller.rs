//! Ingestion poller - fetches, normalizes and deduplicates provider events.
//!
//! The poller runs one recurring tick. Each tick resolves the active
//! account set, queries a sliding look-back window per account, and
//! writes every observed event with an insert-if-absent keyed by
//! `(account, provider id)`. Re-observing an event is the normal case,
//! not an error: the look-back window deliberately overlaps previous
//! ticks to tolerate provider latency and short outages.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::error::{PollerError, PollerResult};
use crate::metrics::{record_account_failure, record_tick, record_transfers, TickTimer};
use crate::models::{Account, TickSummary};
use crate::ports::{NewTransfer, PollWindow, ProviderSource, RawTransfer, Repositories};

// =============================================================================
// Configuration
// =============================================================================

/// Floor for the poll interval, so a misconfigured deployment cannot
/// hammer the provider.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Configuration for the poller service.
///
/// Built once at startup and passed into the constructor; services never
/// read ambient configuration.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Pause between ticks (the loop sleeps this long after each tick
    /// completes, so the full period is this plus the tick duration).
    pub poll_interval: Duration,
    /// Sliding look-back window size. Must comfortably exceed the poll
    /// interval so a failed provider call is re-covered by the next tick.
    pub lookback: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            lookback: Duration::from_secs(60),
        }
    }
}

impl PollerConfig {
    /// The configured interval clamped to [`MIN_POLL_INTERVAL`].
    pub fn effective_interval(&self) -> Duration {
        self.poll_interval.max(MIN_POLL_INTERVAL)
    }
}

// =============================================================================
// PollerService
// =============================================================================

/// The scheduled ingestion loop.
///
/// # Design
///
/// Ticks are not re-entrant: a tick completes, accounts processed
/// sequentially in directory order, before the next one is scheduled.
/// Any failure during a tick is contained to that tick (and, for
/// provider failures, to that account); the loop always continues on
/// the next interval. Shutdown is observed between ticks, never
/// mid-tick.
///
/// # Flow
///
/// 1. Resolve the active account set
/// 2. Compute the window `[now - lookback, now)`
/// 3. Per account: fetch, normalize, insert-if-absent
/// 4. Emit a tick summary
pub struct PollerService<P: ProviderSource, R: Repositories> {
    config: PollerConfig,
    provider: Arc<P>,
    repositories: Arc<R>,
}

impl<P: ProviderSource, R: Repositories> PollerService<P, R> {
    pub fn new(config: PollerConfig, provider: Arc<P>, repositories: Arc<R>) -> Self {
        if config.lookback <= config.effective_interval() {
            warn!(
                lookback_secs = config.lookback.as_secs(),
                interval_secs = config.effective_interval().as_secs(),
                "Look-back window does not exceed the poll interval; provider delays may lose events"
            );
        }
        Self {
            config,
            provider,
            repositories,
        }
    }

    /// Run the polling loop until shutdown is requested.
    #[instrument(skip_all)]
    pub async fn run(
        &self,
        mut shutdown_rx: tokio::sync::watch::Receiver<bool>,
    ) -> PollerResult<()> {
        let interval = self.config.effective_interval();
        info!(
            interval_secs = interval.as_secs(),
            lookback_secs = self.config.lookback.as_secs(),
            "Starting poller"
        );

        loop {
            if *shutdown_rx.borrow() {
                debug!("Shutdown requested");
                return Err(PollerError::ShutdownRequested);
            }

            // Tick boundary: any failure is logged here and the loop
            // continues on schedule.
            match self.tick().await {
                Ok(summary) => {
                    info!(
                        accounts = summary.accounts_processed,
                        failed = summary.accounts_failed,
                        seen = summary.transfers_seen,
                        inserted = summary.transfers_inserted,
                        "Tick complete"
                    );
                }
                Err(e) => {
                    error!(error = ?e, "Tick failed");
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        debug!("Shutdown requested");
                        return Err(PollerError::ShutdownRequested);
                    }
                }
            }
        }
    }

    /// Execute one ingestion tick across all active accounts.
    #[instrument(skip_all)]
    pub async fn tick(&self) -> PollerResult<TickSummary> {
        let _timer = TickTimer::new();
        record_tick();

        let accounts = self
            .repositories
            .accounts()
            .list_active()
            .await
            .map_err(|e| PollerError::Configuration(e.to_string()))?;

        if accounts.is_empty() {
            debug!("No pollable accounts, skipping tick");
            return Ok(TickSummary::default());
        }

        let window = PollWindow::looking_back(
            Utc::now(),
            chrono::Duration::from_std(self.config.lookback)
                .unwrap_or_else(|_| chrono::Duration::seconds(60)),
        );

        let mut summary = TickSummary::default();

        // Per-account isolation: a failure for one account never aborts
        // the others in the same tick.
        for account in &accounts {
            match self.process_account(account, &window).await {
                Ok((seen, inserted)) => {
                    summary.accounts_processed += 1;
                    summary.transfers_seen += seen;
                    summary.transfers_inserted += inserted;
                }
                Err(e) => {
                    summary.accounts_failed += 1;
                    record_account_failure(account.id, failure_kind(&e));
                    error!(
                        account = account.id,
                        name = %account.name,
                        error = ?e,
                        "Account processing failed"
                    );
                }
            }
        }

        record_transfers(summary.transfers_seen as u64, summary.transfers_inserted as u64);
        Ok(summary)
    }

    /// Fetch and persist one account's window.
    /// Returns (transfers seen, transfers newly inserted).
    #[instrument(skip_all, fields(account = account.id))]
    async fn process_account(
        &self,
        account: &Account,
        window: &PollWindow,
    ) -> PollerResult<(usize, usize)> {
        // The directory already filters in SQL; this guards accounts
        // obtained any other way.
        if !account.is_pollable() {
            warn!(account = account.id, "Skipping non-pollable account");
            return Ok((0, 0));
        }

        let raw_transfers = self.provider.search(account, window).await?;
        let seen = raw_transfers.len();
        let ingested_at = Utc::now();
        let mut inserted = 0;

        for raw in raw_transfers {
            let transfer = normalize(account.id, raw, ingested_at);
            match self.repositories.transfers().insert_if_absent(&transfer).await {
                // None = already seen, the expected steady-state outcome.
                Ok(Some(id)) => {
                    trace!(transfer = id, provider_id = %transfer.provider_id, "Transfer ingested");
                    inserted += 1;
                }
                Ok(None) => {
                    trace!(provider_id = %transfer.provider_id, "Transfer already known");
                }
                Err(e) => return Err(PollerError::Storage(e)),
            }
        }

        Ok((seen, inserted))
    }
}

/// Metric label for a per-account failure: a storage outage must not
/// inflate the provider failure count.
fn failure_kind(error: &PollerError) -> &'static str {
    match error {
        PollerError::Storage(_) => "storage",
        _ => "provider",
    }
}

/// Normalize a raw provider event into a canonical transfer record.
///
/// Missing status/payment-method fields default to the empty string; the
/// amount is coerced to two fraction digits.
fn normalize(account_id: i64, raw: RawTransfer, ingested_at: chrono::DateTime<Utc>) -> NewTransfer {
    NewTransfer {
        account_id,
        provider_id: raw.id,
        date_created: raw.date_created,
        amount: raw.transaction_amount.round_dp(2),
        status: raw.status.unwrap_or_default(),
        payment_type: raw.payment_type_id.unwrap_or_default(),
        raw: raw.raw,
        ingested_at,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ProviderError, StorageError};
    use crate::models::PLACEHOLDER_TOKEN;
    use crate::testing::{InMemoryRepositories, ScriptedProvider};
    use rust_decimal::Decimal;

    fn raw(id: &str, amount: &str) -> RawTransfer {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "date_created": "2024-05-01T12:30:00.000-03:00",
            "transaction_amount": amount.parse::<f64>().unwrap(),
            "status": "approved",
            "payment_type_id": "account_money",
        }))
        .unwrap()
    }

    fn service(
        provider: ScriptedProvider,
        repos: Arc<InMemoryRepositories>,
    ) -> PollerService<ScriptedProvider, InMemoryRepositories> {
        PollerService::new(PollerConfig::default(), Arc::new(provider), repos)
    }

    #[tokio::test]
    async fn tick_ingests_and_deduplicates_across_ticks() {
        let repos = Arc::new(InMemoryRepositories::new());
        let account = repos.seed_account("Desk 7", "APP_USR-token", true).await;

        let provider = ScriptedProvider::new();
        // Two ticks both observe the same provider event.
        provider.push(account.id, Ok(vec![raw("139322351059", "1500.50")]));
        provider.push(account.id, Ok(vec![raw("139322351059", "1500.50")]));

        let svc = service(provider, repos.clone());

        let first = svc.tick().await.unwrap();
        assert_eq!(first.transfers_seen, 1);
        assert_eq!(first.transfers_inserted, 1);

        let second = svc.tick().await.unwrap();
        assert_eq!(second.transfers_seen, 1);
        assert_eq!(second.transfers_inserted, 0);

        assert_eq!(repos.transfer_count().await, 1);
    }

    #[tokio::test]
    async fn provider_failure_is_isolated_per_account() {
        let repos = Arc::new(InMemoryRepositories::new());
        let a = repos.seed_account("Desk A", "token-a", true).await;
        let b = repos.seed_account("Desk B", "token-b", true).await;

        let provider = ScriptedProvider::new();
        provider.push(
            a.id,
            Err(ProviderError::RequestFailed {
                status: 500,
                body: "boom".into(),
            }),
        );
        provider.push(b.id, Ok(vec![raw("42", "10.00")]));

        let summary = service(provider, repos.clone()).tick().await.unwrap();

        assert_eq!(summary.accounts_failed, 1);
        assert_eq!(summary.accounts_processed, 1);
        assert_eq!(summary.transfers_inserted, 1);
        assert_eq!(repos.transfer_count().await, 1);
    }

    #[tokio::test]
    async fn event_missed_by_failed_tick_is_ingested_by_the_next() {
        let repos = Arc::new(InMemoryRepositories::new());
        let account = repos.seed_account("Desk 7", "APP_USR-token", true).await;

        // Tick 1 fails outright; tick 2's overlapping look-back window
        // re-covers the event.
        let provider = ScriptedProvider::new();
        provider.push(
            account.id,
            Err(ProviderError::RequestFailed {
                status: 500,
                body: "unavailable".into(),
            }),
        );
        provider.push(account.id, Ok(vec![raw("139322351059", "1500.50")]));

        let svc = service(provider, repos.clone());

        let first = svc.tick().await.unwrap();
        assert_eq!(first.accounts_failed, 1);
        assert_eq!(repos.transfer_count().await, 0);

        let second = svc.tick().await.unwrap();
        assert_eq!(second.accounts_failed, 0);
        assert_eq!(second.transfers_inserted, 1);
        assert_eq!(repos.transfer_count().await, 1);
    }

    #[test]
    fn failure_kind_separates_storage_from_provider() {
        let storage = PollerError::Storage(StorageError::QueryError("pool gone".into()));
        assert_eq!(failure_kind(&storage), "storage");

        let provider = PollerError::Provider(ProviderError::ConnectionFailed("timeout".into()));
        assert_eq!(failure_kind(&provider), "provider");
    }

    #[tokio::test]
    async fn placeholder_accounts_are_never_polled() {
        let repos = Arc::new(InMemoryRepositories::new());
        repos.seed_account("Unconfigured", PLACEHOLDER_TOKEN, true).await;
        repos.seed_account("Disabled", "real-token", false).await;

        let provider = ScriptedProvider::new();
        let summary = service(provider, repos.clone()).tick().await.unwrap();

        // Directory filters both out; the tick is an empty no-op.
        assert_eq!(summary, TickSummary::default());
    }

    #[tokio::test]
    async fn normalization_defaults_missing_fields() {
        let raw: RawTransfer = serde_json::from_value(serde_json::json!({
            "id": 7,
            "date_created": "2024-05-01T15:30:00.000Z",
            "transaction_amount": 12.346,
        }))
        .unwrap();

        let t = normalize(1, raw, Utc::now());
        assert_eq!(t.provider_id, "7");
        assert_eq!(t.status, "");
        assert_eq!(t.payment_type, "");
        // Amount coerced to two fraction digits.
        assert_eq!(t.amount, Decimal::new(1235, 2));
    }

    #[test]
    fn poll_interval_is_floored() {
        let config = PollerConfig {
            poll_interval: Duration::from_secs(1),
            ..Default::default()
        };
        assert_eq!(config.effective_interval(), MIN_POLL_INTERVAL);
    }
}
