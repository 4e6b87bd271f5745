//! Metrics definitions for the ingestion and claim paths.
//!
//! Metrics are collected using the `metrics` crate and can be exported
//! to Prometheus via `metrics-exporter-prometheus`.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::time::Instant;

/// Initialize all metric descriptions.
/// Call this once at startup before any metrics are recorded.
pub fn init_metrics() {
    describe_counter!("poll_ticks_total", "Total number of poll ticks executed");
    describe_counter!(
        "transfers_seen_total",
        "Total number of transfers returned by the provider, including duplicates"
    );
    describe_counter!(
        "transfers_inserted_total",
        "Total number of transfers newly persisted"
    );
    describe_counter!(
        "account_failures_total",
        "Total number of per-account poll failures, by account and kind (provider/storage)"
    );
    describe_counter!(
        "claims_total",
        "Total number of claim requests, by outcome (won/retry/conflict)"
    );
    describe_histogram!(
        "tick_duration_seconds",
        "Time taken to complete one poll tick in seconds"
    );
}

/// Record a completed poll tick.
pub fn record_tick() {
    counter!("poll_ticks_total").increment(1);
}

/// Record transfers observed in a tick (seen vs newly inserted).
pub fn record_transfers(seen: u64, inserted: u64) {
    counter!("transfers_seen_total").increment(seen);
    counter!("transfers_inserted_total").increment(inserted);
}

/// Record a failed account poll.
///
/// # Arguments
/// * `kind` - "provider" or "storage"
pub fn record_account_failure(account_id: i64, kind: &'static str) {
    counter!("account_failures_total", "account" => account_id.to_string(), "kind" => kind)
        .increment(1);
}

/// Record a claim request outcome.
///
/// # Arguments
/// * `outcome` - "won", "retry" or "conflict"
pub fn record_claim(outcome: &'static str) {
    counter!("claims_total", "outcome" => outcome).increment(1);
}

/// Record tick duration.
pub fn record_tick_duration(duration_secs: f64) {
    histogram!("tick_duration_seconds").record(duration_secs);
}

/// A timer that automatically records tick duration when dropped.
pub struct TickTimer {
    start: Instant,
}

impl TickTimer {
    /// Start a new tick timer.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for TickTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TickTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        record_tick_duration(duration);
    }
}
