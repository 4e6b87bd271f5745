//! In-memory test doubles for the domain ports.
//!
//! Used by unit tests across the workspace. [`InMemoryRepositories`]
//! mirrors the store's uniqueness guarantees under a single mutex, so
//! claim-race tests exercise the same semantics the PostgreSQL adapter
//! enforces with constraints.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use crate::error::{ProviderResult, StorageResult};
use crate::models::{Account, Acknowledgment, Transfer};
use crate::ports::{
    AccountRepository, AccountSeed, AcknowledgmentRepository, ClaimedTransfer, NewTransfer,
    PollWindow, ProviderSource, RawTransfer, Repositories, TransferRepository,
};

// =============================================================================
// In-memory store
// =============================================================================

#[derive(Default)]
struct State {
    accounts: Vec<Account>,
    transfers: Vec<Transfer>,
    acknowledgments: HashMap<i64, Acknowledgment>,
    next_account_id: i64,
    next_transfer_id: i64,
}

/// In-memory implementation of every repository port.
#[derive(Default)]
pub struct InMemoryRepositories {
    state: Arc<Mutex<State>>,
}

impl InMemoryRepositories {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an account directly, bypassing the upsert path.
    pub async fn seed_account(&self, name: &str, token: &str, active: bool) -> Account {
        let mut state = self.state.lock().await;
        state.next_account_id += 1;
        let account = Account {
            id: state.next_account_id,
            name: name.to_string(),
            access_token: token.to_string(),
            active,
        };
        state.accounts.push(account.clone());
        account
    }

    /// Seed a transfer directly, returning its surrogate id.
    pub async fn seed_transfer(
        &self,
        account_id: i64,
        provider_id: &str,
        date_created: DateTime<Utc>,
        amount: Decimal,
    ) -> i64 {
        let mut state = self.state.lock().await;
        state.next_transfer_id += 1;
        let id = state.next_transfer_id;
        state.transfers.push(Transfer {
            id,
            account_id,
            provider_id: provider_id.to_string(),
            date_created,
            amount,
            status: "approved".to_string(),
            payment_type: String::new(),
            raw: serde_json::Value::Null,
            ingested_at: Utc::now(),
        });
        id
    }

    pub async fn transfer_count(&self) -> usize {
        self.state.lock().await.transfers.len()
    }

    pub async fn ack_count(&self) -> usize {
        self.state.lock().await.acknowledgments.len()
    }
}

#[async_trait]
impl AccountRepository for InMemoryRepositories {
    async fn list_active(&self) -> StorageResult<Vec<Account>> {
        let state = self.state.lock().await;
        let mut accounts: Vec<Account> = state
            .accounts
            .iter()
            .filter(|a| a.is_pollable())
            .cloned()
            .collect();
        accounts.sort_by_key(|a| a.id);
        Ok(accounts)
    }

    async fn get(&self, id: i64) -> StorageResult<Option<Account>> {
        let state = self.state.lock().await;
        Ok(state.accounts.iter().find(|a| a.id == id).cloned())
    }

    async fn upsert(&self, seed: &AccountSeed) -> StorageResult<Account> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state.accounts.iter_mut().find(|a| a.name == seed.name) {
            existing.access_token = seed.access_token.clone();
            existing.active = seed.active;
            return Ok(existing.clone());
        }
        state.next_account_id += 1;
        let account = Account {
            id: state.next_account_id,
            name: seed.name.clone(),
            access_token: seed.access_token.clone(),
            active: seed.active,
        };
        state.accounts.push(account.clone());
        Ok(account)
    }
}

#[async_trait]
impl TransferRepository for InMemoryRepositories {
    async fn insert_if_absent(&self, transfer: &NewTransfer) -> StorageResult<Option<i64>> {
        let mut state = self.state.lock().await;
        let exists = state
            .transfers
            .iter()
            .any(|t| t.account_id == transfer.account_id && t.provider_id == transfer.provider_id);
        if exists {
            return Ok(None);
        }
        state.next_transfer_id += 1;
        let id = state.next_transfer_id;
        state.transfers.push(Transfer {
            id,
            account_id: transfer.account_id,
            provider_id: transfer.provider_id.clone(),
            date_created: transfer.date_created,
            amount: transfer.amount,
            status: transfer.status.clone(),
            payment_type: transfer.payment_type.clone(),
            raw: transfer.raw.clone(),
            ingested_at: transfer.ingested_at,
        });
        Ok(Some(id))
    }

    async fn get(&self, id: i64) -> StorageResult<Option<Transfer>> {
        let state = self.state.lock().await;
        Ok(state.transfers.iter().find(|t| t.id == id).cloned())
    }

    async fn get_by_provider_id(&self, provider_id: &str) -> StorageResult<Option<Transfer>> {
        let state = self.state.lock().await;
        Ok(state
            .transfers
            .iter()
            .filter(|t| t.provider_id == provider_id)
            .max_by_key(|t| t.id)
            .cloned())
    }

    async fn list_unclaimed(&self, limit: u32) -> StorageResult<Vec<Transfer>> {
        let state = self.state.lock().await;
        let mut unclaimed: Vec<Transfer> = state
            .transfers
            .iter()
            .filter(|t| !state.acknowledgments.contains_key(&t.id))
            .cloned()
            .collect();
        unclaimed.sort_by(|a, b| b.date_created.cmp(&a.date_created));
        unclaimed.truncate(limit as usize);
        Ok(unclaimed)
    }
}

#[async_trait]
impl AcknowledgmentRepository for InMemoryRepositories {
    async fn try_claim(&self, ack: &Acknowledgment) -> StorageResult<bool> {
        let mut state = self.state.lock().await;
        // Entry-based insert mirrors the primary-key arbitration of the
        // real store: the first caller creates the row, everyone else
        // sees it already present.
        if state.acknowledgments.contains_key(&ack.transfer_id) {
            return Ok(false);
        }
        state.acknowledgments.insert(ack.transfer_id, ack.clone());
        Ok(true)
    }

    async fn get_for_transfer(&self, transfer_id: i64) -> StorageResult<Option<Acknowledgment>> {
        let state = self.state.lock().await;
        Ok(state.acknowledgments.get(&transfer_id).cloned())
    }

    async fn list_for_claimant_on(
        &self,
        claimant: &str,
        date: NaiveDate,
    ) -> StorageResult<Vec<ClaimedTransfer>> {
        let state = self.state.lock().await;
        let mut claims: Vec<ClaimedTransfer> = state
            .acknowledgments
            .values()
            .filter(|a| a.claimant == claimant && a.claimed_on == date)
            .filter_map(|a| {
                state
                    .transfers
                    .iter()
                    .find(|t| t.id == a.transfer_id)
                    .map(|t| ClaimedTransfer {
                        transfer: t.clone(),
                        claimed_at: a.claimed_at,
                    })
            })
            .collect();
        claims.sort_by_key(|c| c.claimed_at);
        Ok(claims)
    }
}

impl Repositories for InMemoryRepositories {
    fn accounts(&self) -> &dyn AccountRepository {
        self
    }

    fn transfers(&self) -> &dyn TransferRepository {
        self
    }

    fn acknowledgments(&self) -> &dyn AcknowledgmentRepository {
        self
    }
}

// =============================================================================
// Scripted provider
// =============================================================================

/// Provider double returning pre-queued responses per account.
///
/// Each `search` call pops the next queued response for that account;
/// an empty queue yields an empty page.
#[derive(Default)]
pub struct ScriptedProvider {
    responses: std::sync::Mutex<HashMap<i64, VecDeque<ProviderResult<Vec<RawTransfer>>>>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the next response for an account.
    pub fn push(&self, account_id: i64, response: ProviderResult<Vec<RawTransfer>>) {
        self.responses
            .lock()
            .expect("scripted provider poisoned")
            .entry(account_id)
            .or_default()
            .push_back(response);
    }
}

#[async_trait]
impl ProviderSource for ScriptedProvider {
    async fn search(
        &self,
        account: &Account,
        _window: &PollWindow,
    ) -> ProviderResult<Vec<RawTransfer>> {
        let mut responses = self.responses.lock().expect("scripted provider poisoned");
        match responses.get_mut(&account.id).and_then(VecDeque::pop_front) {
            Some(response) => response,
            None => Ok(Vec::new()),
        }
    }
}
