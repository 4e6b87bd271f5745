//! Acknowledgment repository implementation for PostgreSQL.
//!
//! `try_claim` is the heart of the claim arbiter: a single conditional
//! insert arbitrated by the `transfer_id` primary key. No transaction,
//! no lock, no prior existence check - the statement is atomic on its
//! own and the rows-affected count says who won.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;

use paydesk_core::error::{StorageError, StorageResult};
use paydesk_core::models::Acknowledgment;
use paydesk_core::ports::{AcknowledgmentRepository, ClaimedTransfer};

use super::transfer_repo::TransferRow;

/// PostgreSQL implementation of AcknowledgmentRepository.
pub struct PgAcknowledgmentRepository {
    pool: PgPool,
}

impl PgAcknowledgmentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AcknowledgmentRepository for PgAcknowledgmentRepository {
    async fn try_claim(&self, ack: &Acknowledgment) -> StorageResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO acknowledgments (transfer_id, claimant, claimed_at, claimed_on)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (transfer_id) DO NOTHING
            "#,
        )
        .bind(ack.transfer_id)
        .bind(&ack.claimant)
        .bind(ack.claimed_at)
        .bind(ack.claimed_on)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::QueryError(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }

    async fn get_for_transfer(&self, transfer_id: i64) -> StorageResult<Option<Acknowledgment>> {
        let row = sqlx::query_as::<_, AckRow>(
            r#"
            SELECT transfer_id, claimant, claimed_at, claimed_on
            FROM acknowledgments
            WHERE transfer_id = $1
            "#,
        )
        .bind(transfer_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::QueryError(e.to_string()))?;

        Ok(row.map(AckRow::into_acknowledgment))
    }

    async fn list_for_claimant_on(
        &self,
        claimant: &str,
        date: NaiveDate,
    ) -> StorageResult<Vec<ClaimedTransfer>> {
        let rows = sqlx::query_as::<_, ClaimedRow>(
            r#"
            SELECT t.id, t.account_id, t.provider_id, t.date_created, t.amount,
                   t.status, t.payment_type, t.raw, t.ingested_at,
                   a.claimed_at
            FROM acknowledgments a
            JOIN transfers t ON t.id = a.transfer_id
            WHERE a.claimant = $1 AND a.claimed_on = $2
            ORDER BY a.claimed_at ASC
            "#,
        )
        .bind(claimant)
        .bind(date)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::QueryError(e.to_string()))?;

        Ok(rows.into_iter().map(ClaimedRow::into_claimed).collect())
    }
}

// =============================================================================
// Row Mapping
// =============================================================================

#[derive(sqlx::FromRow)]
struct AckRow {
    transfer_id: i64,
    claimant: String,
    claimed_at: DateTime<Utc>,
    claimed_on: NaiveDate,
}

impl AckRow {
    fn into_acknowledgment(self) -> Acknowledgment {
        Acknowledgment {
            transfer_id: self.transfer_id,
            claimant: self.claimant,
            claimed_at: self.claimed_at,
            claimed_on: self.claimed_on,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ClaimedRow {
    #[sqlx(flatten)]
    transfer: TransferRow,
    claimed_at: DateTime<Utc>,
}

impl ClaimedRow {
    fn into_claimed(self) -> ClaimedTransfer {
        ClaimedTransfer {
            transfer: self.transfer.into_transfer(),
            claimed_at: self.claimed_at,
        }
    }
}
