//! Transfer repository implementation for PostgreSQL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use paydesk_core::error::{StorageError, StorageResult};
use paydesk_core::models::Transfer;
use paydesk_core::ports::{NewTransfer, TransferRepository};

const TRANSFER_COLUMNS: &str =
    "id, account_id, provider_id, date_created, amount, status, payment_type, raw, ingested_at";

/// PostgreSQL implementation of TransferRepository.
pub struct PgTransferRepository {
    pool: PgPool,
}

impl PgTransferRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransferRepository for PgTransferRepository {
    async fn insert_if_absent(&self, transfer: &NewTransfer) -> StorageResult<Option<i64>> {
        // ON CONFLICT DO NOTHING + RETURNING: a row comes back only when
        // the insert actually happened. A conflict on
        // (account_id, provider_id) is the expected outcome for an
        // already-seen event.
        let inserted: Option<(i64,)> = sqlx::query_as(
            r#"
            INSERT INTO transfers (
                account_id, provider_id, date_created, amount,
                status, payment_type, raw, ingested_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (account_id, provider_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(transfer.account_id)
        .bind(&transfer.provider_id)
        .bind(transfer.date_created)
        .bind(transfer.amount)
        .bind(&transfer.status)
        .bind(&transfer.payment_type)
        .bind(&transfer.raw)
        .bind(transfer.ingested_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::QueryError(e.to_string()))?;

        Ok(inserted.map(|(id,)| id))
    }

    async fn get(&self, id: i64) -> StorageResult<Option<Transfer>> {
        let row = sqlx::query_as::<_, TransferRow>(&format!(
            "SELECT {TRANSFER_COLUMNS} FROM transfers WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::QueryError(e.to_string()))?;

        Ok(row.map(TransferRow::into_transfer))
    }

    async fn get_by_provider_id(&self, provider_id: &str) -> StorageResult<Option<Transfer>> {
        // The natural id is only unique per account; prefer the most
        // recently ingested match.
        let row = sqlx::query_as::<_, TransferRow>(&format!(
            r#"
            SELECT {TRANSFER_COLUMNS}
            FROM transfers
            WHERE provider_id = $1
            ORDER BY id DESC
            LIMIT 1
            "#
        ))
        .bind(provider_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::QueryError(e.to_string()))?;

        Ok(row.map(TransferRow::into_transfer))
    }

    async fn list_unclaimed(&self, limit: u32) -> StorageResult<Vec<Transfer>> {
        let rows = sqlx::query_as::<_, TransferRow>(
            r#"
            SELECT t.id, t.account_id, t.provider_id, t.date_created, t.amount,
                   t.status, t.payment_type, t.raw, t.ingested_at
            FROM transfers t
            LEFT JOIN acknowledgments a ON a.transfer_id = t.id
            WHERE a.transfer_id IS NULL
            ORDER BY t.date_created DESC
            LIMIT $1
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::QueryError(e.to_string()))?;

        Ok(rows.into_iter().map(TransferRow::into_transfer).collect())
    }
}

// =============================================================================
// Row Mapping
// =============================================================================

#[derive(sqlx::FromRow)]
pub(super) struct TransferRow {
    id: i64,
    account_id: i64,
    provider_id: String,
    date_created: DateTime<Utc>,
    amount: Decimal,
    status: String,
    payment_type: String,
    raw: serde_json::Value,
    ingested_at: DateTime<Utc>,
}

impl TransferRow {
    pub(super) fn into_transfer(self) -> Transfer {
        Transfer {
            id: self.id,
            account_id: self.account_id,
            provider_id: self.provider_id,
            date_created: self.date_created,
            amount: self.amount,
            status: self.status,
            payment_type: self.payment_type,
            raw: self.raw,
            ingested_at: self.ingested_at,
        }
    }
}
