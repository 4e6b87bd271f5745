//! Account repository implementation for PostgreSQL.
//!
//! Acts as the account directory: the poller only ever sees accounts
//! this repository considers pollable.

use async_trait::async_trait;
use sqlx::PgPool;

use paydesk_core::error::{StorageError, StorageResult};
use paydesk_core::models::{Account, PLACEHOLDER_TOKEN};
use paydesk_core::ports::{AccountRepository, AccountSeed};

/// PostgreSQL implementation of AccountRepository.
pub struct PgAccountRepository {
    pool: PgPool,
}

impl PgAccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountRepository for PgAccountRepository {
    async fn list_active(&self) -> StorageResult<Vec<Account>> {
        let rows = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT id, name, access_token, active
            FROM accounts
            WHERE active = TRUE
              AND access_token <> ''
              AND access_token <> $1
            ORDER BY id ASC
            "#,
        )
        .bind(PLACEHOLDER_TOKEN)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::QueryError(e.to_string()))?;

        Ok(rows.into_iter().map(AccountRow::into_account).collect())
    }

    async fn get(&self, id: i64) -> StorageResult<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT id, name, access_token, active
            FROM accounts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::QueryError(e.to_string()))?;

        Ok(row.map(AccountRow::into_account))
    }

    async fn upsert(&self, seed: &AccountSeed) -> StorageResult<Account> {
        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            INSERT INTO accounts (name, access_token, active)
            VALUES ($1, $2, $3)
            ON CONFLICT (name) DO UPDATE SET
                access_token = EXCLUDED.access_token,
                active = EXCLUDED.active
            RETURNING id, name, access_token, active
            "#,
        )
        .bind(&seed.name)
        .bind(&seed.access_token)
        .bind(seed.active)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StorageError::QueryError(e.to_string()))?;

        Ok(row.into_account())
    }
}

// =============================================================================
// Row Mapping
// =============================================================================

#[derive(sqlx::FromRow)]
struct AccountRow {
    id: i64,
    name: String,
    access_token: String,
    active: bool,
}

impl AccountRow {
    fn into_account(self) -> Account {
        Account {
            id: self.id,
            name: self.name,
            access_token: self.access_token,
            active: self.active,
        }
    }
}
