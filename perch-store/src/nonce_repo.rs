use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::db_err;
use perch_core::repository::NonceStore;
use perch_core::StoreResult;
use perch_domain::DoorNonce;

pub struct PgNonceStore {
    pool: PgPool,
}

impl PgNonceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct NonceRow {
    code: String,
    user_id: Uuid,
    session_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    valid: bool,
}

impl From<NonceRow> for DoorNonce {
    fn from(row: NonceRow) -> Self {
        DoorNonce {
            code: row.code,
            user_id: row.user_id,
            session_id: row.session_id,
            created_at: row.created_at,
            expires_at: row.expires_at,
            valid: row.valid,
        }
    }
}

const COLUMNS: &str = "code, user_id, session_id, created_at, expires_at, valid";

#[async_trait]
impl NonceStore for PgNonceStore {
    async fn live_nonce_for_user(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<DoorNonce>> {
        let row: Option<NonceRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM door_nonces \
             WHERE user_id = $1 AND valid AND expires_at > $2 \
             ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(user_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row.map(DoorNonce::from))
    }

    async fn insert(&self, nonce: &DoorNonce) -> StoreResult<bool> {
        // Uniqueness is enforced only across live codes; colliding with
        // one means the caller draws another code. Burned codes are
        // reissuable, otherwise the four-digit space would drain away.
        let result = sqlx::query(
            "INSERT INTO door_nonces (code, user_id, session_id, created_at, expires_at, valid) \
             VALUES ($1, $2, $3, $4, $5, $6) ON CONFLICT (code) WHERE valid DO NOTHING",
        )
        .bind(&nonce.code)
        .bind(nonce.user_id)
        .bind(nonce.session_id)
        .bind(nonce.created_at)
        .bind(nonce.expires_at)
        .bind(nonce.valid)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(result.rows_affected() == 1)
    }

    async fn find_live(&self, code: &str, now: DateTime<Utc>) -> StoreResult<Option<DoorNonce>> {
        let row: Option<NonceRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM door_nonces \
             WHERE code = $1 AND valid AND expires_at > $2"
        ))
        .bind(code)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row.map(DoorNonce::from))
    }

    async fn invalidate(&self, code: &str) -> StoreResult<()> {
        sqlx::query("UPDATE door_nonces SET valid = FALSE WHERE code = $1 AND valid")
            .bind(code)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn expire_stale(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query("UPDATE door_nonces SET valid = FALSE WHERE valid AND expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected())
    }
}
