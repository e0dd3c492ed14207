use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::db_err;
use perch_core::repository::{FinalizeOutcome, ReserveOutcome, SessionStore};
use perch_core::{StoreError, StoreResult};
use perch_domain::{Session, SessionStatus, TimeSlot};

/// Postgres session store. `reserve` and `finalize` each run as a
/// single serializable transaction.
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: Uuid,
    user_id: Uuid,
    seat_id: Uuid,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    actual_end_time: Option<DateTime<Utc>>,
    billing_fee: Option<i32>,
    token: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SessionRow> for Session {
    type Error = StoreError;

    fn try_from(row: SessionRow) -> Result<Self, StoreError> {
        let status: SessionStatus = row.status.parse().map_err(StoreError::Decode)?;
        Ok(Session {
            id: row.id,
            user_id: row.user_id,
            seat_id: row.seat_id,
            slot: TimeSlot {
                start: row.start_time,
                end: row.end_time,
            },
            actual_end_time: row.actual_end_time,
            billing_fee: row.billing_fee,
            token: row.token,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const SELECT_COLUMNS: &str = "id, user_id, seat_id, start_time, end_time, actual_end_time, \
     billing_fee, token, status, created_at, updated_at";

// Half-open overlap against an existing row: the candidate [start, end)
// intersects [start_time, end_time) iff end_time > start AND start_time < end.
const SEAT_CONFLICT_SQL: &str = "SELECT COUNT(*) FROM sessions \
     WHERE seat_id = $1 AND status IN ('VALID', 'ON_GOING') \
     AND end_time > $2 AND start_time < $3";

const USER_CONFLICT_SQL: &str = "SELECT COUNT(*) FROM sessions \
     WHERE user_id = $1 AND status IN ('VALID', 'ON_GOING') \
     AND end_time > $2 AND start_time < $3";

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn reserve(&self, session: &Session) -> StoreResult<ReserveOutcome> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        // Seat dimension first; a doubly-conflicting request reports
        // the seat.
        let seat_busy: i64 = sqlx::query_scalar(SEAT_CONFLICT_SQL)
            .bind(session.seat_id)
            .bind(session.slot.start)
            .bind(session.slot.end)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_err)?;
        if seat_busy > 0 {
            tx.rollback().await.map_err(db_err)?;
            return Ok(ReserveOutcome::SeatBusy);
        }

        let user_busy: i64 = sqlx::query_scalar(USER_CONFLICT_SQL)
            .bind(session.user_id)
            .bind(session.slot.start)
            .bind(session.slot.end)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_err)?;
        if user_busy > 0 {
            tx.rollback().await.map_err(db_err)?;
            return Ok(ReserveOutcome::UserBusy);
        }

        sqlx::query(
            "INSERT INTO sessions (id, user_id, seat_id, start_time, end_time, token, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(session.id)
        .bind(session.user_id)
        .bind(session.seat_id)
        .bind(session.slot.start)
        .bind(session.slot.end)
        .bind(&session.token)
        .bind(session.status.as_str())
        .bind(session.created_at)
        .bind(session.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(ReserveOutcome::Created)
    }

    async fn find_by_token(&self, token: &str) -> StoreResult<Option<Session>> {
        let row: Option<SessionRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM sessions WHERE token = $1"
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(Session::try_from).transpose()
    }

    async fn update(&self, session: &Session) -> StoreResult<()> {
        sqlx::query(
            "UPDATE sessions SET status = $2, actual_end_time = $3, billing_fee = $4, updated_at = $5 \
             WHERE id = $1",
        )
        .bind(session.id)
        .bind(session.status.as_str())
        .bind(session.actual_end_time)
        .bind(session.billing_fee)
        .bind(session.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn finalize(
        &self,
        token: &str,
        actual_end: DateTime<Utc>,
        fee: i32,
        now: DateTime<Utc>,
    ) -> StoreResult<FinalizeOutcome> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let row: Option<SessionRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM sessions WHERE token = $1 FOR UPDATE"
        ))
        .bind(token)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?;

        let Some(row) = row else {
            tx.rollback().await.map_err(db_err)?;
            return Ok(FinalizeOutcome::NotFound);
        };
        let session = Session::try_from(row)?;

        match session.status {
            SessionStatus::Done => {
                tx.rollback().await.map_err(db_err)?;
                if session.actual_end_time == Some(actual_end) && session.billing_fee == Some(fee) {
                    Ok(FinalizeOutcome::Unchanged)
                } else {
                    Ok(FinalizeOutcome::Mismatch)
                }
            }
            SessionStatus::Valid | SessionStatus::OnGoing => {
                sqlx::query(
                    "UPDATE sessions SET status = 'DONE', actual_end_time = $2, billing_fee = $3, updated_at = $4 \
                     WHERE id = $1",
                )
                .bind(session.id)
                .bind(actual_end)
                .bind(fee)
                .bind(now)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;

                // Fee debit rides the same transaction: a failure here
                // rolls the status change back wholesale.
                sqlx::query("UPDATE users SET remaining_credit = remaining_credit - $2 WHERE id = $1")
                    .bind(session.user_id)
                    .bind(fee)
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?;

                tx.commit().await.map_err(db_err)?;
                Ok(FinalizeOutcome::Finalized)
            }
            other => {
                tx.rollback().await.map_err(db_err)?;
                Ok(FinalizeOutcome::NotFinalizable(other))
            }
        }
    }

    async fn sessions_for_seat_from(
        &self,
        seat_id: Uuid,
        from: DateTime<Utc>,
    ) -> StoreResult<Vec<Session>> {
        let rows: Vec<SessionRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM sessions \
             WHERE seat_id = $1 AND start_time >= $2 ORDER BY start_time ASC"
        ))
        .bind(seat_id)
        .bind(from)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(Session::try_from).collect()
    }

    async fn history_for_user(
        &self,
        user_id: Uuid,
        page: u32,
        page_size: u32,
    ) -> StoreResult<Vec<Session>> {
        let rows: Vec<SessionRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM sessions \
             WHERE user_id = $1 ORDER BY start_time DESC LIMIT $2 OFFSET $3"
        ))
        .bind(user_id)
        .bind(i64::from(page_size))
        .bind(i64::from(page) * i64::from(page_size))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(Session::try_from).collect()
    }

    async fn expire_overdue(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE sessions SET status = 'EXPIRED', updated_at = $1 \
             WHERE status = 'VALID' AND end_time < $1",
        )
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(result.rows_affected())
    }

    async fn expire_overdue_for_user(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE sessions SET status = 'EXPIRED', updated_at = $2 \
             WHERE user_id = $1 AND status = 'VALID' AND end_time < $2",
        )
        .bind(user_id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(result.rows_affected())
    }

    async fn seat_occupied_at(&self, seat_id: Uuid, now: DateTime<Utc>) -> StoreResult<bool> {
        let occupied: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM sessions \
             WHERE seat_id = $1 AND status IN ('VALID', 'ON_GOING') \
             AND start_time <= $2 AND end_time > $2)",
        )
        .bind(seat_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(occupied)
    }
}
