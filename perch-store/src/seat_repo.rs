use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db_err;
use perch_core::repository::SeatStore;
use perch_core::{StoreError, StoreResult};
use perch_domain::{Seat, SeatStatus};

pub struct PgSeatStore {
    pool: PgPool,
}

impl PgSeatStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct SeatRow {
    id: Uuid,
    store_id: Uuid,
    label: String,
    current_status: String,
}

impl TryFrom<SeatRow> for Seat {
    type Error = StoreError;

    fn try_from(row: SeatRow) -> Result<Self, StoreError> {
        let current_status: SeatStatus = row.current_status.parse().map_err(StoreError::Decode)?;
        Ok(Seat {
            id: row.id,
            store_id: row.store_id,
            label: row.label,
            current_status,
        })
    }
}

#[async_trait]
impl SeatStore for PgSeatStore {
    async fn seat(&self, id: Uuid) -> StoreResult<Option<Seat>> {
        let row: Option<SeatRow> =
            sqlx::query_as("SELECT id, store_id, label, current_status FROM seats WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        row.map(Seat::try_from).transpose()
    }

    async fn seats_of_store(&self, store_id: Uuid) -> StoreResult<Vec<Seat>> {
        let rows: Vec<SeatRow> = sqlx::query_as(
            "SELECT id, store_id, label, current_status FROM seats \
             WHERE store_id = $1 ORDER BY label, id",
        )
        .bind(store_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.into_iter().map(Seat::try_from).collect()
    }

    async fn set_cached_status(&self, seat_id: Uuid, status: SeatStatus) -> StoreResult<()> {
        sqlx::query("UPDATE seats SET current_status = $2 WHERE id = $1")
            .bind(seat_id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }
}
