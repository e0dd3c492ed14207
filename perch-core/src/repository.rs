use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::StoreResult;
use perch_domain::{DoorNonce, Seat, SeatStatus, Session, SessionStatus};

/// Result of the atomic conflict-check-and-insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReserveOutcome {
    Created,
    SeatBusy,
    UserBusy,
}

/// Result of the atomic checkout finalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeOutcome {
    /// Status moved to Done; the fee was debited from the user.
    Finalized,
    /// Already Done with identical values; nothing changed.
    Unchanged,
    /// Already Done with different values; nothing changed.
    Mismatch,
    /// The session exists but is Expired or Cancelled.
    NotFinalizable(SessionStatus),
    NotFound,
}

/// Session persistence. Implementations must make `reserve` and
/// `finalize` single atomic units: a read-then-write without isolation
/// reintroduces double booking.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Run the seat/user conflict check and, if clear, insert the
    /// session, all inside one transaction.
    async fn reserve(&self, session: &Session) -> StoreResult<ReserveOutcome>;

    async fn find_by_token(&self, token: &str) -> StoreResult<Option<Session>>;

    /// Persist a status transition already applied to the entity.
    async fn update(&self, session: &Session) -> StoreResult<()>;

    /// Mark the session Done with the given actual end and fee, and
    /// debit the fee from the user's credit, in one transaction.
    async fn finalize(
        &self,
        token: &str,
        actual_end: DateTime<Utc>,
        fee: i32,
        now: DateTime<Utc>,
    ) -> StoreResult<FinalizeOutcome>;

    /// Sessions for a seat starting at or after `from`, ascending by
    /// start time. Feeds the timeline builder.
    async fn sessions_for_seat_from(
        &self,
        seat_id: Uuid,
        from: DateTime<Utc>,
    ) -> StoreResult<Vec<Session>>;

    /// A user's sessions, newest first, limit/offset paginated.
    async fn history_for_user(
        &self,
        user_id: Uuid,
        page: u32,
        page_size: u32,
    ) -> StoreResult<Vec<Session>>;

    /// Bulk Valid -> Expired for sessions whose end has passed.
    /// Returns the number of rows changed; idempotent.
    async fn expire_overdue(&self, now: DateTime<Utc>) -> StoreResult<u64>;

    /// Same sweep scoped to one user, run lazily before history reads.
    async fn expire_overdue_for_user(&self, user_id: Uuid, now: DateTime<Utc>)
        -> StoreResult<u64>;

    /// Whether any live session covers `now` for the seat. This is the
    /// authoritative occupancy answer; the cached seat column is not.
    async fn seat_occupied_at(&self, seat_id: Uuid, now: DateTime<Utc>) -> StoreResult<bool>;
}

/// Seat persistence.
#[async_trait]
pub trait SeatStore: Send + Sync {
    async fn seat(&self, id: Uuid) -> StoreResult<Option<Seat>>;

    async fn seats_of_store(&self, store_id: Uuid) -> StoreResult<Vec<Seat>>;

    /// Refresh the cached summary column. Cosmetic only.
    async fn set_cached_status(&self, seat_id: Uuid, status: SeatStatus) -> StoreResult<()>;
}

/// The engine's projection of the user table. Profile management lives
/// elsewhere; bookings only need to know the user is registered.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn user_exists(&self, id: Uuid) -> StoreResult<bool>;
}

/// Door-nonce persistence.
#[async_trait]
pub trait NonceStore: Send + Sync {
    /// The user's live nonce, if any.
    async fn live_nonce_for_user(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<DoorNonce>>;

    /// Insert a fresh nonce; `false` means the code collided with a
    /// live one and the caller should draw again.
    async fn insert(&self, nonce: &DoorNonce) -> StoreResult<bool>;

    /// Look up a live nonce by code.
    async fn find_live(&self, code: &str, now: DateTime<Utc>) -> StoreResult<Option<DoorNonce>>;

    async fn invalidate(&self, code: &str) -> StoreResult<()>;

    /// Mark every overdue nonce invalid. Returns rows changed.
    async fn expire_stale(&self, now: DateTime<Utc>) -> StoreResult<u64>;
}
