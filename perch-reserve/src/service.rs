use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::access::{AccessError, NonceIssuer};
use crate::timeline::TimelineBuilder;
use perch_core::clock::Clock;
use perch_core::repository::{
    FinalizeOutcome, NonceStore, ReserveOutcome, SeatStore, SessionStore, UserStore,
};
use perch_core::token::{TokenError, TokenMinter};
use perch_core::StoreError;
use perch_domain::{
    DoorNonce, OccupancySegment, ReservationPolicy, SeatDayTimeline, SeatStatus, SeatView,
    SectorTimeline, Session, SessionView, SlotError, TimeSlot, TransitionError,
};

#[derive(Debug, thiserror::Error)]
pub enum ReservationError {
    #[error("seat is already booked for that time")]
    SeatBusy,
    #[error("you already hold a booking for that time")]
    UserBusy,
    #[error("seat not found")]
    SeatNotFound,
    #[error("user {0} is not registered")]
    UserNotFound(Uuid),
    #[error("session not found")]
    NotFound,
    #[error("too late to cancel")]
    TooLate,
    #[error("session already finalized with different values")]
    AlreadyFinalized,
    #[error(transparent)]
    InvalidSlot(#[from] SlotError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Access(#[from] AccessError),
}

impl ReservationError {
    /// Expected, recoverable conditions a client can render verbatim.
    /// Everything else is infrastructure or a logic bug and stays
    /// opaque.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            ReservationError::SeatBusy
                | ReservationError::UserBusy
                | ReservationError::SeatNotFound
                | ReservationError::UserNotFound(_)
                | ReservationError::NotFound
                | ReservationError::TooLate
                | ReservationError::AlreadyFinalized
                | ReservationError::InvalidSlot(_)
        )
    }
}

/// Orchestrates booking: validates the request, runs the conflict
/// check, mints the token, persists, and answers history and timeline
/// queries. All storage goes through injected trait objects so the
/// engine tests against the in-memory store.
pub struct ReservationService {
    sessions: Arc<dyn SessionStore>,
    seats: Arc<dyn SeatStore>,
    users: Arc<dyn UserStore>,
    access: NonceIssuer,
    minter: TokenMinter,
    clock: Arc<dyn Clock>,
    timeline: TimelineBuilder,
    policy: ReservationPolicy,
}

impl ReservationService {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        seats: Arc<dyn SeatStore>,
        users: Arc<dyn UserStore>,
        nonces: Arc<dyn NonceStore>,
        minter: TokenMinter,
        clock: Arc<dyn Clock>,
        policy: ReservationPolicy,
    ) -> Self {
        Self {
            sessions,
            seats,
            users,
            access: NonceIssuer::new(nonces, policy.nonce_ttl),
            minter,
            clock,
            timeline: TimelineBuilder::new(policy.window),
            policy,
        }
    }

    /// Book a seat. On success the minted token is the caller's handle
    /// for every later operation on this session.
    pub async fn request_reservation(
        &self,
        user_id: Uuid,
        seat_id: Uuid,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Result<String, ReservationError> {
        let now = self.clock.now();
        let slot = TimeSlot::bounded(start, end, self.policy.default_duration)?;

        if self.seats.seat(seat_id).await?.is_none() {
            return Err(ReservationError::SeatNotFound);
        }
        if !self.users.user_exists(user_id).await? {
            return Err(ReservationError::UserNotFound(user_id));
        }

        // Mint before insert; a mint failure aborts the booking and
        // nothing is persisted.
        let session_id = Uuid::new_v4();
        let token = self
            .minter
            .mint(seat_id, user_id, session_id.as_bytes(), now)?;
        let session = Session::new(session_id, user_id, seat_id, slot, token.clone(), now);

        match self.sessions.reserve(&session).await? {
            ReserveOutcome::Created => {
                info!(%user_id, %seat_id, start = %slot.start, end = %slot.end, "reservation created");
                self.refresh_seat_status(seat_id, now).await?;
                Ok(token)
            }
            ReserveOutcome::SeatBusy => Err(ReservationError::SeatBusy),
            ReserveOutcome::UserBusy => Err(ReservationError::UserBusy),
        }
    }

    /// Physical check-in: marks the session ongoing and hands back a
    /// door code.
    pub async fn check_in(&self, token: &str) -> Result<DoorNonce, ReservationError> {
        let now = self.clock.now();
        let mut session = self
            .sessions
            .find_by_token(token)
            .await?
            .ok_or(ReservationError::NotFound)?;

        session.check_in(now)?;
        self.sessions.update(&session).await?;
        self.refresh_seat_status(session.seat_id, now).await?;

        let nonce = self
            .access
            .issue(session.user_id, Some(session.id), now)
            .await?;
        Ok(nonce)
    }

    /// Checkout: marks the session done, records the actual end time
    /// and fee, and debits the fee, all in one atomic unit in the
    /// store. Replaying with identical values is a no-op.
    pub async fn checkout(
        &self,
        token: &str,
        actual_end: DateTime<Utc>,
        fee: i32,
    ) -> Result<(), ReservationError> {
        let now = self.clock.now();
        match self.sessions.finalize(token, actual_end, fee, now).await? {
            FinalizeOutcome::Finalized => {
                let session = self.sessions.find_by_token(token).await?;
                if let Some(session) = session {
                    info!(session_id = %session.id, fee, "session finalized");
                    self.refresh_seat_status(session.seat_id, now).await?;
                }
                Ok(())
            }
            FinalizeOutcome::Unchanged => Ok(()),
            FinalizeOutcome::Mismatch => {
                warn!(token, "conflicting re-finalization rejected");
                Err(ReservationError::AlreadyFinalized)
            }
            FinalizeOutcome::NotFinalizable(status) => Err(ReservationError::Transition(
                TransitionError::InvalidState {
                    status,
                    action: "finalize",
                },
            )),
            FinalizeOutcome::NotFound => Err(ReservationError::NotFound),
        }
    }

    /// Withdraw a booking before it starts.
    pub async fn cancel(&self, token: &str) -> Result<(), ReservationError> {
        let now = self.clock.now();
        let mut session = self
            .sessions
            .find_by_token(token)
            .await?
            .ok_or(ReservationError::NotFound)?;

        session.cancel(now).map_err(|err| match err {
            TransitionError::AlreadyStarted => ReservationError::TooLate,
            other => ReservationError::Transition(other),
        })?;
        self.sessions.update(&session).await?;
        self.refresh_seat_status(session.seat_id, now).await?;
        info!(session_id = %session.id, "reservation cancelled");
        Ok(())
    }

    /// A seat's gap-filled occupancy timeline for one day.
    pub async fn seat_timeline(
        &self,
        seat_id: Uuid,
        day: NaiveDate,
    ) -> Result<Vec<OccupancySegment>, ReservationError> {
        if self.seats.seat(seat_id).await?.is_none() {
            return Err(ReservationError::SeatNotFound);
        }
        let midnight = day.and_time(NaiveTime::MIN).and_utc();
        let sessions = self.sessions.sessions_for_seat_from(seat_id, midnight).await?;
        Ok(self.timeline.build_day(&sessions, day))
    }

    /// All seats of a store for one day, grouped by sector label.
    pub async fn store_timeline(
        &self,
        store_id: Uuid,
        day: NaiveDate,
    ) -> Result<Vec<SectorTimeline>, ReservationError> {
        let midnight = day.and_time(NaiveTime::MIN).and_utc();
        let seats = self.seats.seats_of_store(store_id).await?;

        let mut timelines = Vec::with_capacity(seats.len());
        for seat in &seats {
            let sessions = self.sessions.sessions_for_seat_from(seat.id, midnight).await?;
            timelines.push(SeatDayTimeline {
                seat: SeatView::from(seat),
                segments: self.timeline.build_day(&sessions, day),
            });
        }
        Ok(self.timeline.group_by_sector(timelines))
    }

    /// A user's reservations, newest first. The user's own past-due
    /// Valid sessions are swept to Expired first, so stale rows never
    /// show as current.
    pub async fn user_history(
        &self,
        user_id: Uuid,
        page: u32,
    ) -> Result<Vec<SessionView>, ReservationError> {
        let now = self.clock.now();
        self.sessions.expire_overdue_for_user(user_id, now).await?;
        let sessions = self
            .sessions
            .history_for_user(user_id, page, self.policy.history_page_size)
            .await?;
        Ok(sessions.iter().map(SessionView::from).collect())
    }

    /// Issue (or return the live) door code for a session holder.
    pub async fn door_nonce(&self, token: &str) -> Result<DoorNonce, ReservationError> {
        let now = self.clock.now();
        let session = self
            .sessions
            .find_by_token(token)
            .await?
            .ok_or(ReservationError::NotFound)?;
        if !session.status.is_live() {
            return Err(ReservationError::Transition(TransitionError::InvalidState {
                status: session.status,
                action: "issue a door code for",
            }));
        }
        Ok(self.access.issue(session.user_id, Some(session.id), now).await?)
    }

    /// The periodic sweep entry point: Valid -> Expired across all
    /// users. Idempotent.
    pub async fn expire_overdue(&self) -> Result<u64, ReservationError> {
        let now = self.clock.now();
        let swept = self.sessions.expire_overdue(now).await?;
        if swept > 0 {
            info!(swept, "expired overdue sessions");
        }
        Ok(swept)
    }

    /// Recompute the seat's cached summary from live sessions. The
    /// session table stays authoritative; this column is display-only.
    async fn refresh_seat_status(
        &self,
        seat_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), ReservationError> {
        let occupied = self.sessions.seat_occupied_at(seat_id, now).await?;
        let status = if occupied {
            SeatStatus::Occupied
        } else {
            SeatStatus::Vacant
        };
        self.seats.set_cached_status(seat_id, status).await?;
        Ok(())
    }
}
