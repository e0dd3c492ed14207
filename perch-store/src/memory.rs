use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use perch_core::repository::{
    FinalizeOutcome, NonceStore, ReserveOutcome, SeatStore, SessionStore, UserStore,
};
use perch_core::StoreResult;
use perch_domain::{
    check_conflict, Conflict, DoorNonce, Seat, SeatStatus, Session, TransitionError,
};

#[derive(Default)]
struct State {
    sessions: Vec<Session>,
    seats: HashMap<Uuid, Seat>,
    nonces: HashMap<String, DoorNonce>,
    credits: HashMap<Uuid, i32>,
}

/// In-memory implementation of the full storage contract, for engine
/// tests. One mutex guards the whole state, so `reserve` and
/// `finalize` are trivially atomic, matching the guarantee the
/// Postgres store gets from transactions.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_seat(&self, seat: Seat) {
        self.lock().seats.insert(seat.id, seat);
    }

    /// Registers the user with the given prepaid credit. The credit
    /// map doubles as the user table.
    pub fn set_credit(&self, user_id: Uuid, credit: i32) {
        self.lock().credits.insert(user_id, credit);
    }

    pub fn credit_of(&self, user_id: Uuid) -> i32 {
        self.lock().credits.get(&user_id).copied().unwrap_or(0)
    }

    pub fn session_count(&self) -> usize {
        self.lock().sessions.len()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn reserve(&self, session: &Session) -> StoreResult<ReserveOutcome> {
        let mut state = self.lock();
        match check_conflict(session.seat_id, session.user_id, &session.slot, &state.sessions) {
            Some(Conflict::SeatBusy) => Ok(ReserveOutcome::SeatBusy),
            Some(Conflict::UserBusy) => Ok(ReserveOutcome::UserBusy),
            None => {
                state.sessions.push(session.clone());
                Ok(ReserveOutcome::Created)
            }
        }
    }

    async fn find_by_token(&self, token: &str) -> StoreResult<Option<Session>> {
        Ok(self
            .lock()
            .sessions
            .iter()
            .find(|s| s.token == token)
            .cloned())
    }

    async fn update(&self, session: &Session) -> StoreResult<()> {
        let mut state = self.lock();
        if let Some(stored) = state.sessions.iter_mut().find(|s| s.id == session.id) {
            *stored = session.clone();
        }
        Ok(())
    }

    async fn finalize(
        &self,
        token: &str,
        actual_end: DateTime<Utc>,
        fee: i32,
        now: DateTime<Utc>,
    ) -> StoreResult<FinalizeOutcome> {
        let mut state = self.lock();
        let Some(ix) = state.sessions.iter().position(|s| s.token == token) else {
            return Ok(FinalizeOutcome::NotFound);
        };
        let user_id = state.sessions[ix].user_id;
        match state.sessions[ix].finalize(actual_end, fee, now) {
            Ok(perch_domain::Finalization::Applied) => {
                *state.credits.entry(user_id).or_insert(0) -= fee;
                Ok(FinalizeOutcome::Finalized)
            }
            Ok(perch_domain::Finalization::Unchanged) => Ok(FinalizeOutcome::Unchanged),
            Err(TransitionError::FinalizedMismatch) => Ok(FinalizeOutcome::Mismatch),
            Err(_) => Ok(FinalizeOutcome::NotFinalizable(state.sessions[ix].status)),
        }
    }

    async fn sessions_for_seat_from(
        &self,
        seat_id: Uuid,
        from: DateTime<Utc>,
    ) -> StoreResult<Vec<Session>> {
        let mut sessions: Vec<Session> = self
            .lock()
            .sessions
            .iter()
            .filter(|s| s.seat_id == seat_id && s.slot.start >= from)
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.slot.start);
        Ok(sessions)
    }

    async fn history_for_user(
        &self,
        user_id: Uuid,
        page: u32,
        page_size: u32,
    ) -> StoreResult<Vec<Session>> {
        let mut sessions: Vec<Session> = self
            .lock()
            .sessions
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        sessions.sort_by_key(|s| std::cmp::Reverse(s.slot.start));
        Ok(sessions
            .into_iter()
            .skip(page as usize * page_size as usize)
            .take(page_size as usize)
            .collect())
    }

    async fn expire_overdue(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut state = self.lock();
        let mut changed = 0;
        for session in state.sessions.iter_mut() {
            if session.expire(now) {
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn expire_overdue_for_user(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let mut state = self.lock();
        let mut changed = 0;
        for session in state.sessions.iter_mut().filter(|s| s.user_id == user_id) {
            if session.expire(now) {
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn seat_occupied_at(&self, seat_id: Uuid, now: DateTime<Utc>) -> StoreResult<bool> {
        Ok(self
            .lock()
            .sessions
            .iter()
            .any(|s| s.seat_id == seat_id && s.covers(now)))
    }
}

#[async_trait]
impl SeatStore for MemoryStore {
    async fn seat(&self, id: Uuid) -> StoreResult<Option<Seat>> {
        Ok(self.lock().seats.get(&id).cloned())
    }

    async fn seats_of_store(&self, store_id: Uuid) -> StoreResult<Vec<Seat>> {
        let mut seats: Vec<Seat> = self
            .lock()
            .seats
            .values()
            .filter(|s| s.store_id == store_id)
            .cloned()
            .collect();
        seats.sort_by(|a, b| a.label.cmp(&b.label).then(a.id.cmp(&b.id)));
        Ok(seats)
    }

    async fn set_cached_status(&self, seat_id: Uuid, status: SeatStatus) -> StoreResult<()> {
        if let Some(seat) = self.lock().seats.get_mut(&seat_id) {
            seat.current_status = status;
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn user_exists(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.lock().credits.contains_key(&id))
    }
}

#[async_trait]
impl NonceStore for MemoryStore {
    async fn live_nonce_for_user(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<DoorNonce>> {
        Ok(self
            .lock()
            .nonces
            .values()
            .filter(|n| n.user_id == user_id && n.is_live(now))
            .max_by_key(|n| n.created_at)
            .cloned())
    }

    async fn insert(&self, nonce: &DoorNonce) -> StoreResult<bool> {
        let mut state = self.lock();
        // A collision only counts against a live code; dead entries
        // are overwritten so burned codes return to the pool.
        if state
            .nonces
            .get(&nonce.code)
            .is_some_and(|held| held.is_live(nonce.created_at))
        {
            return Ok(false);
        }
        state.nonces.insert(nonce.code.clone(), nonce.clone());
        Ok(true)
    }

    async fn find_live(&self, code: &str, now: DateTime<Utc>) -> StoreResult<Option<DoorNonce>> {
        Ok(self
            .lock()
            .nonces
            .get(code)
            .filter(|n| n.is_live(now))
            .cloned())
    }

    async fn invalidate(&self, code: &str) -> StoreResult<()> {
        if let Some(nonce) = self.lock().nonces.get_mut(code) {
            nonce.valid = false;
        }
        Ok(())
    }

    async fn expire_stale(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut state = self.lock();
        let mut changed = 0;
        for nonce in state.nonces.values_mut() {
            if nonce.valid && nonce.expires_at <= now {
                nonce.valid = false;
                changed += 1;
            }
        }
        Ok(changed)
    }
}
