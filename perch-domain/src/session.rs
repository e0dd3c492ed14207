use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::interval::TimeSlot;

/// Lifecycle state of a reservation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    /// Booking accepted, not yet checked in.
    Valid,
    /// User has physically checked in.
    OnGoing,
    /// End time passed without a checkout; applied by the sweep.
    Expired,
    /// Checkout completed, fee and actual end recorded. Terminal.
    Done,
    /// Withdrawn before start. Terminal.
    Cancelled,
}

impl SessionStatus {
    /// Live sessions are the ones that count for conflict checking and
    /// seat occupancy.
    pub fn is_live(&self) -> bool {
        matches!(self, SessionStatus::Valid | SessionStatus::OnGoing)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Done | SessionStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Valid => "VALID",
            SessionStatus::OnGoing => "ON_GOING",
            SessionStatus::Expired => "EXPIRED",
            SessionStatus::Done => "DONE",
            SessionStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "VALID" => Ok(SessionStatus::Valid),
            "ON_GOING" => Ok(SessionStatus::OnGoing),
            "EXPIRED" => Ok(SessionStatus::Expired),
            "DONE" => Ok(SessionStatus::Done),
            "CANCELLED" => Ok(SessionStatus::Cancelled),
            other => Err(format!("unknown session status: {other}")),
        }
    }
}

/// Outcome of a finalize call. Re-applying identical values is
/// harmless; conflicting values are a caller bug.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finalization {
    Applied,
    Unchanged,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("cannot {action} a {status:?} session")]
    InvalidState {
        status: SessionStatus,
        action: &'static str,
    },
    #[error("session has already started")]
    AlreadyStarted,
    #[error("session already finalized with different values")]
    FinalizedMismatch,
}

/// A time-bounded claim by one user on one seat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub seat_id: Uuid,
    pub slot: TimeSlot,
    /// Real checkout time, may differ from the nominal slot end.
    /// Set once at checkout, together with the fee.
    pub actual_end_time: Option<DateTime<Utc>>,
    pub billing_fee: Option<i32>,
    /// Opaque minted token identifying this session to its holder.
    pub token: String,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(
        id: Uuid,
        user_id: Uuid,
        seat_id: Uuid,
        slot: TimeSlot,
        token: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            seat_id,
            slot,
            actual_end_time: None,
            billing_fee: None,
            token,
            status: SessionStatus::Valid,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether this session occupies its seat at `instant`.
    pub fn covers(&self, instant: DateTime<Utc>) -> bool {
        self.status.is_live() && self.slot.contains(instant)
    }

    /// Valid -> OnGoing on physical check-in. Rejected once the booking
    /// window has closed.
    pub fn check_in(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        if self.status != SessionStatus::Valid {
            return Err(TransitionError::InvalidState {
                status: self.status,
                action: "check in",
            });
        }
        if now >= self.slot.end {
            return Err(TransitionError::InvalidState {
                status: self.status,
                action: "check in past the end of",
            });
        }
        self.status = SessionStatus::OnGoing;
        self.updated_at = now;
        Ok(())
    }

    /// Valid -> Cancelled, only before the booking starts. A checked-in
    /// session can only end via checkout.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        if self.status != SessionStatus::Valid {
            return Err(TransitionError::InvalidState {
                status: self.status,
                action: "cancel",
            });
        }
        if now >= self.slot.start {
            return Err(TransitionError::AlreadyStarted);
        }
        self.status = SessionStatus::Cancelled;
        self.updated_at = now;
        Ok(())
    }

    /// Valid/OnGoing -> Done. Sets the actual end time and the billing
    /// fee together; neither is ever revised afterwards.
    pub fn finalize(
        &mut self,
        actual_end: DateTime<Utc>,
        fee: i32,
        now: DateTime<Utc>,
    ) -> Result<Finalization, TransitionError> {
        if self.status == SessionStatus::Done {
            return if self.actual_end_time == Some(actual_end) && self.billing_fee == Some(fee) {
                Ok(Finalization::Unchanged)
            } else {
                Err(TransitionError::FinalizedMismatch)
            };
        }
        if !self.status.is_live() {
            return Err(TransitionError::InvalidState {
                status: self.status,
                action: "finalize",
            });
        }
        self.status = SessionStatus::Done;
        self.actual_end_time = Some(actual_end);
        self.billing_fee = Some(fee);
        self.updated_at = now;
        Ok(Finalization::Applied)
    }

    /// Valid -> Expired once the nominal end has passed. Returns whether
    /// anything changed, so the sweep stays idempotent.
    pub fn expire(&mut self, now: DateTime<Utc>) -> bool {
        if self.status == SessionStatus::Valid && now > self.slot.end {
            self.status = SessionStatus::Expired;
            self.updated_at = now;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, hour, min, 0).unwrap()
    }

    fn session() -> Session {
        let slot = TimeSlot::new(at(10, 0), Some(at(11, 0))).unwrap();
        Session::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            slot,
            "tok".into(),
            at(9, 0),
        )
    }

    #[test]
    fn check_in_then_finalize() {
        let mut s = session();
        s.check_in(at(10, 5)).unwrap();
        assert_eq!(s.status, SessionStatus::OnGoing);

        let outcome = s.finalize(at(10, 50), 300, at(10, 50)).unwrap();
        assert_eq!(outcome, Finalization::Applied);
        assert_eq!(s.status, SessionStatus::Done);
        assert_eq!(s.actual_end_time, Some(at(10, 50)));
        assert_eq!(s.billing_fee, Some(300));
    }

    #[test]
    fn finalize_is_idempotent_on_identical_values() {
        let mut s = session();
        s.finalize(at(10, 50), 300, at(10, 50)).unwrap();
        assert_eq!(
            s.finalize(at(10, 50), 300, at(10, 51)),
            Ok(Finalization::Unchanged)
        );
        // Conflicting values never overwrite the stored fee.
        assert_eq!(
            s.finalize(at(10, 55), 999, at(10, 52)),
            Err(TransitionError::FinalizedMismatch)
        );
        assert_eq!(s.billing_fee, Some(300));
    }

    #[test]
    fn cancel_only_before_start() {
        let mut s = session();
        assert_eq!(s.cancel(at(10, 0)), Err(TransitionError::AlreadyStarted));

        let mut s = session();
        s.cancel(at(9, 30)).unwrap();
        assert_eq!(s.status, SessionStatus::Cancelled);
    }

    #[test]
    fn ongoing_session_cannot_cancel() {
        let mut s = session();
        s.check_in(at(10, 5)).unwrap();
        assert!(matches!(
            s.cancel(at(10, 6)),
            Err(TransitionError::InvalidState { .. })
        ));
    }

    #[test]
    fn terminal_states_never_transition_back() {
        let mut s = session();
        s.cancel(at(9, 0)).unwrap();
        assert!(s.check_in(at(10, 5)).is_err());
        assert!(!s.expire(at(12, 0)));
        assert!(matches!(
            s.finalize(at(11, 0), 100, at(11, 0)),
            Err(TransitionError::InvalidState { .. })
        ));
        assert_eq!(s.status, SessionStatus::Cancelled);
    }

    #[test]
    fn expire_only_past_end_and_only_once() {
        let mut s = session();
        assert!(!s.expire(at(10, 59)));
        assert!(s.expire(at(11, 1)));
        assert_eq!(s.status, SessionStatus::Expired);
        // Second sweep over the same data changes nothing.
        assert!(!s.expire(at(11, 2)));
    }

    #[test]
    fn late_check_in_rejected() {
        let mut s = session();
        assert!(s.check_in(at(11, 0)).is_err());
    }
}
