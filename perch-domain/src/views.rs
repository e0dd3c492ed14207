use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::seat::{Seat, SeatStatus};
use crate::session::{Session, SessionStatus};

/// Serialization projection of a seat. The persisted entity carries no
/// JSON shaping of its own.
#[derive(Debug, Clone, Serialize)]
pub struct SeatView {
    pub id: Uuid,
    pub label: String,
    pub status: SeatStatus,
}

impl From<&Seat> for SeatView {
    fn from(seat: &Seat) -> Self {
        Self {
            id: seat.id,
            label: seat.label.clone(),
            status: seat.current_status,
        }
    }
}

/// History-listing projection of a session. The token is deliberately
/// omitted; it is returned only to the booking caller.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub id: Uuid,
    pub seat_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub actual_end_time: Option<DateTime<Utc>>,
    pub billing_fee: Option<i32>,
    pub status: SessionStatus,
}

impl From<&Session> for SessionView {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id,
            seat_id: session.seat_id,
            start_time: session.slot.start,
            end_time: session.slot.end,
            actual_end_time: session.actual_end_time,
            billing_fee: session.billing_fee,
            status: session.status,
        }
    }
}
