use uuid::Uuid;

use crate::interval::TimeSlot;
use crate::session::Session;

/// An overlapping-interval violation on one of the two booking
/// dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conflict {
    /// The seat already has a live session overlapping the slot.
    SeatBusy,
    /// The user already holds a live session overlapping the slot,
    /// possibly on another seat.
    UserBusy,
}

/// Check a candidate booking against existing sessions.
///
/// Only live (Valid/OnGoing) sessions count. The seat dimension is
/// checked before the user dimension: seat scarcity is the primary
/// constraint, so a doubly-conflicting request reports `SeatBusy`.
///
/// Boundary policy: strict half-open overlap with no buffer padding at
/// admission; handoff buffers apply only to timeline rendering. The
/// storage layer must run this same predicate and the insert as one
/// atomic unit.
pub fn check_conflict(
    seat_id: Uuid,
    user_id: Uuid,
    slot: &TimeSlot,
    existing: &[Session],
) -> Option<Conflict> {
    let busy = |s: &&Session| s.status.is_live() && s.slot.overlaps(slot);

    if existing.iter().filter(|s| s.seat_id == seat_id).any(|s| busy(&s)) {
        return Some(Conflict::SeatBusy);
    }
    if existing.iter().filter(|s| s.user_id == user_id).any(|s| busy(&s)) {
        return Some(Conflict::UserBusy);
    }
    None
}
