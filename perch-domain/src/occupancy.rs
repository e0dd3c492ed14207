use serde::{Deserialize, Serialize};

use crate::interval::TimeSlot;
use crate::seat::SeatStatus;
use crate::views::SeatView;

/// One stretch of a seat's day: either vacant or occupied. Derived for
/// reporting, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupancySegment {
    #[serde(flatten)]
    pub slot: TimeSlot,
    pub status: SeatStatus,
}

impl OccupancySegment {
    pub fn vacant(slot: TimeSlot) -> Self {
        Self {
            slot,
            status: SeatStatus::Vacant,
        }
    }

    pub fn occupied(slot: TimeSlot) -> Self {
        Self {
            slot,
            status: SeatStatus::Occupied,
        }
    }
}

/// A seat's gapless schedule for one day.
#[derive(Debug, Clone, Serialize)]
pub struct SeatDayTimeline {
    pub seat: SeatView,
    pub segments: Vec<OccupancySegment>,
}

/// Per-sector grouping of seat timelines for store-wide display. Seats
/// sharing a label belong to the same sector.
#[derive(Debug, Clone, Serialize)]
pub struct SectorTimeline {
    pub label: String,
    pub seats: Vec<SeatDayTimeline>,
}
