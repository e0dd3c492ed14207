use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Booking duration assumed when a request carries no end time:
/// one hour of desk time plus a ten-minute grace period.
pub const DEFAULT_DURATION_MINUTES: i64 = 70;

/// A half-open time interval `[start, end)`.
///
/// Every slot has a bounded end; requests without one get the default
/// duration at construction so all comparisons work on closed data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeSlot {
    /// Build a slot from a start and an optional end, applying the
    /// default duration when the end is absent.
    pub fn bounded(
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
        default_duration: Duration,
    ) -> Result<Self, SlotError> {
        let end = end.unwrap_or(start + default_duration);
        if end <= start {
            return Err(SlotError::Empty { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn new(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Result<Self, SlotError> {
        Self::bounded(start, end, Duration::minutes(DEFAULT_DURATION_MINUTES))
    }

    /// Half-open overlap: two slots conflict unless one ends at or
    /// before the other starts. Adjacent slots sharing an endpoint do
    /// not overlap.
    pub fn overlaps(&self, other: &TimeSlot) -> bool {
        !(self.end <= other.start || other.end <= self.start)
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }

    /// Widen the slot by `buffer` on both sides.
    pub fn padded(&self, buffer: Duration) -> TimeSlot {
        TimeSlot {
            start: self.start - buffer,
            end: self.end + buffer,
        }
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SlotError {
    #[error("slot is empty or inverted: start {start}, end {end}")]
    Empty {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}
