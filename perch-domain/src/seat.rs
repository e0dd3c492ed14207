use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Summary occupancy state of a seat.
///
/// This is a cached value; the session table is authoritative and the
/// engine derives the real status from live sessions covering `now`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatStatus {
    Vacant,
    Occupied,
}

impl SeatStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeatStatus::Vacant => "VACANT",
            SeatStatus::Occupied => "OCCUPIED",
        }
    }
}

impl std::str::FromStr for SeatStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "VACANT" => Ok(SeatStatus::Vacant),
            "OCCUPIED" => Ok(SeatStatus::Occupied),
            other => Err(format!("unknown seat status: {other}")),
        }
    }
}

/// A physical bookable desk within a store. Created administratively,
/// never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Seat {
    pub id: Uuid,
    pub store_id: Uuid,
    /// Display label, also used as the sector key when grouping
    /// store-wide timelines.
    pub label: String,
    pub current_status: SeatStatus,
}

impl Seat {
    pub fn new(store_id: Uuid, label: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            store_id,
            label: label.into(),
            current_status: SeatStatus::Vacant,
        }
    }
}
