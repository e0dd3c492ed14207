pub mod conflict;
pub mod interval;
pub mod nonce;
pub mod occupancy;
pub mod policy;
pub mod seat;
pub mod session;
pub mod views;

pub use conflict::{check_conflict, Conflict};
pub use interval::{SlotError, TimeSlot, DEFAULT_DURATION_MINUTES};
pub use nonce::DoorNonce;
pub use occupancy::{OccupancySegment, SeatDayTimeline, SectorTimeline};
pub use policy::{OperatingWindow, ReservationPolicy};
pub use seat::{Seat, SeatStatus};
pub use session::{Finalization, Session, SessionStatus, TransitionError};
pub use views::{SeatView, SessionView};
