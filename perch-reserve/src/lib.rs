pub mod access;
pub mod service;
pub mod sweeper;
pub mod timeline;

pub use access::{AccessError, NonceIssuer};
pub use perch_domain::{OperatingWindow, ReservationPolicy};
pub use service::{ReservationError, ReservationService};
pub use timeline::TimelineBuilder;
