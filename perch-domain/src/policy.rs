use chrono::Duration;

use crate::interval::DEFAULT_DURATION_MINUTES;

/// The stretch of a calendar day a store is bookable, as offsets from
/// midnight, plus the handoff buffer padded around each session when
/// rendering.
#[derive(Debug, Clone, Copy)]
pub struct OperatingWindow {
    pub open: Duration,
    pub close: Duration,
    pub buffer: Duration,
}

impl Default for OperatingWindow {
    fn default() -> Self {
        // 08:00 through next-day midnight, five-minute handoffs.
        Self {
            open: Duration::hours(8),
            close: Duration::hours(24),
            buffer: Duration::minutes(5),
        }
    }
}

impl OperatingWindow {
    pub fn new(open_hour: i64, close_hour: i64, buffer_minutes: i64) -> Self {
        Self {
            open: Duration::hours(open_hour),
            close: Duration::hours(close_hour),
            buffer: Duration::minutes(buffer_minutes),
        }
    }
}

/// Tunable business rules for the engine.
#[derive(Debug, Clone, Copy)]
pub struct ReservationPolicy {
    pub default_duration: Duration,
    pub window: OperatingWindow,
    pub nonce_ttl: Duration,
    pub history_page_size: u32,
}

impl Default for ReservationPolicy {
    fn default() -> Self {
        Self {
            default_duration: Duration::minutes(DEFAULT_DURATION_MINUTES),
            window: OperatingWindow::default(),
            nonce_ttl: Duration::minutes(30),
            history_page_size: 20,
        }
    }
}
