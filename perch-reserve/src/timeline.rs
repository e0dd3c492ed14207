use chrono::{NaiveDate, NaiveTime};
use std::collections::BTreeMap;

use perch_domain::{
    OccupancySegment, OperatingWindow, SeatDayTimeline, SectorTimeline, Session, SessionStatus,
    TimeSlot,
};

/// Reconstructs a seat's day as an ordered, gap-filled sequence of
/// vacant/occupied segments. Read-only reporting; nothing here mutates
/// state.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimelineBuilder {
    window: OperatingWindow,
}

impl TimelineBuilder {
    pub fn new(window: OperatingWindow) -> Self {
        Self { window }
    }

    /// Walk the seat's sessions for `day` in start order, padding each
    /// by the handoff buffer and synthesizing vacancy gaps. Padded
    /// boundaries are clamped to the window and to the walking cursor,
    /// so the output is always a total, gapless, non-overlapping
    /// partition of the operating window.
    pub fn build_day(&self, sessions: &[Session], day: NaiveDate) -> Vec<OccupancySegment> {
        let midnight = day.and_time(NaiveTime::MIN).and_utc();
        let open = midnight + self.window.open;
        let close = midnight + self.window.close;

        let mut relevant: Vec<&Session> = sessions
            .iter()
            .filter(|s| s.status != SessionStatus::Cancelled)
            .collect();
        relevant.sort_by_key(|s| s.slot.start);

        let mut segments = Vec::new();
        let mut cursor = open;
        for session in relevant {
            let padded = session.slot.padded(self.window.buffer);
            let start = padded.start.max(cursor).min(close);
            let end = padded.end.max(start).min(close);
            if start >= close {
                break;
            }
            if end <= start {
                // Entirely absorbed by an earlier segment.
                continue;
            }
            if cursor < start {
                segments.push(OccupancySegment::vacant(TimeSlot { start: cursor, end: start }));
            }
            segments.push(OccupancySegment::occupied(TimeSlot { start, end }));
            cursor = end;
        }

        if cursor < close {
            segments.push(OccupancySegment::vacant(TimeSlot { start: cursor, end: close }));
        }
        segments
    }

    /// Group per-seat timelines into sectors keyed by seat label, for
    /// store-wide display.
    pub fn group_by_sector(&self, timelines: Vec<SeatDayTimeline>) -> Vec<SectorTimeline> {
        let mut sectors: BTreeMap<String, Vec<SeatDayTimeline>> = BTreeMap::new();
        for timeline in timelines {
            sectors
                .entry(timeline.seat.label.clone())
                .or_default()
                .push(timeline);
        }
        sectors
            .into_iter()
            .map(|(label, seats)| SectorTimeline { label, seats })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use perch_domain::{SeatStatus, SeatView};
    use proptest::prelude::*;
    use uuid::Uuid;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 14).unwrap()
    }

    fn at(hour: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, hour, min, 0).unwrap()
    }

    fn session(start: DateTime<Utc>, end: DateTime<Utc>) -> Session {
        Session::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            TimeSlot::new(start, Some(end)).unwrap(),
            String::new(),
            start,
        )
    }

    fn assert_partition(segments: &[OccupancySegment]) {
        let open = at(8, 0);
        let close = day().succ_opt().unwrap().and_time(NaiveTime::MIN).and_utc();
        assert!(!segments.is_empty());
        assert_eq!(segments[0].slot.start, open);
        assert_eq!(segments[segments.len() - 1].slot.end, close);
        for segment in segments {
            assert!(segment.slot.start < segment.slot.end);
        }
        for pair in segments.windows(2) {
            assert_eq!(pair[0].slot.end, pair[1].slot.start, "gap or overlap");
        }
    }

    #[test]
    fn empty_day_is_one_vacant_segment() {
        let segments = TimelineBuilder::default().build_day(&[], day());
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].status, SeatStatus::Vacant);
        assert_partition(&segments);
    }

    #[test]
    fn single_session_pads_and_fills_gaps() {
        let segments =
            TimelineBuilder::default().build_day(&[session(at(10, 0), at(11, 0))], day());
        assert_partition(&segments);
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].status, SeatStatus::Vacant);
        // Padded by five minutes on each side.
        assert_eq!(segments[1].slot.start, at(9, 55));
        assert_eq!(segments[1].slot.end, at(11, 5));
        assert_eq!(segments[1].status, SeatStatus::Occupied);
        assert_eq!(segments[2].status, SeatStatus::Vacant);
    }

    #[test]
    fn full_coverage_leaves_no_vacancy() {
        let close = day().succ_opt().unwrap().and_time(NaiveTime::MIN).and_utc();
        let segments =
            TimelineBuilder::default().build_day(&[session(at(8, 0), close)], day());
        assert_partition(&segments);
        assert!(segments.iter().all(|s| s.status == SeatStatus::Occupied));
    }

    #[test]
    fn session_near_window_open_is_clamped() {
        // Padding would reach before 08:00; the segment starts at open.
        let segments =
            TimelineBuilder::default().build_day(&[session(at(8, 2), at(9, 0))], day());
        assert_partition(&segments);
        assert_eq!(segments[0].slot.start, at(8, 0));
        assert_eq!(segments[0].status, SeatStatus::Occupied);
    }

    #[test]
    fn cancelled_sessions_do_not_occupy() {
        let mut cancelled = session(at(10, 0), at(11, 0));
        cancelled.status = SessionStatus::Cancelled;
        let segments = TimelineBuilder::default().build_day(&[cancelled], day());
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].status, SeatStatus::Vacant);
    }

    #[test]
    fn back_to_back_sessions_stay_contiguous() {
        let segments = TimelineBuilder::default().build_day(
            &[session(at(10, 0), at(11, 0)), session(at(11, 0), at(12, 0))],
            day(),
        );
        // Padding makes the two occupied stretches abut; no sliver of
        // vacancy appears between them.
        assert_partition(&segments);
        assert_eq!(
            segments
                .iter()
                .filter(|s| s.status == SeatStatus::Vacant)
                .count(),
            2
        );
    }

    #[test]
    fn sectors_group_by_label_in_order() {
        let builder = TimelineBuilder::default();
        let timeline = |label: &str| SeatDayTimeline {
            seat: SeatView {
                id: Uuid::new_v4(),
                label: label.to_string(),
                status: SeatStatus::Vacant,
            },
            segments: vec![],
        };
        let sectors = builder.group_by_sector(vec![
            timeline("B"),
            timeline("A"),
            timeline("B"),
        ]);
        assert_eq!(sectors.len(), 2);
        assert_eq!(sectors[0].label, "A");
        assert_eq!(sectors[1].label, "B");
        assert_eq!(sectors[1].seats.len(), 2);
    }

    proptest! {
        /// Any input set of sessions, overlapping or not, must yield a
        /// total gapless partition of the window.
        #[test]
        fn build_day_always_partitions_the_window(
            raw in prop::collection::vec((0i64..1100, 1i64..400), 0..20)
        ) {
            let base = day().and_time(NaiveTime::MIN).and_utc();
            let sessions: Vec<Session> = raw
                .into_iter()
                .map(|(offset, len)| {
                    let start = base + Duration::minutes(offset);
                    session(start, start + Duration::minutes(len))
                })
                .collect();

            let segments = TimelineBuilder::default().build_day(&sessions, day());
            assert_partition(&segments);
        }
    }
}
