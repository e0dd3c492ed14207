use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use std::sync::Arc;
use uuid::Uuid;

use perch_core::clock::ManualClock;
use perch_core::token::TokenMinter;
use perch_domain::{Seat, SeatStatus, SessionStatus};
use perch_reserve::{ReservationError, ReservationPolicy, ReservationService};
use perch_store::MemoryStore;

const KEY: [u8; 32] = [42u8; 32];

fn at(hour: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, hour, min, 0).unwrap()
}

struct Harness {
    service: ReservationService,
    store: Arc<MemoryStore>,
    clock: Arc<ManualClock>,
    store_id: Uuid,
}

impl Harness {
    fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(at(8, 0)));
        let service = ReservationService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            TokenMinter::new(&KEY).unwrap(),
            clock.clone(),
            ReservationPolicy::default(),
        );
        Self {
            service,
            store,
            clock,
            store_id: Uuid::new_v4(),
        }
    }

    fn add_seat(&self, label: &str) -> Uuid {
        let seat = Seat::new(self.store_id, label);
        let id = seat.id;
        self.store.add_seat(seat);
        id
    }

    /// A registered user holding 1000 credit.
    fn user(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.store.set_credit(id, 1000);
        id
    }
}

#[tokio::test]
async fn overlapping_seat_booking_is_rejected_adjacent_is_not() {
    let h = Harness::new();
    let seat = h.add_seat("A1");

    // Seat has a Valid session [10:00, 11:10).
    h.service
        .request_reservation(h.user(), seat, at(10, 0), Some(at(11, 10)))
        .await
        .unwrap();

    // [10:30, 11:30) overlaps and is rejected with the seat reason.
    let err = h
        .service
        .request_reservation(h.user(), seat, at(10, 30), Some(at(11, 30)))
        .await
        .unwrap_err();
    assert!(matches!(err, ReservationError::SeatBusy));
    assert!(err.is_user_error());

    // Admission applies no buffer padding: [11:10, 12:10) shares an
    // endpoint with the existing booking and is accepted.
    h.service
        .request_reservation(h.user(), seat, at(11, 10), Some(at(12, 10)))
        .await
        .unwrap();
}

#[tokio::test]
async fn user_cannot_double_book_across_seats() {
    let h = Harness::new();
    let seat_a = h.add_seat("A1");
    let seat_b = h.add_seat("A2");
    let user = h.user();

    h.service
        .request_reservation(user, seat_a, at(9, 0), Some(at(10, 0)))
        .await
        .unwrap();

    let err = h
        .service
        .request_reservation(user, seat_b, at(9, 30), Some(at(10, 30)))
        .await
        .unwrap_err();
    assert!(matches!(err, ReservationError::UserBusy));
}

#[tokio::test]
async fn missing_end_time_gets_the_default_duration() {
    let h = Harness::new();
    let seat = h.add_seat("A1");

    h.service
        .request_reservation(h.user(), seat, at(10, 0), None)
        .await
        .unwrap();

    // The implied end is 11:10; a booking at 11:00 still conflicts.
    let err = h
        .service
        .request_reservation(h.user(), seat, at(11, 0), Some(at(12, 0)))
        .await
        .unwrap_err();
    assert!(matches!(err, ReservationError::SeatBusy));
}

#[tokio::test]
async fn inverted_slot_is_rejected_before_any_storage_call() {
    let h = Harness::new();
    let seat = h.add_seat("A1");

    let err = h
        .service
        .request_reservation(h.user(), seat, at(10, 0), Some(at(9, 0)))
        .await
        .unwrap_err();
    assert!(matches!(err, ReservationError::InvalidSlot(_)));
    assert_eq!(h.store.session_count(), 0);
}

#[tokio::test]
async fn unknown_seat_and_unknown_token_are_user_errors() {
    let h = Harness::new();

    let err = h
        .service
        .request_reservation(h.user(), Uuid::new_v4(), at(10, 0), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ReservationError::SeatNotFound));

    let err = h.service.cancel("no-such-token").await.unwrap_err();
    assert!(matches!(err, ReservationError::NotFound));
}

#[tokio::test]
async fn unregistered_user_cannot_book() {
    let h = Harness::new();
    let seat = h.add_seat("A1");

    let err = h
        .service
        .request_reservation(Uuid::new_v4(), seat, at(10, 0), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ReservationError::UserNotFound(_)));
    assert!(err.is_user_error());
    assert_eq!(h.store.session_count(), 0);
}

#[tokio::test]
async fn checkout_finalizes_once_and_debits_once() {
    let h = Harness::new();
    let seat = h.add_seat("A1");
    let user = h.user();

    let token = h
        .service
        .request_reservation(user, seat, at(10, 0), Some(at(11, 0)))
        .await
        .unwrap();

    h.clock.set(at(10, 50));
    h.service.checkout(&token, at(10, 50), 300).await.unwrap();
    assert_eq!(h.store.credit_of(user), 700);

    // Identical replay is harmless.
    h.service.checkout(&token, at(10, 50), 300).await.unwrap();
    assert_eq!(h.store.credit_of(user), 700);

    // Conflicting replay is surfaced and the stored fee stands.
    let err = h.service.checkout(&token, at(10, 55), 999).await.unwrap_err();
    assert!(matches!(err, ReservationError::AlreadyFinalized));
    assert_eq!(h.store.credit_of(user), 700);

    let history = h.service.user_history(user, 0).await.unwrap();
    assert_eq!(history[0].status, SessionStatus::Done);
    assert_eq!(history[0].billing_fee, Some(300));
    assert_eq!(history[0].actual_end_time, Some(at(10, 50)));
}

#[tokio::test]
async fn cancel_only_before_start() {
    let h = Harness::new();
    let seat = h.add_seat("A1");

    let token = h
        .service
        .request_reservation(h.user(), seat, at(10, 0), Some(at(11, 0)))
        .await
        .unwrap();
    h.clock.set(at(10, 1));
    let err = h.service.cancel(&token).await.unwrap_err();
    assert!(matches!(err, ReservationError::TooLate));

    h.clock.set(at(9, 0));
    h.service.cancel(&token).await.unwrap();

    // A cancelled slot frees the seat for someone else.
    h.service
        .request_reservation(h.user(), seat, at(10, 0), Some(at(11, 0)))
        .await
        .unwrap();
}

#[tokio::test]
async fn checked_in_session_cannot_cancel_but_can_checkout() {
    let h = Harness::new();
    let seat = h.add_seat("A1");

    let token = h
        .service
        .request_reservation(h.user(), seat, at(10, 0), Some(at(11, 0)))
        .await
        .unwrap();

    h.clock.set(at(10, 5));
    h.service.check_in(&token).await.unwrap();

    let err = h.service.cancel(&token).await.unwrap_err();
    assert!(matches!(err, ReservationError::TooLate | ReservationError::Transition(_)));

    h.clock.set(at(10, 45));
    h.service.checkout(&token, at(10, 45), 200).await.unwrap();
}

#[tokio::test]
async fn history_sweeps_stale_valid_rows_first() {
    let h = Harness::new();
    let seat = h.add_seat("A1");
    let user = h.user();

    h.service
        .request_reservation(user, seat, at(9, 0), Some(at(10, 0)))
        .await
        .unwrap();

    h.clock.set(at(12, 0));
    let history = h.service.user_history(user, 0).await.unwrap();
    assert_eq!(history[0].status, SessionStatus::Expired);

    // Sweeping again changes nothing.
    assert_eq!(h.service.expire_overdue().await.unwrap(), 0);
    let history = h.service.user_history(user, 0).await.unwrap();
    assert_eq!(history[0].status, SessionStatus::Expired);
}

#[tokio::test]
async fn history_is_newest_first_and_paginated() {
    let h = Harness::new();
    let seat = h.add_seat("A1");
    let user = h.user();

    for hour in [9, 11, 13] {
        h.service
            .request_reservation(user, seat, at(hour, 0), Some(at(hour + 1, 0)))
            .await
            .unwrap();
    }

    let history = h.service.user_history(user, 0).await.unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].start_time, at(13, 0));
    assert_eq!(history[2].start_time, at(9, 0));
}

#[tokio::test]
async fn seat_cached_status_follows_live_sessions() {
    let h = Harness::new();
    let seat = h.add_seat("A1");

    h.clock.set(at(10, 30));
    let token = h
        .service
        .request_reservation(h.user(), seat, at(10, 0), Some(at(11, 0)))
        .await
        .unwrap();
    // The booking covers `now`, so the cache flips to occupied.
    let stored = perch_core::repository::SeatStore::seat(&*h.store, seat)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.current_status, SeatStatus::Occupied);

    h.service.checkout(&token, at(10, 45), 100).await.unwrap();
    let stored = perch_core::repository::SeatStore::seat(&*h.store, seat)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.current_status, SeatStatus::Vacant);
}

#[tokio::test]
async fn check_in_issues_a_reusable_door_code() {
    let h = Harness::new();
    let seat = h.add_seat("A1");

    let token = h
        .service
        .request_reservation(h.user(), seat, at(10, 0), Some(at(11, 0)))
        .await
        .unwrap();

    h.clock.set(at(10, 0));
    let nonce = h.service.check_in(&token).await.unwrap();
    assert_eq!(nonce.code.len(), 4);

    // Asking again within the TTL returns the same live code.
    let again = h.service.door_nonce(&token).await.unwrap();
    assert_eq!(nonce.code, again.code);
}

#[tokio::test]
async fn door_code_refused_for_finished_sessions() {
    let h = Harness::new();
    let seat = h.add_seat("A1");

    let token = h
        .service
        .request_reservation(h.user(), seat, at(10, 0), Some(at(11, 0)))
        .await
        .unwrap();
    h.clock.set(at(10, 45));
    h.service.checkout(&token, at(10, 45), 100).await.unwrap();

    let err = h.service.door_nonce(&token).await.unwrap_err();
    assert!(matches!(err, ReservationError::Transition(_)));
}

#[tokio::test]
async fn store_timeline_groups_seats_into_sectors() {
    let h = Harness::new();
    let window_a1 = h.add_seat("A");
    let _window_a2 = h.add_seat("A");
    let _quiet = h.add_seat("B");
    let day = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();

    h.service
        .request_reservation(h.user(), window_a1, at(10, 0), Some(at(11, 0)))
        .await
        .unwrap();

    let sectors = h.service.store_timeline(h.store_id, day).await.unwrap();
    assert_eq!(sectors.len(), 2);
    assert_eq!(sectors[0].label, "A");
    assert_eq!(sectors[0].seats.len(), 2);
    assert_eq!(sectors[1].label, "B");

    // Every seat timeline tiles the whole window.
    for sector in &sectors {
        for seat in &sector.seats {
            let segments = &seat.segments;
            assert_eq!(segments[0].slot.start, at(8, 0));
            assert_eq!(
                segments[segments.len() - 1].slot.end,
                at(8, 0) + Duration::hours(16)
            );
            for pair in segments.windows(2) {
                assert_eq!(pair[0].slot.end, pair[1].slot.start);
            }
        }
    }
}

#[tokio::test]
async fn seat_timeline_reflects_cancellations() {
    let h = Harness::new();
    let seat = h.add_seat("A1");
    let day = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();

    let token = h
        .service
        .request_reservation(h.user(), seat, at(10, 0), Some(at(11, 0)))
        .await
        .unwrap();

    let segments = h.service.seat_timeline(seat, day).await.unwrap();
    assert_eq!(segments.len(), 3);

    h.service.cancel(&token).await.unwrap();
    let segments = h.service.seat_timeline(seat, day).await.unwrap();
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].status, SeatStatus::Vacant);
}
