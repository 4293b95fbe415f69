use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use scheduling_cell::clock::ManualClock;
use scheduling_cell::models::{
    AppointmentPriority, AppointmentStatus, BookAppointmentRequest, CancelAppointmentRequest,
    CancelledBy, JoinWaitlistRequest, ServiceType, SlotSpec,
};
use scheduling_cell::services::notify::{RecordingNotifier, SchedulingEvent};
use scheduling_cell::{SchedulingError, SchedulingState};
use shared_config::AppConfig;

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
}

fn other_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 2).unwrap()
}

fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn instant(h: u32, m: u32) -> DateTime<Utc> {
    date().and_time(time(h, m)).and_utc()
}

fn harness() -> (SchedulingState, Arc<ManualClock>, Arc<RecordingNotifier>) {
    let clock = Arc::new(ManualClock::new(instant(0, 0)));
    let notifier = Arc::new(RecordingNotifier::default());
    let state = SchedulingState::with_dependencies(
        &AppConfig::default(),
        Arc::clone(&clock) as _,
        Arc::clone(&notifier) as _,
    );
    (state, clock, notifier)
}

fn spec(start: &str, end: &str, capacity: u32) -> SlotSpec {
    SlotSpec {
        start_time: start.to_string(),
        end_time: end.to_string(),
        capacity,
        service_type: ServiceType::Regular,
        price: None,
    }
}

fn book_request(patient_id: Uuid, start: NaiveTime) -> BookAppointmentRequest {
    BookAppointmentRequest {
        patient_id,
        facility_id: "F1".to_string(),
        date: date(),
        start_time: start,
        priority: AppointmentPriority::Routine,
        notes: None,
    }
}

fn join_request(patient_id: Uuid, dates: Vec<NaiveDate>) -> JoinWaitlistRequest {
    JoinWaitlistRequest {
        patient_id,
        facility_id: "F1".to_string(),
        service_type: ServiceType::Regular,
        acceptable_dates: dates,
        priority: None,
    }
}

#[tokio::test]
async fn enqueue_requires_acceptable_dates() {
    let (state, _clock, _notifier) = harness();
    let result = state.waitlist.enqueue(join_request(Uuid::new_v4(), vec![])).await;
    assert_matches!(result, Err(SchedulingError::ValidationError(_)));
}

#[tokio::test]
async fn freed_capacity_converts_entries_in_fifo_order() {
    let (state, clock, _notifier) = harness();
    state
        .calendar
        .create_day("F1", date(), vec![spec("09:00", "09:30", 1)])
        .await
        .unwrap();

    // Fill the slot, then queue three requests in order.
    let holder = state
        .coordinator
        .book(book_request(Uuid::new_v4(), time(9, 0)))
        .await
        .unwrap();

    let (patient_a, patient_b, patient_c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    state.waitlist.enqueue(join_request(patient_a, vec![date()])).await.unwrap();
    clock.advance(chrono::Duration::seconds(1));
    state.waitlist.enqueue(join_request(patient_b, vec![date()])).await.unwrap();
    clock.advance(chrono::Duration::seconds(1));
    state.waitlist.enqueue(join_request(patient_c, vec![date()])).await.unwrap();

    state
        .coordinator
        .cancel(
            holder.id,
            CancelAppointmentRequest {
                reason: "conflict".to_string(),
                cancelled_by: CancelledBy::Patient,
            },
        )
        .await
        .unwrap();

    let converted = state
        .waitlist
        .notify_capacity_freed("F1", date(), ServiceType::Regular)
        .await
        .unwrap()
        .expect("first entry should convert");
    assert_eq!(converted.patient_id, patient_a);
    assert_eq!(converted.status, AppointmentStatus::Scheduled);

    // One conversion per freed unit: the slot is full again, B and C wait.
    let second = state
        .waitlist
        .notify_capacity_freed("F1", date(), ServiceType::Regular)
        .await
        .unwrap();
    assert!(second.is_none());
}

#[tokio::test]
async fn entry_whose_dates_no_longer_match_is_skipped() {
    let (state, clock, _notifier) = harness();
    state
        .calendar
        .create_day("F1", date(), vec![spec("09:00", "09:30", 1)])
        .await
        .unwrap();

    // A only accepts tomorrow; B accepts the freed date.
    let (patient_a, patient_b) = (Uuid::new_v4(), Uuid::new_v4());
    state
        .waitlist
        .enqueue(join_request(patient_a, vec![other_date()]))
        .await
        .unwrap();
    clock.advance(chrono::Duration::seconds(1));
    state
        .waitlist
        .enqueue(join_request(patient_b, vec![date(), other_date()]))
        .await
        .unwrap();

    let converted = state
        .waitlist
        .notify_capacity_freed("F1", date(), ServiceType::Regular)
        .await
        .unwrap()
        .expect("B should convert");
    assert_eq!(converted.patient_id, patient_b);
}

#[tokio::test]
async fn service_type_mismatch_is_not_converted() {
    let (state, _clock, _notifier) = harness();
    state
        .calendar
        .create_day("F1", date(), vec![spec("09:00", "09:30", 1)])
        .await
        .unwrap();

    let mut urgent = join_request(Uuid::new_v4(), vec![date()]);
    urgent.service_type = ServiceType::Urgent;
    state.waitlist.enqueue(urgent).await.unwrap();

    let converted = state
        .waitlist
        .notify_capacity_freed("F1", date(), ServiceType::Regular)
        .await
        .unwrap();
    assert!(converted.is_none());
}

#[tokio::test]
async fn withdraw_is_idempotent() {
    let (state, _clock, _notifier) = harness();
    let entry = state
        .waitlist
        .enqueue(join_request(Uuid::new_v4(), vec![date()]))
        .await
        .unwrap();

    assert!(state.waitlist.withdraw(entry.id).await.unwrap());
    assert!(!state.waitlist.withdraw(entry.id).await.unwrap());
    assert!(!state.waitlist.withdraw(Uuid::new_v4()).await.unwrap());
}

#[tokio::test]
async fn conversion_dispatches_waitlist_matched_event() {
    let (state, _clock, notifier) = harness();
    state
        .calendar
        .create_day("F1", date(), vec![spec("09:00", "09:30", 1)])
        .await
        .unwrap();

    let patient = Uuid::new_v4();
    let entry = state.waitlist.enqueue(join_request(patient, vec![date()])).await.unwrap();

    let converted = state
        .waitlist
        .notify_capacity_freed("F1", date(), ServiceType::Regular)
        .await
        .unwrap()
        .unwrap();

    let events = notifier.events.lock().await;
    assert!(events.iter().any(|e| matches!(
        e,
        SchedulingEvent::WaitlistMatched { request_id, appointment_id, patient_id }
            if *request_id == entry.id
                && *appointment_id == converted.id
                && *patient_id == patient
    )));
}

/// The worked example from the scheduling scenario: capacity 2, three
/// patients, one cancellation handing the freed unit to the queue.
#[tokio::test]
async fn full_booking_cancellation_waitlist_cycle() {
    let (state, _clock, _notifier) = harness();
    state
        .calendar
        .create_day("F1", date(), vec![spec("09:00", "09:30", 2)])
        .await
        .unwrap();

    let (p1, p2, p3) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

    let a1 = state.coordinator.book(book_request(p1, time(9, 0))).await.unwrap();
    assert_eq!(a1.status, AppointmentStatus::Scheduled);
    state.coordinator.book(book_request(p2, time(9, 0))).await.unwrap();

    let slot = state.calendar.get_slot("F1", date(), time(9, 0)).await.unwrap();
    assert_eq!(slot.booked, 2);

    // P3 finds the slot full and joins the waitlist instead.
    assert_matches!(
        state.coordinator.book(book_request(p3, time(9, 0))).await,
        Err(SchedulingError::CapacityExceeded)
    );
    state.waitlist.enqueue(join_request(p3, vec![date()])).await.unwrap();

    // P1 cancels; the waitlist gets first refusal on the freed unit.
    let outcome = state
        .coordinator
        .cancel(
            a1.id,
            CancelAppointmentRequest {
                reason: "feeling better".to_string(),
                cancelled_by: CancelledBy::Patient,
            },
        )
        .await
        .unwrap();
    assert_eq!(outcome.appointment.status, AppointmentStatus::Cancelled);

    let converted = state
        .waitlist
        .notify_capacity_freed(
            &outcome.freed.facility_id,
            outcome.freed.date,
            outcome.freed.service_type,
        )
        .await
        .unwrap()
        .expect("P3 should be converted");
    assert_eq!(converted.patient_id, p3);
    assert_eq!(converted.status, AppointmentStatus::Scheduled);

    let slot = state.calendar.get_slot("F1", date(), time(9, 0)).await.unwrap();
    assert_eq!(slot.booked, 2);
}
