use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use ulid::Ulid;

use super::*;
use crate::model::*;
use crate::planner::PlannerSettings;
use crate::store::{Datastore, InMemoryStore};
use crate::throttle::{AttemptThrottle, BOOKING_KEY};
use crate::timeline::{MINUTE_MS, anchor};

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 9, 7).unwrap()
}

fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn early() -> Ms {
    anchor(day(), hm(7, 0))
}

struct Fixture {
    svc: BookingService<InMemoryStore>,
    staff_id: Ulid,
    service_id: Ulid,
}

async fn fixture() -> Fixture {
    let store = Arc::new(InMemoryStore::new());
    let staff_id = Ulid::new();
    store.add_staff(StaffProfile {
        id: staff_id,
        email: "piotr@example.com".into(),
        full_name: Some("Piotr".into()),
        role: Role::Staff,
        avatar_url: None,
    });
    let service_id = Ulid::new();
    store
        .insert_service(Service {
            id: service_id,
            name: "Haircut".into(),
            duration_minutes: 45,
            price_cents: 8000,
        })
        .await
        .unwrap();

    let svc = BookingService::with_throttle(
        store,
        Arc::new(AttemptThrottle::new()),
        PlannerSettings::default(),
    );
    svc.set_working_hours(staff_id, day(), "09:00", "17:00")
        .await
        .unwrap();
    Fixture {
        svc,
        staff_id,
        service_id,
    }
}

fn request(f: &Fixture, slot: &str) -> BookingRequest {
    BookingRequest {
        staff_id: f.staff_id,
        service_id: f.service_id,
        date: day(),
        slot: slot.into(),
        client_name: "Jan Kowalski".into(),
        client_phone: "500 600 700".into(),
        client_email: None,
    }
}

async fn seed_appointment(f: &Fixture, start: NaiveTime, end: NaiveTime, status: AppointmentStatus) -> Ulid {
    let id = Ulid::new();
    f.svc
        .store()
        .insert_appointment(Appointment {
            id,
            staff_id: f.staff_id,
            service_id: f.service_id,
            client_name: "Ewa".into(),
            client_email: None,
            client_phone: "+48111222333".into(),
            start: anchor(day(), start),
            end: anchor(day(), end),
            status,
            created_at: 0,
        })
        .await
        .unwrap();
    id
}

// ── Queries ──────────────────────────────────────────────

#[tokio::test]
async fn slots_for_open_day() {
    let f = fixture().await;
    let slots = f
        .svc
        .available_slots(f.staff_id, f.service_id, day(), early())
        .await
        .unwrap();
    assert_eq!(slots.len(), 15);
    assert_eq!(slots.first(), Some(&hm(9, 0)));
    assert_eq!(slots.last(), Some(&hm(16, 0)));
}

#[tokio::test]
async fn day_without_schedule_is_empty() {
    let f = fixture().await;
    let tomorrow = day().succ_opt().unwrap();
    let slots = f
        .svc
        .available_slots(f.staff_id, f.service_id, tomorrow, early())
        .await
        .unwrap();
    assert!(slots.is_empty());
}

#[tokio::test]
async fn unknown_service_is_not_found() {
    let f = fixture().await;
    let ghost = Ulid::new();
    let err = f
        .svc
        .available_slots(f.staff_id, ghost, day(), early())
        .await
        .unwrap_err();
    assert_eq!(err, BookingError::NotFound(ghost));
}

#[tokio::test]
async fn cancelled_appointments_do_not_block() {
    let f = fixture().await;
    seed_appointment(&f, hm(10, 0), hm(10, 45), AppointmentStatus::Cancelled).await;
    seed_appointment(&f, hm(13, 0), hm(13, 45), AppointmentStatus::Confirmed).await;

    let booked = f.svc.booked_intervals(f.staff_id, day()).await.unwrap();
    assert_eq!(booked, vec![Span::new(anchor(day(), hm(13, 0)), anchor(day(), hm(13, 45)))]);

    let slots = f
        .svc
        .available_slots(f.staff_id, f.service_id, day(), early())
        .await
        .unwrap();
    assert!(slots.contains(&hm(10, 0)));
    assert!(!slots.contains(&hm(12, 30)));
    assert!(!slots.contains(&hm(13, 0)));
    assert!(!slots.contains(&hm(13, 30)));
    assert!(slots.contains(&hm(14, 0)));
}

#[tokio::test]
async fn upcoming_panel_covers_following_days() {
    let f = fixture().await;
    let d1 = day().succ_opt().unwrap();
    let d2 = d1.succ_opt().unwrap();
    f.svc.set_day_off(f.staff_id, d1).await.unwrap();
    f.svc
        .set_working_hours(f.staff_id, d2, "12:00", "15:00")
        .await
        .unwrap();
    f.svc
        .store()
        .insert_appointment(Appointment {
            id: Ulid::new(),
            staff_id: f.staff_id,
            service_id: f.service_id,
            client_name: "Ola".into(),
            client_email: None,
            client_phone: "+48999888777".into(),
            start: anchor(d2, hm(12, 0)),
            end: anchor(d2, hm(13, 0)),
            status: AppointmentStatus::Paid,
            created_at: 0,
        })
        .await
        .unwrap();

    let panel = f
        .svc
        .upcoming_slots(f.staff_id, f.service_id, day(), early())
        .await
        .unwrap();
    assert_eq!(panel.len(), 2);
    assert_eq!(panel[0].date, day());
    assert_eq!(panel[0].slots.len(), 5);
    assert_eq!(panel[1].date, d2);
    assert_eq!(panel[1].slots, vec![hm(13, 0), hm(13, 30), hm(14, 0)]);
}

// ── Booking submission ───────────────────────────────────

#[tokio::test]
async fn booking_places_pending_appointment() {
    let f = fixture().await;
    let apt = f
        .svc
        .submit_booking(request(&f, "10:30"), early())
        .await
        .unwrap();
    assert_eq!(apt.status, AppointmentStatus::Pending);
    assert_eq!(apt.client_phone, "+48500600700");
    assert_eq!(apt.start, anchor(day(), hm(10, 30)));
    assert_eq!(apt.end - apt.start, 45 * MINUTE_MS);
    assert_eq!(f.svc.store().get_appointment(apt.id).await.unwrap(), apt);

    let slots = f
        .svc
        .available_slots(f.staff_id, f.service_id, day(), early())
        .await
        .unwrap();
    assert!(!slots.contains(&hm(10, 0)));
    assert!(!slots.contains(&hm(10, 30)));
    assert!(slots.contains(&hm(9, 30)));
    assert!(!slots.contains(&hm(11, 0)));
    assert!(slots.contains(&hm(11, 30)));

    // success leaves no throttle record behind
    assert!(f.svc.throttle().record(BOOKING_KEY).is_none());
}

#[tokio::test]
async fn taken_slot_is_unavailable() {
    let f = fixture().await;
    seed_appointment(&f, hm(10, 0), hm(11, 0), AppointmentStatus::Confirmed).await;
    let err = f
        .svc
        .submit_booking(request(&f, "10:30"), early())
        .await
        .unwrap_err();
    assert_eq!(err, BookingError::SlotUnavailable);
}

#[tokio::test]
async fn off_grid_and_past_slots_are_unavailable() {
    let f = fixture().await;
    let err = f
        .svc
        .submit_booking(request(&f, "09:10"), early())
        .await
        .unwrap_err();
    assert_eq!(err, BookingError::SlotUnavailable);

    let noon = anchor(day(), hm(12, 0));
    let err = f
        .svc
        .submit_booking(request(&f, "11:30"), noon)
        .await
        .unwrap_err();
    assert_eq!(err, BookingError::SlotUnavailable);
}

#[tokio::test]
async fn invalid_forms_are_rejected() {
    let f = fixture().await;
    let mut r = request(&f, "10:00");
    r.client_name = "   ".into();
    assert_eq!(
        f.svc.submit_booking(r, early()).await,
        Err(BookingError::InvalidInput("client name is required"))
    );

    let mut r = request(&f, "10:00");
    r.client_phone = "12ab".into();
    assert_eq!(
        f.svc.submit_booking(r, early()).await,
        Err(BookingError::InvalidInput("client phone is invalid"))
    );

    let r = request(&f, "ten o'clock");
    assert_eq!(
        f.svc.submit_booking(r, early()).await,
        Err(BookingError::InvalidInput("slot must be HH:mm"))
    );
}

#[tokio::test]
async fn fourth_failed_attempt_is_throttled() {
    let f = fixture().await;
    for _ in 0..3 {
        let err = f
            .svc
            .submit_booking(request(&f, "09:10"), early())
            .await
            .unwrap_err();
        assert_eq!(err, BookingError::SlotUnavailable);
    }
    let err = f
        .svc
        .submit_booking(request(&f, "10:00"), early())
        .await
        .unwrap_err();
    assert_eq!(err, BookingError::Throttled { retry_after_secs: 300 });
    assert!(err.to_string().contains("300 seconds"));

    // a reset (e.g. by an admin) lifts the block
    f.svc.throttle().reset(BOOKING_KEY);
    f.svc
        .submit_booking(request(&f, "10:00"), early())
        .await
        .unwrap();
}

#[tokio::test]
async fn cancelling_frees_the_slot() {
    let f = fixture().await;
    let apt = f
        .svc
        .submit_booking(request(&f, "15:00"), early())
        .await
        .unwrap();
    f.svc.cancel_appointment(apt.id).await.unwrap();
    // cancelling twice is a no-op
    f.svc.cancel_appointment(apt.id).await.unwrap();
    assert_eq!(
        f.svc.store().get_appointment(apt.id).await.unwrap().status,
        AppointmentStatus::Cancelled
    );
    f.svc
        .submit_booking(request(&f, "15:00"), early())
        .await
        .unwrap();
}

#[tokio::test]
async fn cancel_unknown_is_not_found() {
    let f = fixture().await;
    let ghost = Ulid::new();
    assert_eq!(
        f.svc.cancel_appointment(ghost).await,
        Err(BookingError::NotFound(ghost))
    );
}

// ── Admin ────────────────────────────────────────────────

#[tokio::test]
async fn working_hours_must_be_ordered() {
    let f = fixture().await;
    let err = f
        .svc
        .set_working_hours(f.staff_id, day(), "17:00", "09:00")
        .await
        .unwrap_err();
    assert_eq!(
        err,
        BookingError::InvalidInput("working hours must start before they end")
    );
    assert!(
        f.svc
            .set_working_hours(f.staff_id, day(), "9am", "17:00")
            .await
            .is_err()
    );
}

#[tokio::test]
async fn day_off_closes_the_day_and_keeps_the_record() {
    let f = fixture().await;
    let before = f.svc.store().schedule_for(f.staff_id, day()).await.unwrap().unwrap();
    let after = f.svc.set_day_off(f.staff_id, day()).await.unwrap();
    assert_eq!(after.id, before.id);
    assert_eq!(after.start_time, hm(9, 0));
    assert!(!after.is_working);
    let slots = f
        .svc
        .available_slots(f.staff_id, f.service_id, day(), early())
        .await
        .unwrap();
    assert!(slots.is_empty());
}

#[tokio::test]
async fn service_creation_validates_and_throttles_without_block() {
    let f = fixture().await;
    let created = f.svc.create_service("Beard trim", 30, 4000).await.unwrap();
    assert_eq!(created.duration_minutes, 30);
    assert_eq!(f.svc.store().get_service(created.id).await.unwrap(), created);

    for _ in 0..10 {
        let err = f.svc.create_service("Marathon", 0, 1).await.unwrap_err();
        assert_eq!(err, BookingError::InvalidInput("service duration out of range"));
    }
    let err = f.svc.create_service("Shave", 20, 3000).await.unwrap_err();
    let BookingError::Throttled { retry_after_secs } = err else {
        panic!("expected throttling, got {err:?}");
    };
    // no block configured: the wait is what is left of the one-minute window
    assert!((1..=60).contains(&retry_after_secs), "{retry_after_secs}");
}

#[tokio::test]
async fn names_are_limited_in_characters() {
    let f = fixture().await;
    // 100 two-byte characters: over the limit in bytes, within it in characters
    let polish = "ż".repeat(100);
    let created = f.svc.create_service(&polish, 30, 4000).await.unwrap();
    assert_eq!(created.name, polish);

    let mut r = request(&f, "10:00");
    r.client_name = "Łucja Żółkiewska-Ślęzak ".repeat(5);
    assert!(r.client_name.len() > crate::limits::MAX_CLIENT_NAME_LEN);
    f.svc.submit_booking(r, early()).await.unwrap();

    let mut r = request(&f, "11:00");
    r.client_name = "ą".repeat(crate::limits::MAX_CLIENT_NAME_LEN + 1);
    assert_eq!(
        f.svc.submit_booking(r, early()).await,
        Err(BookingError::InvalidInput("client name too long"))
    );
}

#[tokio::test]
async fn service_deletion() {
    let f = fixture().await;
    f.svc.delete_service(f.service_id).await.unwrap();
    assert_eq!(
        f.svc.delete_service(f.service_id).await,
        Err(BookingError::NotFound(f.service_id))
    );
}

#[tokio::test]
async fn status_can_move_to_paid() {
    let f = fixture().await;
    let id = seed_appointment(&f, hm(9, 0), hm(9, 45), AppointmentStatus::Confirmed).await;
    f.svc
        .set_appointment_status(id, AppointmentStatus::Paid)
        .await
        .unwrap();
    assert_eq!(
        f.svc.store().get_appointment(id).await.unwrap().status,
        AppointmentStatus::Paid
    );
}

#[tokio::test]
async fn reactivating_over_a_rebooked_slot_is_unavailable() {
    let f = fixture().await;
    let first = f
        .svc
        .submit_booking(request(&f, "10:00"), early())
        .await
        .unwrap();
    f.svc.cancel_appointment(first.id).await.unwrap();
    f.svc
        .submit_booking(request(&f, "10:00"), early())
        .await
        .unwrap();

    assert_eq!(
        f.svc
            .set_appointment_status(first.id, AppointmentStatus::Confirmed)
            .await,
        Err(BookingError::SlotUnavailable)
    );
    assert_eq!(
        f.svc.store().get_appointment(first.id).await.unwrap().status,
        AppointmentStatus::Cancelled
    );
    assert_eq!(
        f.svc.booked_intervals(f.staff_id, day()).await.unwrap().len(),
        1
    );
}

#[tokio::test]
async fn upcoming_panel_is_bounded() {
    let f = fixture().await;
    let far = day() + chrono::Days::new(40);
    f.svc
        .set_working_hours(f.staff_id, far, "09:00", "17:00")
        .await
        .unwrap();
    let svc = BookingService::with_throttle(
        f.svc.store().clone(),
        Arc::new(AttemptThrottle::new()),
        PlannerSettings {
            upcoming_days: 365,
            ..PlannerSettings::default()
        },
    );
    let panel = svc
        .upcoming_slots(f.staff_id, f.service_id, day(), early())
        .await
        .unwrap();
    assert_eq!(panel.len(), 1);
    assert_eq!(panel[0].date, day());
}
