use chrono::{NaiveDate, NaiveTime};
use tracing::info;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::observability;
use crate::phone::{is_plausible, normalize_phone};
use crate::store::Datastore;
use crate::throttle::{self, BOOKING_KEY, SERVICE_CREATION_KEY, guard};
use crate::timeline::{MINUTE_MS, anchor, now_ms, parse_time_of_day};

use super::{BookingError, BookingService};

/// A client's booking form as submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingRequest {
    pub staff_id: Ulid,
    pub service_id: Ulid,
    pub date: NaiveDate,
    /// `HH:mm` label picked from the offered slots.
    pub slot: String,
    pub client_name: String,
    pub client_phone: String,
    pub client_email: Option<String>,
}

fn outcome_label(result: &Result<Appointment, BookingError>) -> &'static str {
    match result {
        Ok(_) => "pending",
        Err(BookingError::Throttled { .. }) => "throttled",
        Err(BookingError::SlotUnavailable) => "unavailable",
        Err(_) => "rejected",
    }
}

impl<S: Datastore> BookingService<S> {
    /// Submit a booking behind the booking throttle.
    ///
    /// `now` is the local-timeline instant used to decide which slots are
    /// still in the future; throttle windows run on the wall clock.
    pub async fn submit_booking(&self, request: BookingRequest, now: Ms) -> Result<Appointment, BookingError> {
        let result = guard(&self.throttle, BOOKING_KEY, &throttle::BOOKING, now_ms(), || {
            self.place_booking(request, now)
        })
        .await;
        metrics::counter!(observability::BOOKINGS_TOTAL, "status" => outcome_label(&result)).increment(1);
        result
    }

    async fn place_booking(&self, request: BookingRequest, now: Ms) -> Result<Appointment, BookingError> {
        let client_name = request.client_name.trim();
        if client_name.is_empty() {
            return Err(BookingError::InvalidInput("client name is required"));
        }
        if client_name.chars().count() > MAX_CLIENT_NAME_LEN {
            return Err(BookingError::InvalidInput("client name too long"));
        }
        let client_phone = normalize_phone(&request.client_phone);
        if !is_plausible(&client_phone) {
            return Err(BookingError::InvalidInput("client phone is invalid"));
        }
        let slot = parse_time_of_day(&request.slot).ok_or(BookingError::InvalidInput("slot must be HH:mm"))?;

        // The list the client picked from may be stale.
        let (service, offered) = self
            .plan_day(request.staff_id, request.service_id, request.date, now)
            .await?;
        if !offered.contains(&slot) {
            return Err(BookingError::SlotUnavailable);
        }

        let start = anchor(request.date, slot);
        let appointment = Appointment {
            id: Ulid::new(),
            staff_id: request.staff_id,
            service_id: service.id,
            client_name: client_name.to_string(),
            client_email: request.client_email.filter(|e| !e.trim().is_empty()),
            client_phone,
            start,
            end: start + Ms::from(service.duration_minutes) * MINUTE_MS,
            status: AppointmentStatus::Pending,
            created_at: now,
        };
        self.store.insert_appointment(appointment.clone()).await?;
        info!(
            id = %appointment.id,
            staff = %appointment.staff_id,
            date = %request.date,
            slot = %request.slot,
            "booking placed"
        );
        Ok(appointment)
    }

    pub async fn cancel_appointment(&self, id: Ulid) -> Result<(), BookingError> {
        let appointment = self.store.get_appointment(id).await?;
        if appointment.status == AppointmentStatus::Cancelled {
            return Ok(());
        }
        self.store
            .set_appointment_status(id, AppointmentStatus::Cancelled)
            .await?;
        info!(%id, "appointment cancelled");
        Ok(())
    }

    /// Moving a cancelled appointment back to a live status fails with
    /// `SlotUnavailable` if its time has been booked since.
    pub async fn set_appointment_status(&self, id: Ulid, status: AppointmentStatus) -> Result<(), BookingError> {
        self.store.set_appointment_status(id, status).await?;
        info!(%id, status = status.as_str(), "appointment status changed");
        Ok(())
    }

    /// Add a service behind the service-creation throttle.
    pub async fn create_service(
        &self,
        name: &str,
        duration_minutes: u32,
        price_cents: u32,
    ) -> Result<Service, BookingError> {
        guard(
            &self.throttle,
            SERVICE_CREATION_KEY,
            &throttle::SERVICE_CREATION,
            now_ms(),
            || async move {
                let name = name.trim();
                if name.is_empty() {
                    return Err(BookingError::InvalidInput("service name is required"));
                }
                if name.chars().count() > MAX_SERVICE_NAME_LEN {
                    return Err(BookingError::InvalidInput("service name too long"));
                }
                if !(1..=MAX_SERVICE_DURATION_MINUTES).contains(&duration_minutes) {
                    return Err(BookingError::InvalidInput("service duration out of range"));
                }
                let service = Service {
                    id: Ulid::new(),
                    name: name.to_string(),
                    duration_minutes,
                    price_cents,
                };
                self.store.insert_service(service.clone()).await?;
                info!(id = %service.id, name = %service.name, "service created");
                Ok(service)
            },
        )
        .await
    }

    pub async fn delete_service(&self, id: Ulid) -> Result<(), BookingError> {
        self.store.delete_service(id).await?;
        info!(%id, "service deleted");
        Ok(())
    }

    /// Open `staff_id` on `date` from `start` to `end` (`HH:mm` or `HH:mm:ss`).
    ///
    /// The planner assumes `start < end`; this is where that is enforced.
    pub async fn set_working_hours(
        &self,
        staff_id: Ulid,
        date: NaiveDate,
        start: &str,
        end: &str,
    ) -> Result<Schedule, BookingError> {
        let start_time = parse_time_of_day(start).ok_or(BookingError::InvalidInput("start time must be HH:mm"))?;
        let end_time = parse_time_of_day(end).ok_or(BookingError::InvalidInput("end time must be HH:mm"))?;
        if start_time >= end_time {
            return Err(BookingError::InvalidInput("working hours must start before they end"));
        }
        self.write_schedule(staff_id, date, start_time, end_time, true).await
    }

    /// Mark `staff_id` as not working on `date`.
    pub async fn set_day_off(&self, staff_id: Ulid, date: NaiveDate) -> Result<Schedule, BookingError> {
        let (start_time, end_time) = match self.store.schedule_for(staff_id, date).await? {
            Some(existing) => (existing.start_time, existing.end_time),
            None => (NaiveTime::MIN, NaiveTime::MIN),
        };
        self.write_schedule(staff_id, date, start_time, end_time, false).await
    }

    async fn write_schedule(
        &self,
        staff_id: Ulid,
        date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
        is_working: bool,
    ) -> Result<Schedule, BookingError> {
        let id = self
            .store
            .schedule_for(staff_id, date)
            .await?
            .map_or_else(Ulid::new, |s| s.id);
        let schedule = Schedule {
            id,
            staff_id,
            date,
            start_time,
            end_time,
            is_working,
        };
        self.store.upsert_schedule(schedule.clone()).await?;
        info!(staff = %staff_id, %date, is_working, "schedule saved");
        Ok(schedule)
    }
}
