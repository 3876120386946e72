use chrono::{NaiveDate, NaiveTime};
use ulid::Ulid;

use crate::limits::MAX_UPCOMING_DAYS;
use crate::model::*;
use crate::observability;
use crate::planner::{compute_slots, upcoming_slots};
use crate::store::Datastore;
use crate::timeline::{DAY_MS, anchor};

use super::{BookingError, BookingService};

/// `[day 00:00, next day 00:00)` on the local timeline.
pub(super) fn day_span(day: NaiveDate, days: u32) -> Span {
    let start = anchor(day, NaiveTime::MIN);
    Span::new(start, start + Ms::from(days.max(1)) * DAY_MS)
}

impl<S: Datastore> BookingService<S> {
    async fn service(&self, service_id: Ulid) -> Result<Service, BookingError> {
        Ok(self.store.get_service(service_id).await?)
    }

    async fn schedule(&self, staff_id: Ulid, day: NaiveDate) -> Result<Option<Schedule>, BookingError> {
        Ok(self.store.schedule_for(staff_id, day).await?)
    }

    async fn schedules(&self, staff_id: Ulid) -> Result<Vec<Schedule>, BookingError> {
        Ok(self.store.schedules_for_staff(staff_id).await?)
    }

    async fn booked_in(&self, staff_id: Ulid, span: Span) -> Result<Vec<BookedInterval>, BookingError> {
        let appointments = self.store.appointments_between(staff_id, span).await?;
        Ok(appointments
            .iter()
            .filter_map(Appointment::booked_interval)
            .collect())
    }

    /// Intervals held by non-cancelled appointments of `staff_id` on `day`.
    pub async fn booked_intervals(&self, staff_id: Ulid, day: NaiveDate) -> Result<Vec<BookedInterval>, BookingError> {
        self.booked_in(staff_id, day_span(day, 1)).await
    }

    /// Fetch everything one day's plan needs and run the planner.
    pub(super) async fn plan_day(
        &self,
        staff_id: Ulid,
        service_id: Ulid,
        day: NaiveDate,
        now: Ms,
    ) -> Result<(Service, Vec<NaiveTime>), BookingError> {
        let (service, schedule, booked) = futures::try_join!(
            self.service(service_id),
            self.schedule(staff_id, day),
            self.booked_intervals(staff_id, day),
        )?;
        let window = schedule.map(|s| s.window());
        let slots = compute_slots(
            day,
            window.as_ref(),
            &booked,
            service.duration_minutes,
            self.settings.step_minutes,
            now,
        );
        metrics::counter!(observability::SLOT_QUERIES_TOTAL).increment(1);
        metrics::counter!(observability::SLOTS_OFFERED_TOTAL).increment(slots.len() as u64);
        Ok((service, slots))
    }

    /// Start times a client may pick for `service_id` with `staff_id` on `day`.
    pub async fn available_slots(
        &self,
        staff_id: Ulid,
        service_id: Ulid,
        day: NaiveDate,
        now: Ms,
    ) -> Result<Vec<NaiveTime>, BookingError> {
        let (_, slots) = self.plan_day(staff_id, service_id, day, now).await?;
        Ok(slots)
    }

    /// The "nearest free slots" panel starting at `from_day`, covering at
    /// most `MAX_UPCOMING_DAYS` dates.
    pub async fn upcoming_slots(
        &self,
        staff_id: Ulid,
        service_id: Ulid,
        from_day: NaiveDate,
        now: Ms,
    ) -> Result<Vec<DaySlots>, BookingError> {
        let days = self.settings.upcoming_days.min(MAX_UPCOMING_DAYS);
        let span = day_span(from_day, days);
        let (service, schedules, booked) = futures::try_join!(
            self.service(service_id),
            self.schedules(staff_id),
            self.booked_in(staff_id, span),
        )?;
        let windows: Vec<WorkingWindow> = schedules.iter().map(Schedule::window).collect();
        Ok(upcoming_slots(
            from_day,
            days,
            &windows,
            &booked,
            service.duration_minutes,
            self.settings.step_minutes,
            now,
            self.settings.upcoming_per_day,
        ))
    }
}
