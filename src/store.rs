use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;
use ulid::Ulid;

use crate::model::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    NotFound(Ulid),
    /// The write would double-book: carries the id of the appointment in the way.
    Conflict(Ulid),
    Backend(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound(id) => write!(f, "not found: {id}"),
            StoreError::Conflict(id) => write!(f, "conflict with appointment: {id}"),
            StoreError::Backend(e) => write!(f, "datastore error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// The external datastore: four record collections behind read/insert/update
/// queries. Implementations own consistency, including refusing overlapping
/// bookings.
#[async_trait]
pub trait Datastore: Send + Sync {
    // services
    async fn list_services(&self) -> Result<Vec<Service>, StoreError>;
    async fn get_service(&self, id: Ulid) -> Result<Service, StoreError>;
    async fn insert_service(&self, service: Service) -> Result<(), StoreError>;
    async fn delete_service(&self, id: Ulid) -> Result<(), StoreError>;

    // staff
    async fn list_staff(&self) -> Result<Vec<StaffProfile>, StoreError>;
    async fn get_staff(&self, id: Ulid) -> Result<StaffProfile, StoreError>;

    // schedules
    async fn schedules_for_staff(&self, staff_id: Ulid) -> Result<Vec<Schedule>, StoreError>;
    async fn schedule_for(&self, staff_id: Ulid, date: NaiveDate) -> Result<Option<Schedule>, StoreError>;
    /// Insert, or replace the existing schedule for the same (staff, date).
    async fn upsert_schedule(&self, schedule: Schedule) -> Result<(), StoreError>;

    // appointments
    /// Appointments of any status overlapping `span`, ordered by start.
    async fn appointments_between(&self, staff_id: Ulid, span: Span) -> Result<Vec<Appointment>, StoreError>;
    async fn get_appointment(&self, id: Ulid) -> Result<Appointment, StoreError>;
    async fn insert_appointment(&self, appointment: Appointment) -> Result<(), StoreError>;
    async fn set_appointment_status(&self, id: Ulid, status: AppointmentStatus) -> Result<(), StoreError>;
}

/// Seed document accepted by [`InMemoryStore::from_seed`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Seed {
    #[serde(default)]
    pub services: Vec<Service>,
    #[serde(default)]
    pub staff: Vec<StaffProfile>,
    #[serde(default)]
    pub schedules: Vec<Schedule>,
    #[serde(default)]
    pub appointments: Vec<Appointment>,
}

pub struct InMemoryStore {
    services: DashMap<Ulid, Service>,
    staff: DashMap<Ulid, StaffProfile>,
    schedules: DashMap<(Ulid, NaiveDate), Schedule>,
    /// staff id → appointments sorted by start.
    appointments: DashMap<Ulid, Vec<Appointment>>,
    /// Reverse lookup: appointment id → staff id
    appointment_owner: DashMap<Ulid, Ulid>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            services: DashMap::new(),
            staff: DashMap::new(),
            schedules: DashMap::new(),
            appointments: DashMap::new(),
            appointment_owner: DashMap::new(),
        }
    }

    /// Load a seed as-is; seeded appointments bypass the overlap check.
    pub fn from_seed(seed: Seed) -> Self {
        let store = Self::new();
        for s in seed.services {
            store.services.insert(s.id, s);
        }
        for p in seed.staff {
            store.staff.insert(p.id, p);
        }
        for s in seed.schedules {
            store.schedules.insert((s.staff_id, s.date), s);
        }
        for a in seed.appointments {
            store.push_appointment(a);
        }
        store
    }

    pub fn add_staff(&self, profile: StaffProfile) {
        self.staff.insert(profile.id, profile);
    }

    /// First appointment in `list` other than `skip` whose booked time overlaps `span`.
    fn clash(list: &[Appointment], span: &Span, skip: Option<Ulid>) -> Option<Ulid> {
        list.iter()
            .filter(|a| Some(a.id) != skip)
            .find(|a| a.booked_interval().is_some_and(|s| s.overlaps(span)))
            .map(|a| a.id)
    }

    fn push_appointment(&self, appointment: Appointment) {
        self.appointment_owner.insert(appointment.id, appointment.staff_id);
        let mut list = self.appointments.entry(appointment.staff_id).or_default();
        let pos = list.partition_point(|a| a.start <= appointment.start);
        list.insert(pos, appointment);
    }
}

#[async_trait]
impl Datastore for InMemoryStore {
    async fn list_services(&self) -> Result<Vec<Service>, StoreError> {
        let mut all: Vec<Service> = self.services.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }

    async fn get_service(&self, id: Ulid) -> Result<Service, StoreError> {
        self.services
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or(StoreError::NotFound(id))
    }

    async fn insert_service(&self, service: Service) -> Result<(), StoreError> {
        self.services.insert(service.id, service);
        Ok(())
    }

    async fn delete_service(&self, id: Ulid) -> Result<(), StoreError> {
        self.services
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(id))
    }

    async fn list_staff(&self) -> Result<Vec<StaffProfile>, StoreError> {
        let mut all: Vec<StaffProfile> = self.staff.iter().map(|e| e.value().clone()).collect();
        all.sort_by_key(|p| p.id);
        Ok(all)
    }

    async fn get_staff(&self, id: Ulid) -> Result<StaffProfile, StoreError> {
        self.staff
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or(StoreError::NotFound(id))
    }

    async fn schedules_for_staff(&self, staff_id: Ulid) -> Result<Vec<Schedule>, StoreError> {
        let mut all: Vec<Schedule> = self
            .schedules
            .iter()
            .filter(|e| e.key().0 == staff_id)
            .map(|e| e.value().clone())
            .collect();
        all.sort_by_key(|s| s.date);
        Ok(all)
    }

    async fn schedule_for(&self, staff_id: Ulid, date: NaiveDate) -> Result<Option<Schedule>, StoreError> {
        Ok(self.schedules.get(&(staff_id, date)).map(|e| e.value().clone()))
    }

    async fn upsert_schedule(&self, schedule: Schedule) -> Result<(), StoreError> {
        if !self.staff.contains_key(&schedule.staff_id) {
            return Err(StoreError::NotFound(schedule.staff_id));
        }
        self.schedules.insert((schedule.staff_id, schedule.date), schedule);
        Ok(())
    }

    async fn appointments_between(&self, staff_id: Ulid, span: Span) -> Result<Vec<Appointment>, StoreError> {
        let Some(list) = self.appointments.get(&staff_id) else {
            return Ok(Vec::new());
        };
        // Everything at index >= right_bound starts at or after span.end → can't overlap.
        let right_bound = list.partition_point(|a| a.start < span.end);
        Ok(list[..right_bound]
            .iter()
            .filter(|a| a.end > span.start)
            .cloned()
            .collect())
    }

    async fn get_appointment(&self, id: Ulid) -> Result<Appointment, StoreError> {
        let staff_id = *self
            .appointment_owner
            .get(&id)
            .ok_or(StoreError::NotFound(id))?;
        self.appointments
            .get(&staff_id)
            .and_then(|list| list.iter().find(|a| a.id == id).cloned())
            .ok_or(StoreError::NotFound(id))
    }

    async fn insert_appointment(&self, appointment: Appointment) -> Result<(), StoreError> {
        if appointment.start >= appointment.end {
            return Err(StoreError::Backend("appointment must end after it starts".into()));
        }
        let mut list = self.appointments.entry(appointment.staff_id).or_default();
        if let Some(new_span) = appointment.booked_interval()
            && let Some(clash) = Self::clash(&list, &new_span, None)
        {
            return Err(StoreError::Conflict(clash));
        }
        debug!(id = %appointment.id, staff = %appointment.staff_id, "appointment stored");
        self.appointment_owner.insert(appointment.id, appointment.staff_id);
        let pos = list.partition_point(|a| a.start <= appointment.start);
        list.insert(pos, appointment);
        Ok(())
    }

    async fn set_appointment_status(&self, id: Ulid, status: AppointmentStatus) -> Result<(), StoreError> {
        let staff_id = *self
            .appointment_owner
            .get(&id)
            .ok_or(StoreError::NotFound(id))?;
        let mut list = self
            .appointments
            .get_mut(&staff_id)
            .ok_or(StoreError::NotFound(id))?;
        let idx = list
            .iter()
            .position(|a| a.id == id)
            .ok_or(StoreError::NotFound(id))?;
        // Reactivating a cancelled appointment takes its time back.
        if status.occupies_time() && !list[idx].status.occupies_time() {
            let revived = Appointment {
                status,
                ..list[idx].clone()
            };
            if let Some(span) = revived.booked_interval()
                && let Some(clash) = Self::clash(&list, &span, Some(id))
            {
                return Err(StoreError::Conflict(clash));
            }
        }
        list[idx].status = status;
        Ok(())
    }
}
