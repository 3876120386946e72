use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Milliseconds on the business-local wall-clock timeline — the only time type.
pub type Ms = i64;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

/// Time range occupied by an existing, non-cancelled appointment.
pub type BookedInterval = Span;

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    /// Shared endpoints do not count as overlap.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains_instant(&self, t: Ms) -> bool {
        self.start <= t && t < self.end
    }
}

/// Open/close time-of-day for one staff member on one calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingWindow {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_working: bool,
}

// ── Datastore records ────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: Ulid,
    pub name: String,
    pub duration_minutes: u32,
    pub price_cents: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Staff,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffProfile {
    pub id: Ulid,
    pub email: String,
    pub full_name: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Stored working hours; at most one per (staff, date).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub id: Ulid,
    pub staff_id: Ulid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_working: bool,
}

impl Schedule {
    pub fn window(&self) -> WorkingWindow {
        WorkingWindow {
            date: self.date,
            start_time: self.start_time,
            end_time: self.end_time,
            is_working: self.is_working,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Paid,
    Cancelled,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Paid => "paid",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }

    pub fn occupies_time(&self) -> bool {
        !matches!(self, AppointmentStatus::Cancelled)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Ulid,
    pub staff_id: Ulid,
    pub service_id: Ulid,
    pub client_name: String,
    #[serde(default)]
    pub client_email: Option<String>,
    pub client_phone: String,
    pub start: Ms,
    pub end: Ms,
    pub status: AppointmentStatus,
    pub created_at: Ms,
}

impl Appointment {
    /// The interval this appointment blocks, or `None` if it is cancelled
    /// or its times are inverted.
    pub fn booked_interval(&self) -> Option<BookedInterval> {
        if !self.status.occupies_time() || self.start >= self.end {
            return None;
        }
        Some(Span::new(self.start, self.end))
    }
}

/// Slots offered on one date of the "nearest free slots" panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaySlots {
    pub date: NaiveDate,
    pub slots: Vec<NaiveTime>,
}
