use chrono::{NaiveDate, NaiveTime};
use tracing::trace;

use crate::model::*;
use crate::timeline::{MINUTE_MS, anchor, format_hhmm, time_of};

pub const DEFAULT_STEP_MINUTES: u32 = 30;

/// How slot lists are produced for the booking flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannerSettings {
    pub step_minutes: u32,
    /// Consecutive dates covered by the "nearest free slots" panel.
    pub upcoming_days: u32,
    /// Slots shown per date in that panel.
    pub upcoming_per_day: usize,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            step_minutes: DEFAULT_STEP_MINUTES,
            upcoming_days: 5,
            upcoming_per_day: 5,
        }
    }
}

// ── Slot Algorithm ────────────────────────────────────────────────

/// Bookable start times for one staff member on `day`.
///
/// Walks a cursor from the window's opening time in `step_minutes` increments
/// while `cursor + duration <= closing time` (a slot ending exactly at closing
/// is valid). A candidate is kept when `[cursor, cursor + duration)` overlaps
/// no booked interval and `cursor >= now`.
///
/// Every degenerate input (no window, day off, inverted window, oversized
/// duration, zero duration or step) yields an empty list. Never reads the
/// clock.
pub fn compute_slots(
    day: NaiveDate,
    window: Option<&WorkingWindow>,
    booked: &[BookedInterval],
    duration_minutes: u32,
    step_minutes: u32,
    now: Ms,
) -> Vec<NaiveTime> {
    let Some(window) = window.filter(|w| w.is_working) else {
        return Vec::new();
    };
    if duration_minutes == 0 || step_minutes == 0 {
        return Vec::new();
    }

    let duration = Ms::from(duration_minutes) * MINUTE_MS;
    let step = Ms::from(step_minutes) * MINUTE_MS;
    let shift_start = anchor(day, window.start_time);
    let shift_end = anchor(day, window.end_time);

    // Only intervals touching the shift can collide with a candidate.
    let relevant: Vec<Span> = booked
        .iter()
        .filter(|b| b.start < b.end && b.start < shift_end && b.end > shift_start)
        .copied()
        .collect();

    let mut slots = Vec::new();
    let mut cursor = shift_start;
    while cursor + duration <= shift_end {
        let candidate = Span::new(cursor, cursor + duration);
        if cursor >= now && !relevant.iter().any(|b| candidate.overlaps(b)) {
            slots.push(time_of(cursor));
        }
        cursor += step;
    }

    trace!(
        %day,
        duration_minutes,
        step_minutes,
        booked = relevant.len(),
        offered = slots.len(),
        "computed slots"
    );
    slots
}

/// `HH:mm` labels, as shown to clients.
pub fn format_slots(slots: &[NaiveTime]) -> Vec<String> {
    slots.iter().copied().map(format_hhmm).collect()
}

/// The "nearest free slots" panel: up to `per_day` slots for each of `days`
/// consecutive dates from `first_day`, skipping dates with nothing free.
#[allow(clippy::too_many_arguments)]
pub fn upcoming_slots(
    first_day: NaiveDate,
    days: u32,
    windows: &[WorkingWindow],
    booked: &[BookedInterval],
    duration_minutes: u32,
    step_minutes: u32,
    now: Ms,
    per_day: usize,
) -> Vec<DaySlots> {
    first_day
        .iter_days()
        .take(days as usize)
        .filter_map(|date| {
            let window = windows.iter().find(|w| w.date == date);
            let mut slots = compute_slots(date, window, booked, duration_minutes, step_minutes, now);
            slots.truncate(per_day);
            (!slots.is_empty()).then_some(DaySlots { date, slots })
        })
        .collect()
}
