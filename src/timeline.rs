use chrono::{Local, NaiveDate, NaiveTime, Utc};

use crate::model::Ms;

pub const SECOND_MS: Ms = 1_000;
pub const MINUTE_MS: Ms = 60_000;
pub const DAY_MS: Ms = 86_400_000;

/// UTC wall clock. Used for throttle windows, which only compare durations.
pub fn now_ms() -> Ms {
    Utc::now().timestamp_millis()
}

/// Business-local wall clock, on the same timeline `anchor` produces.
pub fn local_now_ms() -> Ms {
    Local::now().naive_local().and_utc().timestamp_millis()
}

/// Place a time-of-day on a calendar date.
pub fn anchor(day: NaiveDate, time: NaiveTime) -> Ms {
    day.and_time(time).and_utc().timestamp_millis()
}

/// Time-of-day component of a timestamp (sub-second precision dropped).
pub fn time_of(ms: Ms) -> NaiveTime {
    let secs = (ms.rem_euclid(DAY_MS) / SECOND_MS) as u32;
    NaiveTime::from_num_seconds_from_midnight_opt(secs, 0).unwrap_or(NaiveTime::MIN)
}

pub fn date_of(ms: Ms) -> NaiveDate {
    chrono::DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.date_naive())
        .unwrap_or_default()
}

/// Accepts `HH:mm` and `HH:mm:ss`.
pub fn parse_time_of_day(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()
}

pub fn format_hhmm(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}
