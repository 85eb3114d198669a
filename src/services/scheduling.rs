//! Slot generation, availability filtering and the shared overlap check.
//!
//! All instants are naive and interpreted in the service's single implicit
//! timezone. Intervals are half-open: `[start, end)`.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use rusqlite::Connection;
use serde::Serialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::session_type::MAX_DURATION_MINUTES;

/// Years that fit the four-digit `YYYY-MM-DD` storage format, which keeps
/// stored timestamps ordered as text.
const STORABLE_YEARS: std::ops::RangeInclusive<i32> = 1..=9999;

const INSTANT_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Parses an RFC 3339 timestamp (normalised to UTC) or a naive local
/// timestamp. Sub-second precision is dropped.
pub fn parse_instant(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    let parsed = DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.naive_utc())
        .ok()
        .or_else(|| {
            INSTANT_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        })?;
    parsed.with_nanosecond(0).filter(|dt| STORABLE_YEARS.contains(&dt.year()))
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .ok()
        .filter(|d| STORABLE_YEARS.contains(&d.year()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Interval {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Interval {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    /// `None` when the end is not representable or falls past the storable range.
    pub fn from_duration(start: NaiveDateTime, duration_minutes: i64) -> Option<Self> {
        let end = start.checked_add_signed(Duration::try_minutes(duration_minutes)?)?;
        STORABLE_YEARS
            .contains(&end.year())
            .then(|| Self::new(start, end))
    }
}

/// Half-open overlap test. Intervals that only touch at an endpoint do not overlap.
pub fn overlaps(a: &Interval, b: &Interval) -> bool {
    a.start < b.end && b.start < a.end
}

/// Returns the id of the first entry in `existing` that overlaps `candidate`,
/// skipping `exclude_id` if given.
pub fn find_conflict<I>(candidate: &Interval, existing: I, exclude_id: Option<i64>) -> Option<i64>
where
    I: IntoIterator<Item = (i64, Interval)>,
{
    existing
        .into_iter()
        .filter(|(id, _)| Some(*id) != exclude_id)
        .find(|(_, interval)| overlaps(candidate, interval))
        .map(|(id, _)| id)
}

/// Working window and granularity used to enumerate candidate slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotPolicy {
    pub window_start: NaiveTime,
    pub window_end: NaiveTime,
    pub step_minutes: i64,
}

impl Default for SlotPolicy {
    fn default() -> Self {
        Self {
            window_start: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN),
            window_end: NaiveTime::from_hms_opt(17, 0, 0).unwrap_or(NaiveTime::MIN),
            step_minutes: 15,
        }
    }
}

/// Candidate sessions for `date`: one per step whose *start* lies inside the
/// window. The last candidate may end after the window closes.
pub fn generate_candidates(
    date: NaiveDate,
    duration_minutes: i64,
    policy: &SlotPolicy,
) -> Vec<Interval> {
    if policy.step_minutes <= 0 {
        return Vec::new();
    }

    let window_end = date.and_time(policy.window_end);
    let step = Duration::minutes(policy.step_minutes);

    let mut candidates = Vec::new();
    let mut t = date.and_time(policy.window_start);
    while t < window_end {
        let Some(candidate) = Interval::from_duration(t, duration_minutes) else {
            break;
        };
        candidates.push(candidate);
        let Some(next) = t.checked_add_signed(step) else {
            break;
        };
        t = next;
    }
    candidates
}

/// Keeps the start of every candidate that overlaps none of `busy`.
pub fn filter_available(candidates: &[Interval], busy: &[Interval]) -> Vec<NaiveDateTime> {
    candidates
        .iter()
        .filter(|candidate| !busy.iter().any(|b| overlaps(candidate, b)))
        .map(|candidate| candidate.start)
        .collect()
}

/// Free start instants for a session type on `date`.
///
/// Busy time is every pending or approved booking of the same provider plus
/// every event in the provider's calendars whose start falls on `date`. An
/// unknown session type has no availability.
pub fn available_slots(
    conn: &Connection,
    session_type_id: i64,
    date: NaiveDate,
    policy: &SlotPolicy,
) -> Result<Vec<NaiveDateTime>, AppError> {
    let Some(session_type) = queries::get_session_type(conn, session_type_id)? else {
        return Ok(Vec::new());
    };

    let bookings =
        queries::provider_active_bookings_on_date(conn, session_type.provider_id, &date)?;
    let events = queries::provider_events_on_date(conn, session_type.provider_id, &date)?;

    let busy: Vec<Interval> = bookings
        .iter()
        .map(|b| b.booking.interval(b.duration_minutes))
        .chain(events.iter().map(|e| e.interval()))
        .collect();

    let candidates = generate_candidates(date, session_type.duration_minutes, policy);
    Ok(filter_available(&candidates, &busy))
}

/// Checks `candidate` against the provider's pending and approved bookings,
/// skipping `exclude_booking_id`. Returns the id of a conflicting booking.
pub fn check_booking_conflict(
    conn: &Connection,
    provider_id: i64,
    candidate: &Interval,
    exclude_booking_id: Option<i64>,
) -> Result<Option<i64>, AppError> {
    // No booking can reach `candidate` if it started more than one maximum
    // session length before it.
    let from = candidate
        .start
        .checked_sub_signed(Duration::minutes(MAX_DURATION_MINUTES))
        .unwrap_or(NaiveDateTime::MIN);
    let bookings =
        queries::provider_active_bookings_between(conn, provider_id, &from, &candidate.end)?;

    Ok(find_conflict(
        candidate,
        bookings
            .iter()
            .map(|b| (b.booking.id, b.booking.interval(b.duration_minutes))),
        exclude_booking_id,
    ))
}

/// Checks `candidate` against events in all of the provider's calendars.
/// Returns the id of a conflicting event.
pub fn check_event_conflict(
    conn: &Connection,
    provider_id: i64,
    candidate: &Interval,
    exclude_event_id: Option<i64>,
) -> Result<Option<i64>, AppError> {
    let events =
        queries::provider_events_between(conn, provider_id, &candidate.start, &candidate.end)?;

    Ok(find_conflict(
        candidate,
        events.iter().map(|e| (e.id, e.interval())),
        exclude_event_id,
    ))
}
