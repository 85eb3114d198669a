//! Booking creation and the pending → approved / rejected transitions.
//!
//! Every check-then-write runs inside an IMMEDIATE transaction, which takes
//! the database write lock before the conflict check. Concurrent writers for
//! the same provider therefore see each other's committed bookings.

use chrono::NaiveDateTime;
use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;

use crate::db::queries::{self, BookingFields};
use crate::errors::AppError;
use crate::models::{
    is_valid_email, Booking, BookingStatus, CalendarEvent, NewBooking, NewEvent, SessionType,
};
use crate::services::scheduling::{self, Interval};

pub const SLOT_TAKEN: &str = "Time slot is no longer available";
pub const NO_CALENDAR_WARNING: &str =
    "Booking approved, but no calendar event was created because you have no calendars";

/// Invitee details after validation.
#[derive(Debug)]
struct ValidBooking {
    first_name: String,
    last_name: String,
    email: Option<String>,
    phone: Option<String>,
    start_time: NaiveDateTime,
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn validate(input: &NewBooking, now: NaiveDateTime) -> Result<ValidBooking, AppError> {
    let first_name = input.first_name.trim();
    let last_name = input.last_name.trim();
    if first_name.is_empty() || last_name.is_empty() || input.start_time.trim().is_empty() {
        return Err(AppError::validation(
            "First name, last name, and start time are required",
        ));
    }

    let email = non_empty(input.email.as_deref());
    let phone = non_empty(input.phone.as_deref());
    if email.is_none() && phone.is_none() {
        return Err(AppError::validation(
            "Either email or phone number is required",
        ));
    }
    if let Some(email) = &email {
        if !is_valid_email(email) {
            return Err(AppError::validation("Invalid email format"));
        }
    }

    let start_time = scheduling::parse_instant(&input.start_time)
        .ok_or_else(|| AppError::validation("Invalid date format"))?;
    if start_time <= now {
        return Err(AppError::validation("Cannot book time in the past"));
    }

    Ok(ValidBooking {
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        email,
        phone,
        start_time,
    })
}

/// Creates a pending booking for `session_type` if the requested interval is
/// free among the provider's pending and approved bookings.
pub fn create_booking(
    conn: &mut Connection,
    session_type: &SessionType,
    input: &NewBooking,
    now: NaiveDateTime,
) -> Result<Booking, AppError> {
    let valid = validate(input, now)?;
    let interval = Interval::from_duration(valid.start_time, session_type.duration_minutes)
        .ok_or_else(|| AppError::validation("Start time is too far in the future"))?;

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    if let Some(existing) =
        scheduling::check_booking_conflict(&tx, session_type.provider_id, &interval, None)?
    {
        tracing::info!(
            session_type_id = session_type.id,
            conflicting_booking = existing,
            start = %valid.start_time,
            "booking rejected: slot taken"
        );
        return Err(AppError::conflict(SLOT_TAKEN));
    }

    let booking = queries::insert_booking(
        &tx,
        session_type.id,
        &BookingFields {
            first_name: &valid.first_name,
            last_name: &valid.last_name,
            email: valid.email.as_deref(),
            phone: valid.phone.as_deref(),
            start_time: valid.start_time,
        },
    )?;
    tx.commit()?;

    tracing::info!(
        booking_id = booking.id,
        session_type_id = session_type.id,
        start = %booking.start_time,
        "booking created"
    );
    Ok(booking)
}

#[derive(Debug, Clone, Serialize)]
pub struct Approval {
    pub booking: Booking,
    pub session_type_name: String,
    pub event: Option<CalendarEvent>,
    pub warning: Option<String>,
}

/// Loads a booking and its session type, checking that `provider_id` owns it
/// and that it is still pending.
fn load_pending(
    conn: &Connection,
    provider_id: i64,
    booking_id: i64,
) -> Result<queries::ScheduledBooking, AppError> {
    let scheduled =
        queries::get_booking(conn, booking_id)?.ok_or_else(|| AppError::not_found("Booking"))?;
    let session_type = queries::get_session_type(conn, scheduled.booking.session_type_id)?
        .ok_or_else(|| AppError::not_found("Session type"))?;

    if session_type.provider_id != provider_id {
        return Err(AppError::Forbidden);
    }
    if scheduled.booking.status != BookingStatus::Pending {
        return Err(AppError::validation(format!(
            "Booking is already {}",
            scheduled.booking.status.as_str()
        )));
    }
    Ok(scheduled)
}

/// Approves a pending booking and records it as an event.
///
/// The event goes to `calendar_id` when given, otherwise to the provider's
/// oldest calendar. A provider without calendars still gets the approval,
/// with a warning and no event. Status update and event insert commit together.
pub fn approve_booking(
    conn: &mut Connection,
    provider_id: i64,
    booking_id: i64,
    calendar_id: Option<i64>,
) -> Result<Approval, AppError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let scheduled = load_pending(&tx, provider_id, booking_id)?;
    let interval = scheduled.booking.interval(scheduled.duration_minutes);

    let calendar = match calendar_id {
        Some(id) => {
            let calendar =
                queries::get_calendar(&tx, id)?.ok_or_else(|| AppError::not_found("Calendar"))?;
            if calendar.provider_id != provider_id {
                return Err(AppError::Forbidden);
            }
            Some(calendar)
        }
        None => queries::list_calendars(&tx, provider_id)?.into_iter().next(),
    };

    if let Some(event_id) = scheduling::check_event_conflict(&tx, provider_id, &interval, None)? {
        tracing::info!(booking_id, conflicting_event = event_id, "approval blocked by event");
        return Err(AppError::conflict(
            "Cannot approve - time conflict with existing event",
        ));
    }

    queries::update_booking_status(&tx, booking_id, BookingStatus::Approved)?;

    let mut booking = scheduled.booking;
    booking.status = BookingStatus::Approved;

    let (event, warning) = match calendar {
        Some(calendar) => {
            let event = queries::insert_event(
                &tx,
                &NewEvent {
                    calendar_id: calendar.id,
                    booking_id: Some(booking.id),
                    title: format!(
                        "{} with {}",
                        scheduled.session_type_name,
                        booking.invitee_name()
                    ),
                    start_time: interval.start,
                    end_time: interval.end,
                    description: Some(format!("Booking contact: {}", booking.contact())),
                },
            )?;
            (Some(event), None)
        }
        None => (None, Some(NO_CALENDAR_WARNING.to_string())),
    };

    tx.commit()?;

    match &event {
        Some(event) => tracing::info!(
            booking_id,
            event_id = event.id,
            calendar_id = event.calendar_id,
            "booking approved"
        ),
        None => tracing::warn!(booking_id, provider_id, "booking approved without calendar event"),
    }

    Ok(Approval {
        booking,
        session_type_name: scheduled.session_type_name,
        event,
        warning,
    })
}

pub fn reject_booking(
    conn: &mut Connection,
    provider_id: i64,
    booking_id: i64,
) -> Result<queries::ScheduledBooking, AppError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let mut scheduled = load_pending(&tx, provider_id, booking_id)?;
    queries::update_booking_status(&tx, booking_id, BookingStatus::Rejected)?;
    tx.commit()?;

    scheduled.booking.status = BookingStatus::Rejected;
    tracing::info!(booking_id, "booking rejected");
    Ok(scheduled)
}
