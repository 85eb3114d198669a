use rusqlite::{Connection, TransactionBehavior};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{SessionType, SessionTypeInput};
use crate::services::scheduling;

/// Renames or resizes a session type.
///
/// Lengthening re-checks every pending and approved booking made through the
/// type against the provider's other active bookings. The change is refused if
/// any of them would start to overlap.
pub fn update_session_type(
    conn: &mut Connection,
    provider_id: i64,
    id: i64,
    input: &SessionTypeInput,
) -> Result<SessionType, AppError> {
    let (name, duration) = input.validate().map_err(AppError::Validation)?;

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let current =
        queries::get_session_type(&tx, id)?.ok_or_else(|| AppError::not_found("Session type"))?;
    if current.provider_id != provider_id {
        return Err(AppError::Forbidden);
    }

    let updated = queries::update_session_type(&tx, id, provider_id, &name, duration)?
        .ok_or_else(|| AppError::not_found("Session type"))?;

    if duration > current.duration_minutes {
        // The update above is visible inside the transaction, so sibling
        // bookings of this type are already measured with the new length.
        for scheduled in queries::session_type_active_bookings(&tx, id)? {
            let booking = &scheduled.booking;
            let interval = booking.interval(duration);
            if let Some(other) =
                scheduling::check_booking_conflict(&tx, provider_id, &interval, Some(booking.id))?
            {
                tracing::info!(
                    session_type_id = id,
                    booking_id = booking.id,
                    conflicting_booking = other,
                    duration,
                    "duration change rejected: bookings would overlap"
                );
                return Err(AppError::conflict(format!(
                    "Cannot change duration - booking {} would overlap booking {other}",
                    booking.id
                )));
            }
        }
    }

    tx.commit()?;

    tracing::info!(session_type_id = id, provider_id, duration, "session type updated");
    Ok(updated)
}
