use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::queries::{self, ScheduledBooking};
use crate::errors::AppError;
use crate::handlers::auth::authenticate;
use crate::models::{Booking, BookingStatus, NewBooking};
use crate::services::lifecycle::{self, Approval};
use crate::services::scheduling;
use crate::state::AppState;

// GET /book/:unique_link
#[derive(Deserialize)]
pub struct BookingPageQuery {
    pub date: Option<String>,
}

#[derive(Serialize)]
pub struct SessionTypeSummary {
    id: i64,
    name: String,
    duration_minutes: i64,
    provider_name: String,
}

#[derive(Serialize)]
pub struct BookingPageResponse {
    session_type: SessionTypeSummary,
    date: Option<NaiveDate>,
    available_slots: Vec<NaiveDateTime>,
}

pub async fn booking_page(
    State(state): State<Arc<AppState>>,
    Path(unique_link): Path<String>,
    Query(query): Query<BookingPageQuery>,
) -> Result<Json<BookingPageResponse>, AppError> {
    let conn = state.conn()?;
    let session_type = queries::get_session_type_by_link(&conn, &unique_link)?
        .ok_or_else(|| AppError::not_found("Session type"))?;
    let provider = queries::get_provider(&conn, session_type.provider_id)?
        .ok_or_else(|| AppError::not_found("Provider"))?;

    let date = query.date.as_deref().and_then(scheduling::parse_date);
    let available_slots = match date {
        Some(date) => scheduling::available_slots(
            &conn,
            session_type.id,
            date,
            &state.config.slot_policy,
        )?,
        None => Vec::new(),
    };

    let provider_name = match (&provider.first_name, &provider.last_name) {
        (Some(first), Some(last)) => format!("{first} {last}"),
        (Some(first), None) => first.clone(),
        _ => provider.username.clone(),
    };

    Ok(Json(BookingPageResponse {
        session_type: SessionTypeSummary {
            id: session_type.id,
            name: session_type.name,
            duration_minutes: session_type.duration_minutes,
            provider_name,
        },
        date,
        available_slots,
    }))
}

// POST /book/:unique_link
pub async fn submit_booking(
    State(state): State<Arc<AppState>>,
    Path(unique_link): Path<String>,
    Json(body): Json<NewBooking>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let mut conn = state.conn()?;
    let session_type = queries::get_session_type_by_link(&conn, &unique_link)?
        .ok_or_else(|| AppError::not_found("Session type"))?;

    let booking =
        lifecycle::create_booking(&mut conn, &session_type, &body, Utc::now().naive_utc())?;
    Ok((StatusCode::CREATED, Json(booking)))
}

// GET /bookings
#[derive(Deserialize)]
pub struct BookingsQuery {
    pub status: Option<String>,
}

pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<BookingsQuery>,
) -> Result<Json<Vec<ScheduledBooking>>, AppError> {
    let provider_id = authenticate(&headers, &state)?;

    let status = match query.status.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => Some(
            BookingStatus::parse(raw)
                .ok_or_else(|| AppError::validation(format!("Invalid status: {raw}")))?,
        ),
        None => None,
    };

    let conn = state.conn()?;
    Ok(Json(queries::list_provider_bookings(&conn, provider_id, status)?))
}

// PUT /bookings/:id/approve
#[derive(Debug, Deserialize)]
pub struct ApproveRequest {
    pub calendar_id: Option<i64>,
}

pub async fn approve_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    body: Bytes,
) -> Result<Json<Approval>, AppError> {
    let provider_id = authenticate(&headers, &state)?;
    let calendar_id = parse_approve_body(&body)?.and_then(|req| req.calendar_id);

    let mut conn = state.conn()?;
    let approval = lifecycle::approve_booking(&mut conn, provider_id, id, calendar_id)?;
    Ok(Json(approval))
}

/// The approve body is optional, but one that is sent must be valid JSON.
fn parse_approve_body(body: &[u8]) -> Result<Option<ApproveRequest>, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(body)
        .map(Some)
        .map_err(|e| AppError::validation(format!("Invalid request body: {e}")))
}

// PUT /bookings/:id/reject
pub async fn reject_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<ScheduledBooking>, AppError> {
    let provider_id = authenticate(&headers, &state)?;

    let mut conn = state.conn()?;
    let rejected = lifecycle::reject_booking(&mut conn, provider_id, id)?;
    Ok(Json(rejected))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_approve_body_means_default_calendar() {
        assert!(parse_approve_body(b"").unwrap().is_none());
        assert!(parse_approve_body(b"  \n").unwrap().is_none());
    }

    #[test]
    fn test_approve_body_is_parsed() {
        let req = parse_approve_body(br#"{"calendar_id": 7}"#).unwrap().unwrap();
        assert_eq!(req.calendar_id, Some(7));

        let req = parse_approve_body(b"{}").unwrap().unwrap();
        assert_eq!(req.calendar_id, None);
    }

    #[test]
    fn test_malformed_approve_body_is_rejected() {
        let bodies: [&[u8]; 3] = [br#"{"calendar_id":"x"}"#, b"not json", b"42"];
        for body in bodies {
            let err = parse_approve_body(body).unwrap_err();
            assert!(matches!(err, AppError::Validation(_)));
        }
    }
}
