use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;
use crate::handlers::auth::authenticate;
use crate::models::{Calendar, CalendarEvent, CalendarInput, EventInput};
use crate::services::calendar::{add_event, generate_ics};
use crate::state::AppState;

fn owned_calendar(conn: &Connection, provider_id: i64, id: i64) -> Result<Calendar, AppError> {
    let calendar =
        queries::get_calendar(conn, id)?.ok_or_else(|| AppError::not_found("Calendar"))?;
    if calendar.provider_id != provider_id {
        return Err(AppError::Forbidden);
    }
    Ok(calendar)
}

fn validated(input: &CalendarInput) -> Result<(&str, Option<&str>), AppError> {
    let name = input.name.trim();
    if name.is_empty() {
        return Err(AppError::validation("Name is required"));
    }
    let description = input
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty());
    Ok((name, description))
}

// GET /calendars
pub async fn list_calendars(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Calendar>>, AppError> {
    let provider_id = authenticate(&headers, &state)?;
    let conn = state.conn()?;
    Ok(Json(queries::list_calendars(&conn, provider_id)?))
}

// POST /calendars
pub async fn create_calendar(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CalendarInput>,
) -> Result<(StatusCode, Json<Calendar>), AppError> {
    let provider_id = authenticate(&headers, &state)?;
    let (name, description) = validated(&body)?;

    let calendar = {
        let conn = state.conn()?;
        queries::insert_calendar(&conn, provider_id, name, description)?
    };
    tracing::info!(calendar_id = calendar.id, provider_id, "calendar created");
    Ok((StatusCode::CREATED, Json(calendar)))
}

// GET /calendars/:id
pub async fn get_calendar(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<Calendar>, AppError> {
    let provider_id = authenticate(&headers, &state)?;
    let conn = state.conn()?;
    Ok(Json(owned_calendar(&conn, provider_id, id)?))
}

// PUT /calendars/:id
pub async fn update_calendar(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<CalendarInput>,
) -> Result<Json<Calendar>, AppError> {
    let provider_id = authenticate(&headers, &state)?;
    let conn = state.conn()?;
    owned_calendar(&conn, provider_id, id)?;

    let (name, description) = validated(&body)?;
    let updated = queries::update_calendar(&conn, id, provider_id, name, description)?
        .ok_or_else(|| AppError::not_found("Calendar"))?;
    Ok(Json(updated))
}

// DELETE /calendars/:id
pub async fn delete_calendar(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let provider_id = authenticate(&headers, &state)?;
    let conn = state.conn()?;
    owned_calendar(&conn, provider_id, id)?;

    if !queries::delete_calendar(&conn, id, provider_id)? {
        return Err(AppError::not_found("Calendar"));
    }
    tracing::info!(calendar_id = id, provider_id, "calendar deleted");
    Ok(StatusCode::NO_CONTENT)
}

// GET /calendars/:id/events
pub async fn list_events(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<Vec<CalendarEvent>>, AppError> {
    let provider_id = authenticate(&headers, &state)?;
    let conn = state.conn()?;
    owned_calendar(&conn, provider_id, id)?;
    Ok(Json(queries::list_events(&conn, id)?))
}

// POST /calendars/:id/events
pub async fn create_event(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<EventInput>,
) -> Result<(StatusCode, Json<CalendarEvent>), AppError> {
    let provider_id = authenticate(&headers, &state)?;
    let event = {
        let mut conn = state.conn()?;
        add_event(&mut conn, provider_id, id, &body)?
    };
    Ok((StatusCode::CREATED, Json(event)))
}

// GET /calendars/:id/feed.ics
pub async fn calendar_feed(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let provider_id = authenticate(&headers, &state)?;
    let (calendar, events) = {
        let conn = state.conn()?;
        let calendar = owned_calendar(&conn, provider_id, id)?;
        let events = queries::list_events(&conn, id)?;
        (calendar, events)
    };

    let ics = generate_ics(&calendar, &events);
    let filename = format!("calendar-{id}.ics");

    Ok((
        [
            (header::CONTENT_TYPE, "text/calendar; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        ics,
    )
        .into_response())
}
