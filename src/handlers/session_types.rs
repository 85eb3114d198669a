use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;
use crate::handlers::auth::authenticate;
use crate::models::{SessionType, SessionTypeInput};
use crate::services::session_types;
use crate::state::AppState;

fn owned_session_type(
    conn: &Connection,
    provider_id: i64,
    id: i64,
) -> Result<SessionType, AppError> {
    let session_type =
        queries::get_session_type(conn, id)?.ok_or_else(|| AppError::not_found("Session type"))?;
    if session_type.provider_id != provider_id {
        return Err(AppError::Forbidden);
    }
    Ok(session_type)
}

// GET /session-types
pub async fn list_session_types(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<SessionType>>, AppError> {
    let provider_id = authenticate(&headers, &state)?;
    let conn = state.conn()?;
    Ok(Json(queries::list_session_types(&conn, provider_id)?))
}

// POST /session-types
pub async fn create_session_type(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<SessionTypeInput>,
) -> Result<(StatusCode, Json<SessionType>), AppError> {
    let provider_id = authenticate(&headers, &state)?;
    let (name, duration) = body.validate().map_err(AppError::Validation)?;

    let session_type = {
        let conn = state.conn()?;
        queries::insert_session_type(&conn, provider_id, &name, duration)?
    };

    tracing::info!(
        session_type_id = session_type.id,
        provider_id,
        link = %session_type.unique_link,
        "session type created"
    );
    Ok((StatusCode::CREATED, Json(session_type)))
}

// GET /session-types/:id
pub async fn get_session_type(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<SessionType>, AppError> {
    let provider_id = authenticate(&headers, &state)?;
    let conn = state.conn()?;
    Ok(Json(owned_session_type(&conn, provider_id, id)?))
}

// PUT /session-types/:id
pub async fn update_session_type(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<SessionTypeInput>,
) -> Result<Json<SessionType>, AppError> {
    let provider_id = authenticate(&headers, &state)?;
    let mut conn = state.conn()?;
    let updated = session_types::update_session_type(&mut conn, provider_id, id, &body)?;
    Ok(Json(updated))
}

// DELETE /session-types/:id
pub async fn delete_session_type(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let provider_id = authenticate(&headers, &state)?;
    let conn = state.conn()?;
    owned_session_type(&conn, provider_id, id)?;

    if !queries::delete_session_type(&conn, id, provider_id)? {
        return Err(AppError::not_found("Session type"));
    }
    tracing::info!(session_type_id = id, provider_id, "session type deleted");
    Ok(StatusCode::NO_CONTENT)
}
