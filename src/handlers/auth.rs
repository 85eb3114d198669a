use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::Provider;
use crate::models::{check_password, is_valid_email};
use crate::services::auth::{hash_password, issue_token, verify_password, verify_token};
use crate::state::AppState;

/// Resolves the bearer token on a request to the provider it was issued for.
pub fn authenticate(headers: &HeaderMap, state: &AppState) -> Result<i64, AppError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("");
    if token.is_empty() {
        return Err(AppError::Unauthorized);
    }
    verify_token(&state.config.token_secret, token).ok_or(AppError::Unauthorized)
}

// POST /register
#[derive(Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Serialize)]
pub struct AuthResponse {
    token: String,
    provider: Provider,
}

fn optional(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

async fn run_blocking<T, F>(work: F) -> Result<T, AppError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AppError::Internal(format!("blocking task failed: {e}")))
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let username = body.username.trim();
    let email = body.email.trim().to_lowercase();
    if username.is_empty() || email.is_empty() || body.password.is_empty() {
        return Err(AppError::validation(
            "Username, email, and password are required",
        ));
    }
    check_password(&body.password).map_err(AppError::Validation)?;
    if !is_valid_email(&email) {
        return Err(AppError::validation("Invalid email format"));
    }

    let cost = state.config.bcrypt_cost;
    let password = body.password.clone();
    let password_hash = run_blocking(move || hash_password(&password, cost)).await??;

    let provider = {
        let conn = state.conn()?;
        if queries::username_exists(&conn, username)? {
            return Err(AppError::validation("Username already taken"));
        }
        if queries::email_exists(&conn, &email)? {
            return Err(AppError::validation("Email already registered"));
        }
        queries::insert_provider(
            &conn,
            username,
            &email,
            optional(body.first_name.as_deref()),
            optional(body.last_name.as_deref()),
            &password_hash,
        )?
    };

    tracing::info!(provider_id = provider.id, username, "provider registered");

    let token = issue_token(&state.config.token_secret, provider.id);
    Ok((StatusCode::CREATED, Json(AuthResponse { token, provider })))
}

// POST /login
#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let email = body.email.trim().to_lowercase();
    if email.is_empty() || body.password.is_empty() {
        return Err(AppError::validation("Email and password are required"));
    }

    let credentials = {
        let conn = state.conn()?;
        queries::get_credentials_by_email(&conn, &email)?
    };
    let Some((provider, password_hash)) = credentials else {
        tracing::info!("login failed: unknown email");
        return Err(AppError::Unauthorized);
    };

    let password = body.password;
    if !run_blocking(move || verify_password(&password, &password_hash)).await? {
        tracing::info!(provider_id = provider.id, "login failed: wrong password");
        return Err(AppError::Unauthorized);
    }

    tracing::info!(provider_id = provider.id, "provider logged in");
    let token = issue_token(&state.config.token_secret, provider.id);
    Ok(Json(AuthResponse { token, provider }))
}

// GET /me
pub async fn me(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Provider>, AppError> {
    let provider_id = authenticate(&headers, &state)?;
    let conn = state.conn()?;
    queries::get_provider(&conn, provider_id)?
        .map(Json)
        .ok_or(AppError::Unauthorized)
}
