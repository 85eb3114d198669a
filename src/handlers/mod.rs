pub mod auth;
pub mod bookings;
pub mod calendars;
pub mod health;
pub mod session_types;

use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me))
        .route(
            "/session-types",
            get(session_types::list_session_types).post(session_types::create_session_type),
        )
        .route(
            "/session-types/:id",
            get(session_types::get_session_type)
                .put(session_types::update_session_type)
                .delete(session_types::delete_session_type),
        )
        .route(
            "/calendars",
            get(calendars::list_calendars).post(calendars::create_calendar),
        )
        .route(
            "/calendars/:id",
            get(calendars::get_calendar)
                .put(calendars::update_calendar)
                .delete(calendars::delete_calendar),
        )
        .route(
            "/calendars/:id/events",
            get(calendars::list_events).post(calendars::create_event),
        )
        .route("/calendars/:id/feed.ics", get(calendars::calendar_feed))
        .route("/bookings", get(bookings::list_bookings))
        .route("/bookings/:id/approve", put(bookings::approve_booking))
        .route("/bookings/:id/reject", put(bookings::reject_booking))
        .route(
            "/book/:unique_link",
            get(bookings::booking_page).post(bookings::submit_booking),
        )
        .with_state(state)
}
