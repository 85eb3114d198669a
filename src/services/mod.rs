pub mod auth;
pub mod calendar;
pub mod lifecycle;
pub mod scheduling;
pub mod session_types;
