use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::services::scheduling::Interval;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Calendar {
    pub id: i64,
    pub provider_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: i64,
    pub calendar_id: i64,
    pub booking_id: Option<i64>,
    pub title: String,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub description: Option<String>,
    pub created_at: NaiveDateTime,
}

impl CalendarEvent {
    pub fn interval(&self) -> Interval {
        Interval::new(self.start_time, self.end_time)
    }
}

/// Fields of an event about to be inserted.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub calendar_id: i64,
    pub booking_id: Option<i64>,
    pub title: String,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CalendarInput {
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub end_time: String,
    pub description: Option<String>,
}
