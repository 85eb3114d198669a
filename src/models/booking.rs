use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::services::scheduling::Interval;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: i64,
    pub session_type_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub start_time: NaiveDateTime,
    pub status: BookingStatus,
    pub created_at: NaiveDateTime,
}

impl Booking {
    /// Occupied interval for a booking of the given session length. An end past
    /// the representable range saturates, so the booking still blocks its start.
    pub fn interval(&self, duration_minutes: i64) -> Interval {
        Interval::from_duration(self.start_time, duration_minutes)
            .unwrap_or_else(|| Interval::new(self.start_time, NaiveDateTime::MAX))
    }

    pub fn invitee_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Email if given, otherwise phone.
    pub fn contact(&self) -> &str {
        self.email
            .as_deref()
            .or(self.phone.as_deref())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Approved,
    Rejected,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Approved => "approved",
            BookingStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(BookingStatus::Pending),
            "approved" => Some(BookingStatus::Approved),
            "rejected" => Some(BookingStatus::Rejected),
            _ => None,
        }
    }
}

/// Invitee details submitted through the public booking page.
#[derive(Debug, Clone, Deserialize)]
pub struct NewBooking {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[serde(default)]
    pub start_time: String,
}
