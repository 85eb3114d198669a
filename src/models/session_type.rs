use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub const MIN_DURATION_MINUTES: i64 = 1;
pub const MAX_DURATION_MINUTES: i64 = 480;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionType {
    pub id: i64,
    pub provider_id: i64,
    pub name: String,
    pub duration_minutes: i64,
    pub unique_link: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionTypeInput {
    #[serde(default)]
    pub name: String,
    pub duration_minutes: Option<i64>,
}

impl SessionTypeInput {
    /// Returns the trimmed name and duration once both are present and in range.
    pub fn validate(&self) -> Result<(String, i64), String> {
        let name = self.name.trim();
        let Some(duration) = self.duration_minutes else {
            return Err("Name and duration_minutes are required".to_string());
        };
        if name.is_empty() {
            return Err("Name and duration_minutes are required".to_string());
        }
        if !(MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&duration) {
            return Err(format!(
                "Duration must be between {MIN_DURATION_MINUTES} and {MAX_DURATION_MINUTES} minutes"
            ));
        }
        Ok((name.to_string(), duration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(name: &str, duration: Option<i64>) -> SessionTypeInput {
        SessionTypeInput {
            name: name.to_string(),
            duration_minutes: duration,
        }
    }

    #[test]
    fn test_duration_bounds() {
        assert!(input("Intro", Some(1)).validate().is_ok());
        assert!(input("Intro", Some(480)).validate().is_ok());
        assert!(input("Intro", Some(0)).validate().is_err());
        assert!(input("Intro", Some(481)).validate().is_err());
    }

    #[test]
    fn test_missing_fields() {
        assert!(input("", Some(30)).validate().is_err());
        assert!(input("   ", Some(30)).validate().is_err());
        assert!(input("Intro", None).validate().is_err());
    }

    #[test]
    fn test_name_is_trimmed() {
        let (name, duration) = input("  Coaching ", Some(60)).validate().unwrap();
        assert_eq!(name, "Coaching");
        assert_eq!(duration, 60);
    }
}
