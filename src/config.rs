use std::env;

use chrono::NaiveTime;

use crate::services::scheduling::SlotPolicy;

// Mirrors bcrypt's private MIN_COST / MAX_COST bounds (bcrypt 0.15).
const BCRYPT_MIN_COST: u32 = 4;
const BCRYPT_MAX_COST: u32 = 31;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub token_secret: String,
    pub cors_origin: String,
    pub bcrypt_cost: u32,
    pub slot_policy: SlotPolicy,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = SlotPolicy::default();

        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "skedify.db".to_string()),
            token_secret: env::var("TOKEN_SECRET").unwrap_or_else(|_| "changeme".to_string()),
            cors_origin: env::var("CORS_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            bcrypt_cost: env::var("BCRYPT_COST")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|cost| (BCRYPT_MIN_COST..=BCRYPT_MAX_COST).contains(cost))
                .unwrap_or(bcrypt::DEFAULT_COST),
            slot_policy: SlotPolicy {
                window_start: time_var("WORKDAY_START").unwrap_or(defaults.window_start),
                window_end: time_var("WORKDAY_END").unwrap_or(defaults.window_end),
                step_minutes: env::var("SLOT_STEP_MINUTES")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .filter(|step: &i64| *step > 0)
                    .unwrap_or(defaults.step_minutes),
            },
        }
    }
}

fn time_var(key: &str) -> Option<NaiveTime> {
    let raw = env::var(key).ok()?;
    match NaiveTime::parse_from_str(raw.trim(), "%H:%M") {
        Ok(t) => Some(t),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring malformed HH:MM value");
            None
        }
    }
}
