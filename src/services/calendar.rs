use rusqlite::{Connection, TransactionBehavior};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Calendar, CalendarEvent, EventInput, NewEvent};
use crate::services::scheduling::{self, Interval};

/// Adds a manually entered event, refusing any overlap with events already in
/// the provider's calendars.
pub fn add_event(
    conn: &mut Connection,
    provider_id: i64,
    calendar_id: i64,
    input: &EventInput,
) -> Result<CalendarEvent, AppError> {
    let title = input.title.trim();
    if title.is_empty() || input.start_time.trim().is_empty() || input.end_time.trim().is_empty()
    {
        return Err(AppError::validation(
            "Title, start_time, and end_time are required",
        ));
    }

    let (Some(start), Some(end)) = (
        scheduling::parse_instant(&input.start_time),
        scheduling::parse_instant(&input.end_time),
    ) else {
        return Err(AppError::validation("Invalid date format"));
    };
    if start >= end {
        return Err(AppError::validation("Start time must be before end time"));
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let calendar =
        queries::get_calendar(&tx, calendar_id)?.ok_or_else(|| AppError::not_found("Calendar"))?;
    if calendar.provider_id != provider_id {
        return Err(AppError::Forbidden);
    }

    let interval = Interval::new(start, end);
    if let Some(existing) = scheduling::check_event_conflict(&tx, provider_id, &interval, None)? {
        tracing::info!(calendar_id, conflicting_event = existing, "event rejected: overlap");
        return Err(AppError::conflict("Time conflict with existing event"));
    }

    let event = queries::insert_event(
        &tx,
        &NewEvent {
            calendar_id,
            booking_id: None,
            title: title.to_string(),
            start_time: start,
            end_time: end,
            description: input
                .description
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
        },
    )?;
    tx.commit()?;

    tracing::info!(event_id = event.id, calendar_id, "calendar event created");
    Ok(event)
}

fn escape_text(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace(';', "\\;")
        .replace(',', "\\,")
        .replace('\n', "\\n")
}

/// Renders a calendar and its events as an iCalendar document.
pub fn generate_ics(calendar: &Calendar, events: &[CalendarEvent]) -> String {
    let mut out = String::from(
        "BEGIN:VCALENDAR\r\n\
         VERSION:2.0\r\n\
         PRODID:-//Skedify//Scheduling//EN\r\n",
    );
    out.push_str(&format!("X-WR-CALNAME:{}\r\n", escape_text(&calendar.name)));

    for event in events {
        let uid = format!("event-{}@skedify", event.id);
        let dtstamp = event.created_at.format("%Y%m%dT%H%M%S");
        let dtstart = event.start_time.format("%Y%m%dT%H%M%S");
        let dtend = event.end_time.format("%Y%m%dT%H%M%S");

        out.push_str("BEGIN:VEVENT\r\n");
        out.push_str(&format!("UID:{uid}\r\n"));
        out.push_str(&format!("DTSTAMP:{dtstamp}\r\n"));
        out.push_str(&format!("DTSTART:{dtstart}\r\n"));
        out.push_str(&format!("DTEND:{dtend}\r\n"));
        out.push_str(&format!("SUMMARY:{}\r\n", escape_text(&event.title)));
        if let Some(description) = &event.description {
            out.push_str(&format!("DESCRIPTION:{}\r\n", escape_text(description)));
        }
        out.push_str("END:VEVENT\r\n");
    }

    out.push_str("END:VCALENDAR\r\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    use crate::db;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn input(title: &str, start: &str, end: &str) -> EventInput {
        EventInput {
            title: title.to_string(),
            start_time: start.to_string(),
            end_time: end.to_string(),
            description: None,
        }
    }

    fn setup() -> (Connection, i64, i64) {
        let conn = db::init_db(":memory:").unwrap();
        let provider =
            queries::insert_provider(&conn, "alice", "alice@example.com", None, None, "").unwrap();
        let calendar = queries::insert_calendar(&conn, provider.id, "Work", None).unwrap();
        (conn, provider.id, calendar.id)
    }

    #[test]
    fn test_add_event() {
        let (mut conn, provider, calendar) = setup();
        let event = add_event(
            &mut conn,
            provider,
            calendar,
            &input("Standup", "2030-06-17T09:00", "2030-06-17T09:15"),
        )
        .unwrap();
        assert_eq!(event.start_time, dt("2030-06-17 09:00"));
        assert_eq!(event.booking_id, None);
        assert_eq!(queries::list_events(&conn, calendar).unwrap().len(), 1);
    }

    #[test]
    fn test_add_event_validation() {
        let (mut conn, provider, calendar) = setup();
        for bad in [
            input("", "2030-06-17T09:00", "2030-06-17T10:00"),
            input("Gym", "2030-06-17T10:00", "2030-06-17T10:00"),
            input("Gym", "2030-06-17T11:00", "2030-06-17T10:00"),
            input("Gym", "soon", "2030-06-17T10:00"),
        ] {
            let err = add_event(&mut conn, provider, calendar, &bad).unwrap_err();
            assert!(matches!(err, AppError::Validation(_)));
        }
    }

    #[test]
    fn test_add_event_conflicts_across_calendars() {
        let (mut conn, provider, work) = setup();
        let personal = queries::insert_calendar(&conn, provider, "Personal", None).unwrap();
        add_event(
            &mut conn,
            provider,
            work,
            &input("Review", "2030-06-17T10:00", "2030-06-17T11:00"),
        )
        .unwrap();

        let err = add_event(
            &mut conn,
            provider,
            personal.id,
            &input("Lunch", "2030-06-17T10:30", "2030-06-17T11:30"),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        add_event(
            &mut conn,
            provider,
            personal.id,
            &input("Lunch", "2030-06-17T11:00", "2030-06-17T12:00"),
        )
        .unwrap();
    }

    #[test]
    fn test_add_event_to_foreign_calendar() {
        let (mut conn, _, calendar) = setup();
        let mallory =
            queries::insert_provider(&conn, "mallory", "mallory@example.com", None, None, "").unwrap();

        let err = add_event(
            &mut conn,
            mallory.id,
            calendar,
            &input("Sneaky", "2030-06-17T10:00", "2030-06-17T11:00"),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Forbidden));

        let err = add_event(
            &mut conn,
            mallory.id,
            9999,
            &input("Sneaky", "2030-06-17T10:00", "2030-06-17T11:00"),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_generate_ics() {
        let created = dt("2030-03-10 10:00");
        let calendar = Calendar {
            id: 1,
            provider_id: 1,
            name: "Work".to_string(),
            description: None,
            created_at: created,
        };
        let events = vec![
            CalendarEvent {
                id: 7,
                calendar_id: 1,
                booking_id: Some(3),
                title: "Intro call with Grace Hopper".to_string(),
                start_time: dt("2030-03-15 14:00"),
                end_time: dt("2030-03-15 14:30"),
                description: Some("Booking contact: grace@example.com".to_string()),
                created_at: created,
            },
            CalendarEvent {
                id: 8,
                calendar_id: 1,
                booking_id: None,
                title: "Lunch, then gym".to_string(),
                start_time: dt("2030-03-15 12:00"),
                end_time: dt("2030-03-15 13:00"),
                description: None,
                created_at: created,
            },
        ];

        let ics = generate_ics(&calendar, &events);
        assert!(ics.starts_with("BEGIN:VCALENDAR\r\n"));
        assert!(ics.contains("X-WR-CALNAME:Work"));
        assert!(ics.contains("UID:event-7@skedify"));
        assert!(ics.contains("DTSTART:20300315T140000"));
        assert!(ics.contains("DTEND:20300315T143000"));
        assert!(ics.contains("SUMMARY:Intro call with Grace Hopper"));
        assert!(ics.contains("DESCRIPTION:Booking contact: grace@example.com"));
        assert!(ics.contains("SUMMARY:Lunch\\, then gym"));
        assert_eq!(ics.matches("BEGIN:VEVENT").count(), 2);
        assert!(ics.ends_with("END:VCALENDAR\r\n"));
    }

    #[test]
    fn test_generate_ics_empty_calendar() {
        let calendar = Calendar {
            id: 1,
            provider_id: 1,
            name: "Empty".to_string(),
            description: None,
            created_at: dt("2030-03-10 10:00"),
        };
        let ics = generate_ics(&calendar, &[]);
        assert!(!ics.contains("BEGIN:VEVENT"));
        assert!(ics.contains("END:VCALENDAR"));
    }
}
