use chrono::{NaiveDate, NaiveDateTime, Timelike, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::models::{
    Booking, BookingStatus, Calendar, CalendarEvent, NewEvent, Provider, SessionType,
};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn format_ts(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

fn now() -> NaiveDateTime {
    // Stored timestamps carry whole seconds only.
    let now = Utc::now().naive_utc();
    now.with_nanosecond(0).unwrap_or(now)
}

fn ts_column(row: &Row, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let raw: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

// ── Providers ──

pub fn insert_provider(
    conn: &Connection,
    username: &str,
    email: &str,
    first_name: Option<&str>,
    last_name: Option<&str>,
    password_hash: &str,
) -> rusqlite::Result<Provider> {
    let created_at = now();
    conn.execute(
        "INSERT INTO providers (username, email, first_name, last_name, password_hash, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            username,
            email,
            first_name,
            last_name,
            password_hash,
            format_ts(&created_at)
        ],
    )?;

    Ok(Provider {
        id: conn.last_insert_rowid(),
        username: username.to_string(),
        email: email.to_string(),
        first_name: first_name.map(str::to_string),
        last_name: last_name.map(str::to_string),
        created_at,
    })
}

const PROVIDER_COLUMNS: &str = "id, username, email, first_name, last_name, created_at";

fn parse_provider_row(row: &Row) -> rusqlite::Result<Provider> {
    Ok(Provider {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        created_at: ts_column(row, 5)?,
    })
}

pub fn get_provider(conn: &Connection, id: i64) -> rusqlite::Result<Option<Provider>> {
    conn.query_row(
        &format!("SELECT {PROVIDER_COLUMNS} FROM providers WHERE id = ?1"),
        params![id],
        parse_provider_row,
    )
    .optional()
}

/// A provider together with its stored password hash, looked up for login.
pub fn get_credentials_by_email(
    conn: &Connection,
    email: &str,
) -> rusqlite::Result<Option<(Provider, String)>> {
    conn.query_row(
        &format!("SELECT {PROVIDER_COLUMNS}, password_hash FROM providers WHERE email = ?1"),
        params![email],
        |row| Ok((parse_provider_row(row)?, row.get(6)?)),
    )
    .optional()
}

pub fn email_exists(conn: &Connection, email: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM providers WHERE email = ?1",
        params![email],
        |row| row.get(0),
    )
}

pub fn username_exists(conn: &Connection, username: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM providers WHERE username = ?1",
        params![username],
        |row| row.get(0),
    )
}

// ── Session Types ──

const SESSION_TYPE_COLUMNS: &str =
    "id, provider_id, name, duration_minutes, unique_link, created_at";

fn parse_session_type_row(row: &Row) -> rusqlite::Result<SessionType> {
    Ok(SessionType {
        id: row.get(0)?,
        provider_id: row.get(1)?,
        name: row.get(2)?,
        duration_minutes: row.get(3)?,
        unique_link: row.get(4)?,
        created_at: ts_column(row, 5)?,
    })
}

pub fn insert_session_type(
    conn: &Connection,
    provider_id: i64,
    name: &str,
    duration_minutes: i64,
) -> rusqlite::Result<SessionType> {
    let unique_link = uuid::Uuid::new_v4().to_string();
    let created_at = now();
    conn.execute(
        "INSERT INTO session_types (provider_id, name, duration_minutes, unique_link, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![provider_id, name, duration_minutes, unique_link, format_ts(&created_at)],
    )?;

    Ok(SessionType {
        id: conn.last_insert_rowid(),
        provider_id,
        name: name.to_string(),
        duration_minutes,
        unique_link,
        created_at,
    })
}

pub fn list_session_types(conn: &Connection, provider_id: i64) -> rusqlite::Result<Vec<SessionType>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SESSION_TYPE_COLUMNS} FROM session_types
         WHERE provider_id = ?1 ORDER BY created_at, id"
    ))?;
    let rows = stmt.query_map(params![provider_id], parse_session_type_row)?;
    rows.collect()
}

pub fn get_session_type(conn: &Connection, id: i64) -> rusqlite::Result<Option<SessionType>> {
    conn.query_row(
        &format!("SELECT {SESSION_TYPE_COLUMNS} FROM session_types WHERE id = ?1"),
        params![id],
        parse_session_type_row,
    )
    .optional()
}

pub fn get_session_type_by_link(
    conn: &Connection,
    unique_link: &str,
) -> rusqlite::Result<Option<SessionType>> {
    conn.query_row(
        &format!("SELECT {SESSION_TYPE_COLUMNS} FROM session_types WHERE unique_link = ?1"),
        params![unique_link],
        parse_session_type_row,
    )
    .optional()
}

pub fn update_session_type(
    conn: &Connection,
    id: i64,
    provider_id: i64,
    name: &str,
    duration_minutes: i64,
) -> rusqlite::Result<Option<SessionType>> {
    let count = conn.execute(
        "UPDATE session_types SET name = ?1, duration_minutes = ?2
         WHERE id = ?3 AND provider_id = ?4",
        params![name, duration_minutes, id, provider_id],
    )?;
    if count == 0 {
        return Ok(None);
    }
    get_session_type(conn, id)
}

pub fn delete_session_type(conn: &Connection, id: i64, provider_id: i64) -> rusqlite::Result<bool> {
    let count = conn.execute(
        "DELETE FROM session_types WHERE id = ?1 AND provider_id = ?2",
        params![id, provider_id],
    )?;
    Ok(count > 0)
}

// ── Calendars ──

fn parse_calendar_row(row: &Row) -> rusqlite::Result<Calendar> {
    Ok(Calendar {
        id: row.get(0)?,
        provider_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        created_at: ts_column(row, 4)?,
    })
}

pub fn insert_calendar(
    conn: &Connection,
    provider_id: i64,
    name: &str,
    description: Option<&str>,
) -> rusqlite::Result<Calendar> {
    let created_at = now();
    conn.execute(
        "INSERT INTO calendars (provider_id, name, description, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![provider_id, name, description, format_ts(&created_at)],
    )?;

    Ok(Calendar {
        id: conn.last_insert_rowid(),
        provider_id,
        name: name.to_string(),
        description: description.map(str::to_string),
        created_at,
    })
}

/// Calendars ordered oldest first; the head is the provider's default calendar.
pub fn list_calendars(conn: &Connection, provider_id: i64) -> rusqlite::Result<Vec<Calendar>> {
    let mut stmt = conn.prepare(
        "SELECT id, provider_id, name, description, created_at FROM calendars
         WHERE provider_id = ?1 ORDER BY created_at, id",
    )?;
    let rows = stmt.query_map(params![provider_id], parse_calendar_row)?;
    rows.collect()
}

pub fn get_calendar(conn: &Connection, id: i64) -> rusqlite::Result<Option<Calendar>> {
    conn.query_row(
        "SELECT id, provider_id, name, description, created_at FROM calendars WHERE id = ?1",
        params![id],
        parse_calendar_row,
    )
    .optional()
}

pub fn update_calendar(
    conn: &Connection,
    id: i64,
    provider_id: i64,
    name: &str,
    description: Option<&str>,
) -> rusqlite::Result<Option<Calendar>> {
    let count = conn.execute(
        "UPDATE calendars SET name = ?1, description = ?2 WHERE id = ?3 AND provider_id = ?4",
        params![name, description, id, provider_id],
    )?;
    if count == 0 {
        return Ok(None);
    }
    get_calendar(conn, id)
}

pub fn delete_calendar(conn: &Connection, id: i64, provider_id: i64) -> rusqlite::Result<bool> {
    let count = conn.execute(
        "DELETE FROM calendars WHERE id = ?1 AND provider_id = ?2",
        params![id, provider_id],
    )?;
    Ok(count > 0)
}

// ── Calendar Events ──

const EVENT_COLUMNS: &str =
    "ce.id, ce.calendar_id, ce.booking_id, ce.title, ce.start_time, ce.end_time, ce.description, ce.created_at";

fn parse_event_row(row: &Row) -> rusqlite::Result<CalendarEvent> {
    Ok(CalendarEvent {
        id: row.get(0)?,
        calendar_id: row.get(1)?,
        booking_id: row.get(2)?,
        title: row.get(3)?,
        start_time: ts_column(row, 4)?,
        end_time: ts_column(row, 5)?,
        description: row.get(6)?,
        created_at: ts_column(row, 7)?,
    })
}

pub fn insert_event(conn: &Connection, event: &NewEvent) -> rusqlite::Result<CalendarEvent> {
    let created_at = now();
    conn.execute(
        "INSERT INTO calendar_events (calendar_id, booking_id, title, start_time, end_time, description, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.calendar_id,
            event.booking_id,
            event.title,
            format_ts(&event.start_time),
            format_ts(&event.end_time),
            event.description,
            format_ts(&created_at),
        ],
    )?;

    Ok(CalendarEvent {
        id: conn.last_insert_rowid(),
        calendar_id: event.calendar_id,
        booking_id: event.booking_id,
        title: event.title.clone(),
        start_time: event.start_time,
        end_time: event.end_time,
        description: event.description.clone(),
        created_at,
    })
}

pub fn list_events(conn: &Connection, calendar_id: i64) -> rusqlite::Result<Vec<CalendarEvent>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {EVENT_COLUMNS} FROM calendar_events ce
         WHERE ce.calendar_id = ?1 ORDER BY ce.start_time, ce.id"
    ))?;
    let rows = stmt.query_map(params![calendar_id], parse_event_row)?;
    rows.collect()
}

/// Events across all of the provider's calendars that touch `[from, to]`.
pub fn provider_events_between(
    conn: &Connection,
    provider_id: i64,
    from: &NaiveDateTime,
    to: &NaiveDateTime,
) -> rusqlite::Result<Vec<CalendarEvent>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {EVENT_COLUMNS} FROM calendar_events ce
         JOIN calendars c ON ce.calendar_id = c.id
         WHERE c.provider_id = ?1 AND ce.start_time <= ?3 AND ce.end_time >= ?2
         ORDER BY ce.start_time"
    ))?;
    let rows = stmt.query_map(
        params![provider_id, format_ts(from), format_ts(to)],
        parse_event_row,
    )?;
    rows.collect()
}

/// Events whose start falls on `date`.
pub fn provider_events_on_date(
    conn: &Connection,
    provider_id: i64,
    date: &NaiveDate,
) -> rusqlite::Result<Vec<CalendarEvent>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {EVENT_COLUMNS} FROM calendar_events ce
         JOIN calendars c ON ce.calendar_id = c.id
         WHERE c.provider_id = ?1 AND date(ce.start_time) = ?2
         ORDER BY ce.start_time"
    ))?;
    let rows = stmt.query_map(
        params![provider_id, date.format("%Y-%m-%d").to_string()],
        parse_event_row,
    )?;
    rows.collect()
}

// ── Bookings ──

/// A booking joined with the session type that fixes its length.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduledBooking {
    #[serde(flatten)]
    pub booking: Booking,
    pub session_type_name: String,
    pub duration_minutes: i64,
}

const BOOKING_COLUMNS: &str = "b.id, b.session_type_id, b.first_name, b.last_name, b.email, b.phone, \
     b.start_time, b.status, b.created_at, st.name, st.duration_minutes";

fn parse_booking_row(row: &Row) -> rusqlite::Result<ScheduledBooking> {
    let status_str: String = row.get(7)?;
    let status = BookingStatus::parse(&status_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            7,
            Type::Text,
            format!("unknown booking status: {status_str}").into(),
        )
    })?;

    Ok(ScheduledBooking {
        booking: Booking {
            id: row.get(0)?,
            session_type_id: row.get(1)?,
            first_name: row.get(2)?,
            last_name: row.get(3)?,
            email: row.get(4)?,
            phone: row.get(5)?,
            start_time: ts_column(row, 6)?,
            status,
            created_at: ts_column(row, 8)?,
        },
        session_type_name: row.get(9)?,
        duration_minutes: row.get(10)?,
    })
}

pub struct BookingFields<'a> {
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub email: Option<&'a str>,
    pub phone: Option<&'a str>,
    pub start_time: NaiveDateTime,
}

pub fn insert_booking(
    conn: &Connection,
    session_type_id: i64,
    fields: &BookingFields<'_>,
) -> rusqlite::Result<Booking> {
    let created_at = now();
    let status = BookingStatus::Pending;
    conn.execute(
        "INSERT INTO bookings (session_type_id, first_name, last_name, email, phone, start_time, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            session_type_id,
            fields.first_name,
            fields.last_name,
            fields.email,
            fields.phone,
            format_ts(&fields.start_time),
            status.as_str(),
            format_ts(&created_at),
        ],
    )?;

    Ok(Booking {
        id: conn.last_insert_rowid(),
        session_type_id,
        first_name: fields.first_name.to_string(),
        last_name: fields.last_name.to_string(),
        email: fields.email.map(str::to_string),
        phone: fields.phone.map(str::to_string),
        start_time: fields.start_time,
        status,
        created_at,
    })
}

pub fn get_booking(conn: &Connection, id: i64) -> rusqlite::Result<Option<ScheduledBooking>> {
    conn.query_row(
        &format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings b
             JOIN session_types st ON b.session_type_id = st.id
             WHERE b.id = ?1"
        ),
        params![id],
        parse_booking_row,
    )
    .optional()
}

pub fn update_booking_status(
    conn: &Connection,
    id: i64,
    status: BookingStatus,
) -> rusqlite::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET status = ?1 WHERE id = ?2",
        params![status.as_str(), id],
    )?;
    Ok(count > 0)
}

pub fn list_provider_bookings(
    conn: &Connection,
    provider_id: i64,
    status: Option<BookingStatus>,
) -> rusqlite::Result<Vec<ScheduledBooking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings b
         JOIN session_types st ON b.session_type_id = st.id
         WHERE st.provider_id = ?1 AND (?2 IS NULL OR b.status = ?2)
         ORDER BY b.start_time DESC, b.id DESC"
    ))?;
    let rows = stmt.query_map(
        params![provider_id, status.map(|s| s.as_str())],
        parse_booking_row,
    )?;
    rows.collect()
}

/// Pending and approved bookings made through one session type.
pub fn session_type_active_bookings(
    conn: &Connection,
    session_type_id: i64,
) -> rusqlite::Result<Vec<ScheduledBooking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings b
         JOIN session_types st ON b.session_type_id = st.id
         WHERE b.session_type_id = ?1 AND b.status IN ('pending', 'approved')
         ORDER BY b.start_time"
    ))?;
    let rows = stmt.query_map(params![session_type_id], parse_booking_row)?;
    rows.collect()
}

/// Pending and approved bookings of the provider starting within `[from, to)`.
pub fn provider_active_bookings_between(
    conn: &Connection,
    provider_id: i64,
    from: &NaiveDateTime,
    to: &NaiveDateTime,
) -> rusqlite::Result<Vec<ScheduledBooking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings b
         JOIN session_types st ON b.session_type_id = st.id
         WHERE st.provider_id = ?1
           AND b.status IN ('pending', 'approved')
           AND b.start_time >= ?2 AND b.start_time < ?3
         ORDER BY b.start_time"
    ))?;
    let rows = stmt.query_map(
        params![provider_id, format_ts(from), format_ts(to)],
        parse_booking_row,
    )?;
    rows.collect()
}

/// Pending and approved bookings of the provider whose start falls on `date`.
pub fn provider_active_bookings_on_date(
    conn: &Connection,
    provider_id: i64,
    date: &NaiveDate,
) -> rusqlite::Result<Vec<ScheduledBooking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings b
         JOIN session_types st ON b.session_type_id = st.id
         WHERE st.provider_id = ?1
           AND b.status IN ('pending', 'approved')
           AND date(b.start_time) = ?2
         ORDER BY b.start_time"
    ))?;
    let rows = stmt.query_map(
        params![provider_id, date.format("%Y-%m-%d").to_string()],
        parse_booking_row,
    )?;
    rows.collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn setup_db() -> Connection {
        db::init_db(":memory:").unwrap()
    }

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn book(conn: &Connection, session_type_id: i64, start: &str) -> Booking {
        insert_booking(
            conn,
            session_type_id,
            &BookingFields {
                first_name: "Ada",
                last_name: "Lovelace",
                email: Some("ada@example.com"),
                phone: None,
                start_time: dt(start),
            },
        )
        .unwrap()
    }

    #[test]
    fn test_session_type_link_lookup() {
        let conn = setup_db();
        let provider = insert_provider(&conn, "alice", "alice@example.com", None, None, "").unwrap();
        let st = insert_session_type(&conn, provider.id, "Intro", 30).unwrap();

        let found = get_session_type_by_link(&conn, &st.unique_link).unwrap().unwrap();
        assert_eq!(found.id, st.id);
        assert_eq!(found.duration_minutes, 30);
        assert!(get_session_type_by_link(&conn, "missing").unwrap().is_none());
    }

    #[test]
    fn test_update_and_delete_are_owner_scoped() {
        let conn = setup_db();
        let alice = insert_provider(&conn, "alice", "alice@example.com", None, None, "").unwrap();
        let bob = insert_provider(&conn, "bob", "bob@example.com", None, None, "").unwrap();
        let st = insert_session_type(&conn, alice.id, "Intro", 30).unwrap();

        assert!(update_session_type(&conn, st.id, bob.id, "Hijack", 60).unwrap().is_none());
        assert!(!delete_session_type(&conn, st.id, bob.id).unwrap());

        let updated = update_session_type(&conn, st.id, alice.id, "Deep dive", 90)
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "Deep dive");
        assert_eq!(updated.unique_link, st.unique_link);
        assert!(delete_session_type(&conn, st.id, alice.id).unwrap());
    }

    #[test]
    fn test_active_bookings_on_date_skips_rejected_and_other_days() {
        let conn = setup_db();
        let provider = insert_provider(&conn, "alice", "alice@example.com", None, None, "").unwrap();
        let st = insert_session_type(&conn, provider.id, "Intro", 30).unwrap();

        book(&conn, st.id, "2030-05-06 10:00");
        let rejected = book(&conn, st.id, "2030-05-06 11:00");
        book(&conn, st.id, "2030-05-07 10:00");
        update_booking_status(&conn, rejected.id, BookingStatus::Rejected).unwrap();

        let date = NaiveDate::from_ymd_opt(2030, 5, 6).unwrap();
        let active = provider_active_bookings_on_date(&conn, provider.id, &date).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].booking.start_time, dt("2030-05-06 10:00"));
        assert_eq!(active[0].duration_minutes, 30);
    }

    #[test]
    fn test_list_provider_bookings_status_filter() {
        let conn = setup_db();
        let provider = insert_provider(&conn, "alice", "alice@example.com", None, None, "").unwrap();
        let st = insert_session_type(&conn, provider.id, "Intro", 30).unwrap();
        let first = book(&conn, st.id, "2030-05-06 10:00");
        book(&conn, st.id, "2030-05-06 11:00");
        update_booking_status(&conn, first.id, BookingStatus::Approved).unwrap();

        let all = list_provider_bookings(&conn, provider.id, None).unwrap();
        assert_eq!(all.len(), 2);
        // Newest start first
        assert_eq!(all[0].booking.start_time, dt("2030-05-06 11:00"));

        let approved =
            list_provider_bookings(&conn, provider.id, Some(BookingStatus::Approved)).unwrap();
        assert_eq!(approved.len(), 1);
        assert_eq!(approved[0].booking.id, first.id);
    }

    #[test]
    fn test_calendars_ordered_oldest_first() {
        let conn = setup_db();
        let provider = insert_provider(&conn, "alice", "alice@example.com", None, None, "").unwrap();
        let work = insert_calendar(&conn, provider.id, "Work", None).unwrap();
        insert_calendar(&conn, provider.id, "Personal", Some("after hours")).unwrap();

        let calendars = list_calendars(&conn, provider.id).unwrap();
        assert_eq!(calendars.len(), 2);
        assert_eq!(calendars[0].id, work.id);
    }

    #[test]
    fn test_provider_events_between_spans_calendars() {
        let conn = setup_db();
        let provider = insert_provider(&conn, "alice", "alice@example.com", None, None, "").unwrap();
        let a = insert_calendar(&conn, provider.id, "A", None).unwrap();
        let b = insert_calendar(&conn, provider.id, "B", None).unwrap();
        for (cal, start, end) in [
            (a.id, "2030-05-06 09:00", "2030-05-06 10:00"),
            (b.id, "2030-05-06 13:00", "2030-05-06 14:00"),
            (b.id, "2030-05-08 13:00", "2030-05-08 14:00"),
        ] {
            insert_event(
                &conn,
                &NewEvent {
                    calendar_id: cal,
                    booking_id: None,
                    title: "Busy".to_string(),
                    start_time: dt(start),
                    end_time: dt(end),
                    description: None,
                },
            )
            .unwrap();
        }

        let events = provider_events_between(
            &conn,
            provider.id,
            &dt("2030-05-06 00:00"),
            &dt("2030-05-07 00:00"),
        )
        .unwrap();
        assert_eq!(events.len(), 2);

        let date = NaiveDate::from_ymd_opt(2030, 5, 8).unwrap();
        assert_eq!(provider_events_on_date(&conn, provider.id, &date).unwrap().len(), 1);
    }
}
