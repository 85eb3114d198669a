pub mod booking;
pub mod calendar;
pub mod provider;
pub mod session_type;
pub mod validation;

pub use booking::{Booking, BookingStatus, NewBooking};
pub use calendar::{Calendar, CalendarEvent, CalendarInput, EventInput, NewEvent};
pub use provider::Provider;
pub use session_type::{SessionType, SessionTypeInput};
pub use validation::{check_password, is_valid_email};
