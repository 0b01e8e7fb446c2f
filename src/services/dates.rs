use chrono::NaiveDate;

/// Booking dates travel over the wire and are stored as `DD-MM-YYYY` strings.
pub const BOOKING_DATE_FORMAT: &str = "%d-%m-%Y";

pub fn parse_booking_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), BOOKING_DATE_FORMAT).ok()
}

/// Whole nights between arrival and leaving. Negative when leaving precedes
/// arrival; callers validate date order at the boundary.
pub fn nights_between(arrival: NaiveDate, leaving: NaiveDate) -> i64 {
    (leaving - arrival).num_days()
}
