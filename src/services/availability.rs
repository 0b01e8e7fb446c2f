use chrono::NaiveDate;
use serde_json::Value;

use crate::services::dates::parse_booking_date;

/// Canonical half-open interval overlap: a stay occupies [arrival, leaving),
/// so back-to-back stays sharing a changeover day do not collide. This also
/// catches a candidate that fully contains an existing reservation.
pub fn ranges_overlap(
    candidate_arrival: NaiveDate,
    candidate_leaving: NaiveDate,
    existing_arrival: NaiveDate,
    existing_leaving: NaiveDate,
) -> bool {
    candidate_arrival < existing_leaving && candidate_leaving > existing_arrival
}

/// True when none of the existing bookings for the flat overlap the candidate
/// range. Rows with unparseable stored dates are skipped rather than treated
/// as blocking.
pub fn is_available(arrival: NaiveDate, leaving: NaiveDate, existing_bookings: &[Value]) -> bool {
    !existing_bookings.iter().any(|booking| {
        let Some(obj) = booking.as_object() else {
            return false;
        };
        let existing_arrival = obj
            .get("arrival_date")
            .and_then(Value::as_str)
            .and_then(parse_booking_date);
        let existing_leaving = obj
            .get("leaving_date")
            .and_then(Value::as_str)
            .and_then(parse_booking_date);
        match (existing_arrival, existing_leaving) {
            (Some(existing_arrival), Some(existing_leaving)) => {
                ranges_overlap(arrival, leaving, existing_arrival, existing_leaving)
            }
            _ => false,
        }
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{is_available, ranges_overlap};
    use crate::services::dates::parse_booking_date;

    fn date(raw: &str) -> chrono::NaiveDate {
        parse_booking_date(raw).expect("valid test date")
    }

    #[test]
    fn start_inside_existing_range_overlaps() {
        assert!(ranges_overlap(
            date("12-01-2026"),
            date("18-01-2026"),
            date("10-01-2026"),
            date("15-01-2026"),
        ));
    }

    #[test]
    fn end_inside_existing_range_overlaps() {
        assert!(ranges_overlap(
            date("08-01-2026"),
            date("12-01-2026"),
            date("10-01-2026"),
            date("15-01-2026"),
        ));
    }

    #[test]
    fn candidate_containing_existing_range_overlaps() {
        // Neither endpoint falls inside the existing stay, it is swallowed whole.
        assert!(ranges_overlap(
            date("08-01-2026"),
            date("20-01-2026"),
            date("10-01-2026"),
            date("15-01-2026"),
        ));
    }

    #[test]
    fn back_to_back_stays_do_not_overlap() {
        assert!(!ranges_overlap(
            date("15-01-2026"),
            date("20-01-2026"),
            date("10-01-2026"),
            date("15-01-2026"),
        ));
        assert!(!ranges_overlap(
            date("05-01-2026"),
            date("10-01-2026"),
            date("10-01-2026"),
            date("15-01-2026"),
        ));
    }

    #[test]
    fn availability_scans_all_bookings() {
        let bookings = vec![
            json!({"arrival_date": "01-02-2026", "leaving_date": "05-02-2026"}),
            json!({"arrival_date": "10-02-2026", "leaving_date": "14-02-2026"}),
        ];

        assert!(is_available(date("05-02-2026"), date("10-02-2026"), &bookings));
        assert!(!is_available(date("04-02-2026"), date("06-02-2026"), &bookings));
        assert!(!is_available(date("09-02-2026"), date("15-02-2026"), &bookings));
    }

    #[test]
    fn scan_covers_every_booking_even_in_large_sets() {
        // Far more rows than any single fetch page; the only collision is the
        // last entry, so a truncated scan would wrongly report the flat free.
        let mut bookings: Vec<serde_json::Value> = (0..1500u64)
            .map(|i| {
                let start = chrono::NaiveDate::from_ymd_opt(2020, 1, 1).expect("valid date")
                    + chrono::Days::new(i);
                let end = start + chrono::Days::new(1);
                json!({
                    "arrival_date": start.format("%d-%m-%Y").to_string(),
                    "leaving_date": end.format("%d-%m-%Y").to_string(),
                })
            })
            .collect();
        bookings.push(json!({"arrival_date": "10-06-2026", "leaving_date": "20-06-2026"}));

        assert!(!is_available(date("12-06-2026"), date("14-06-2026"), &bookings));
    }

    #[test]
    fn unparseable_stored_dates_are_skipped() {
        let bookings = vec![json!({"arrival_date": "garbage", "leaving_date": "05-02-2026"})];
        assert!(is_available(date("01-02-2026"), date("10-02-2026"), &bookings));
    }

    #[test]
    fn empty_booking_list_is_available() {
        assert!(is_available(date("01-02-2026"), date("10-02-2026"), &[]));
    }
}
