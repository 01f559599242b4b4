//! Time and calendar-date helpers.
//!
//! Row timestamps are Unix seconds. Calendar dates (due dates, project
//! start/end, expense dates) are ISO `YYYY-MM-DD` strings, which compare
//! correctly as text in SQLite.

use chrono::{Days, NaiveDate, Utc};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Current UTC calendar date
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).ok()
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Inclusive `[from, from + days]` window as ISO strings for range queries.
pub fn date_window(from: NaiveDate, days: u32) -> (String, String) {
    let to = from
        .checked_add_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MAX);
    (format_date(from), format_date(to))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_format() {
        let d = parse_date("2026-03-09").unwrap();
        assert_eq!(format_date(d), "2026-03-09");
        assert!(parse_date("2026-13-01").is_none());
        assert!(parse_date("09/03/2026").is_none());
    }

    #[test]
    fn test_date_window_crosses_month() {
        let from = parse_date("2026-01-30").unwrap();
        assert_eq!(
            date_window(from, 3),
            ("2026-01-30".to_string(), "2026-02-02".to_string())
        );
    }

    #[test]
    fn test_iso_strings_order_like_dates() {
        let (from, to) = date_window(parse_date("2026-12-31").unwrap(), 7);
        assert!(from < to);
        assert_eq!(to, "2027-01-07");
    }
}
