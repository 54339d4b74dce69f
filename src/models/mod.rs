mod action;
mod bill;
mod summary;
mod text;

pub use action::BillAction;
pub use bill::{Bill, BillCandidate, BillKey, BillType, Importance};
pub use summary::Summary;
pub use text::BillText;

use chrono::{DateTime, NaiveDate, Utc};

/// Parse a timestamp in any of the formats the provider and SQLite emit.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    // Try RFC3339 first (e.g., "2024-04-29T14:30:22Z")
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Try SQLite datetime format (e.g., "2024-04-29 14:30:22")
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    // Bare dates (e.g., "2024-04-29") count as midnight UTC
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }
    None
}

/// Parse a date, accepting a full timestamp and keeping its date part.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date);
    }
    parse_timestamp(s).map(|dt| dt.date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rfc3339_sqlite_and_bare_dates() {
        let rfc = parse_timestamp("2024-04-29T14:30:22Z").unwrap();
        let sqlite = parse_timestamp("2024-04-29 14:30:22").unwrap();
        assert_eq!(rfc, sqlite);

        let bare = parse_timestamp("2024-04-29").unwrap();
        assert_eq!(bare.to_rfc3339(), "2024-04-29T00:00:00+00:00");

        assert!(parse_timestamp("last Tuesday").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn date_parse_accepts_timestamps() {
        let d = parse_date("2024-09-10T08:00:00Z").unwrap();
        assert_eq!(d.to_string(), "2024-09-10");
        assert_eq!(parse_date("2024-09-10"), Some(d));
        assert!(parse_date("not a date").is_none());
    }
}
