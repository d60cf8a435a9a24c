use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::io::Read;

/// Tabular export exactly as it was handed over: headers plus string cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, csv::Error> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let headers = csv_reader
            .headers()?
            .iter()
            .map(str::to_string)
            .collect::<Vec<_>>();

        let mut rows = Vec::new();
        for record in csv_reader.records() {
            let record = record?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self { headers, rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M %p",
];

const OFFSET_DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S %z", "%Y-%m-%d %H:%M:%S%z"];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d %b %Y",
    "%d %B %Y",
    "%b %d, %Y",
    "%B %d, %Y",
];

/// Parses the timestamp shapes both exports are known to produce. Offsets are folded into UTC.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.naive_utc());
    }

    for format in OFFSET_DATETIME_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(trimmed, format) {
            return Some(dt.naive_utc());
        }
    }

    let without_zone = trimmed
        .strip_suffix("UTC")
        .or_else(|| trimmed.strip_suffix('Z'))
        .map(str::trim_end)
        .unwrap_or(trimmed);

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(without_zone, format) {
            return Some(dt);
        }
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(without_zone, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }

    None
}

/// Calendar date of any value [`parse_timestamp`] accepts.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    parse_timestamp(value).map(|dt| dt.date())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    #[test]
    fn parse_timestamp_supports_rfc3339_and_community_formats() {
        assert_eq!(
            parse_timestamp("2025-09-24T10:00:00Z"),
            Some(at(2025, 9, 24, 10, 0, 0))
        );
        assert_eq!(
            parse_timestamp("2025-09-24T12:00:00+02:00"),
            Some(at(2025, 9, 24, 10, 0, 0))
        );
        assert_eq!(
            parse_timestamp("2025-09-24 10:15:30 UTC"),
            Some(at(2025, 9, 24, 10, 15, 30))
        );
        assert_eq!(
            parse_timestamp("2025-09-24 10:15:30 -0500"),
            Some(at(2025, 9, 24, 15, 15, 30))
        );
        assert_eq!(
            parse_timestamp("09/24/2025 10:15"),
            Some(at(2025, 9, 24, 10, 15, 0))
        );
    }

    #[test]
    fn parse_date_supports_membership_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 3, 1);
        assert_eq!(parse_date("2025-03-01"), expected);
        assert_eq!(parse_date("03/01/2025"), expected);
        assert_eq!(parse_date("1 Mar 2025"), expected);
        assert_eq!(parse_date("March 1, 2025"), expected);
        assert_eq!(parse_date("2025-03-01T08:30:00Z"), expected);
    }

    #[test]
    fn unparseable_values_become_none() {
        assert!(parse_timestamp("  ").is_none());
        assert!(parse_timestamp("not-a-date").is_none());
        assert!(parse_date("2025-02-30").is_none());
    }

    #[test]
    fn raw_table_reads_headers_and_trims_cells() {
        let table = RawTable::from_reader(Cursor::new(
            "Email, First name\n  A@x.com , Ann \nb@x.com,Bo\n",
        ))
        .expect("csv parses");
        assert_eq!(table.headers, vec!["Email", "First name"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0], vec!["A@x.com", "Ann"]);
    }

    #[test]
    fn raw_table_tolerates_short_rows() {
        let table = RawTable::from_reader(Cursor::new("Email,Last sign in at\nc@x.com\n"))
            .expect("ragged csv parses");
        assert_eq!(table.rows[0], vec!["c@x.com"]);
    }
}
