//! XMLTV timestamp handling
//!
//! Only the leading `YYYYMMDDHHMMSS` block is honored. Any zone suffix such as
//! `+0100` is ignored and the value is treated as naive local time.

use chrono::NaiveDateTime;

const XMLTV_FORMAT: &str = "%Y%m%d%H%M%S";
const XMLTV_WIDTH: usize = 14;

/// Parse the first 14 characters of an XMLTV time attribute.
///
/// Returns `None` for short input, non-digits or impossible calendar values.
pub fn parse_time(value: &str) -> Option<NaiveDateTime> {
    let head = value.get(..XMLTV_WIDTH)?;
    if !head.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDateTime::parse_from_str(head, XMLTV_FORMAT).ok()
}

/// Start column of a programme row, e.g. `15.01 12:00`
pub fn format_start(dt: &NaiveDateTime) -> String {
    dt.format("%d.%m %H:%M").to_string()
}

/// Stop column of a programme row, e.g. `13:00`
pub fn format_stop(dt: &NaiveDateTime) -> String {
    dt.format("%H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_parse_plain() {
        let dt = parse_time("20240115120000").unwrap();
        let expected = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        assert_eq!(dt, expected);
    }

    #[test]
    fn test_zone_suffix_ignored() {
        assert_eq!(
            parse_time("20240115120000 +0100"),
            parse_time("20240115120000 -0530")
        );
        assert!(parse_time("20240115120000+0000").is_some());
    }

    #[test]
    fn test_malformed_is_none() {
        assert_eq!(parse_time(""), None);
        assert_eq!(parse_time("notadate"), None);
        assert_eq!(parse_time("2024011512000"), None);
        assert_eq!(parse_time("2024011512000x"), None);
        assert_eq!(parse_time("+2024011512000"), None);
        // month 13, Feb 30th, hour 25
        assert_eq!(parse_time("20241315120000"), None);
        assert_eq!(parse_time("20240230120000"), None);
        assert_eq!(parse_time("20240115250000"), None);
        // multi-byte char straddling the cut
        assert_eq!(parse_time("2024011512000é"), None);
    }

    #[test]
    fn test_format_columns() {
        let dt = parse_time("20240315201500").unwrap();
        assert_eq!(format_start(&dt), "15.03 20:15");
        assert_eq!(format_stop(&dt), "20:15");
    }
}
